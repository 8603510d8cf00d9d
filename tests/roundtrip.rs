//! Round-trip suite: encoded values must decode back to the same JSON,
//! the intern policy must be deterministic, and dictionary framing must
//! satisfy its structural invariants.

use au::dictionary::Dictionary;
use au::encoder::{AuEncoder, EncoderConfig};
use au::error::Result;
use au::json::JsonOutputHandler;
use au::parser::{DictRecordHandler, RecordHandler, RecordParser};
use au::source::{BufferByteSource, ByteSource};

fn decode_to_json(bytes: &[u8]) -> String {
    let mut src = BufferByteSource::new(bytes);
    let mut dictionary = Dictionary::new(1);
    let mut sink = JsonOutputHandler::new(Vec::new());
    let mut handler = DictRecordHandler::new(&mut dictionary, &mut sink);
    RecordParser::new(&mut src, &mut handler)
        .parse_stream()
        .expect("stream should decode");
    String::from_utf8(sink.into_inner()).expect("output is printable")
}

// ---------------------------------------------------------------------------
// Basic value round-trips
// ---------------------------------------------------------------------------

#[test]
fn mixed_records_decode_to_expected_json() {
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    enc.encode(|w| {
        w.map(|_| {});
    })
    .unwrap();
    enc.encode(|w| {
        w.map(|w| {
            w.string_hint(b"key1", Some(false));
            w.string_hint(b"value1", Some(false));
            w.string_hint(b"key2", Some(false));
            w.int(-5000);
            w.key(b"keyToIntern3");
            w.boolean(false);
        });
    })
    .unwrap();
    enc.encode(|w| {
        w.array(|w| {
            w.int(6).int(1).int(0).int(-7).int(-2).double(5.9).double(-5.9);
        });
    })
    .unwrap();
    enc.encode(|w| {
        w.array(|_| {});
    })
    .unwrap();

    assert_eq!(
        decode_to_json(&enc.into_inner()),
        "{}\n\
         {\"key1\":\"value1\",\"key2\":-5000,\"keyToIntern3\":false}\n\
         [6,1,0,-7,-2,5.9,-5.9]\n\
         []\n"
    );
}

#[test]
fn integer_extremes_round_trip() {
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    enc.encode(|w| {
        w.array(|w| {
            w.int(i64::MIN).int(i64::MAX).uint(u64::MAX).uint(0);
        });
    })
    .unwrap();
    assert_eq!(
        decode_to_json(&enc.into_inner()),
        format!("[{},{},{},0]\n", i64::MIN, i64::MAX, u64::MAX)
    );
}

// ---------------------------------------------------------------------------
// Intern policy
// ---------------------------------------------------------------------------

#[test]
fn repeated_string_interns_after_threshold() {
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    enc.encode(|w| {
        w.array(|w| {
            for _ in 0..12 {
                w.string(b"valToIntern");
            }
        });
    })
    .unwrap();
    enc.encode(|w| {
        w.string(b"valToIntern");
    })
    .unwrap();
    let bytes = enc.into_inner();

    // All thirteen decoded strings are equal.
    let expected_row: Vec<&str> = std::iter::repeat("\"valToIntern\"").take(12).collect();
    assert_eq!(
        decode_to_json(&bytes),
        format!("[{}]\n\"valToIntern\"\n", expected_row.join(","))
    );

    // Early occurrences are inlined; once the tracker promotes the
    // string it appears as a dictionary reference. Raw copies in the
    // binary: ten inline occurrences plus the one dictionary entry.
    let raw_copies = bytes
        .windows(b"valToIntern".len())
        .filter(|w| w == b"valToIntern")
        .count();
    assert_eq!(raw_copies, 11);
    assert!(bytes.windows(2).any(|w| w == [b'X', 0x00]));
}

#[test]
fn distinct_strings_never_intern() {
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    let mut expected = String::new();
    for i in 0..1000u32 {
        let value = format!("{i:032}");
        enc.encode(|w| {
            w.string(value.as_bytes());
        })
        .unwrap();
        expected.push_str(&format!("\"{value}\"\n"));
    }
    assert_eq!(enc.dict_size(), 0, "no string should cross the threshold");
    let bytes = enc.into_inner();
    assert_eq!(decode_to_json(&bytes), expected);
    // No dictionary-add record should carry entries: the only A records
    // permissible here are none at all.
    assert!(!bytes.windows(2).any(|w| w[0] == b'\n' && w[1] == b'A'));
}

#[test]
fn identical_runs_produce_identical_bytes() {
    let run = || {
        let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
        for i in 0..2000u64 {
            enc.encode(|w| {
                w.map(|w| {
                    w.key(b"sequence");
                    w.uint(i);
                    w.key(b"category");
                    w.string(if i % 3 == 0 {
                        &b"periodic-red"[..]
                    } else {
                        &b"periodic-blue"[..]
                    });
                });
            })
            .unwrap();
        }
        enc.into_inner()
    };
    assert_eq!(run(), run());
}

// ---------------------------------------------------------------------------
// Structural invariants
// ---------------------------------------------------------------------------

/// Observes dictionary-add records, asserting that each generation only
/// ever extends (entries never renumber or shrink).
struct MonotonicityCheck {
    dictionary: Dictionary,
    sor: u64,
    current: Option<usize>,
    seen: Vec<(u64, usize)>,
}

impl RecordHandler for MonotonicityCheck {
    fn on_record_start(&mut self, pos: u64) -> Result<()> {
        self.sor = pos;
        self.current = None;
        Ok(())
    }
    fn on_dict_clear(&mut self) -> Result<()> {
        self.dictionary.clear(self.sor)?;
        Ok(())
    }
    fn on_dict_add_start(&mut self, backref: u64) -> Result<()> {
        let idx = self.dictionary.find(self.sor, backref)?;
        self.current = Some(idx);
        Ok(())
    }
    fn on_dict_entry(&mut self, entry: &[u8]) -> Result<()> {
        let idx = self.current.expect("add must precede entries");
        let sor = self.sor;
        self.dictionary.get_mut(idx).add(sor, entry);
        let start = self.dictionary.get(idx).start_pos();
        let len = self.dictionary.get(idx).len();
        if let Some((_, prev_len)) = self
            .seen
            .iter()
            .rev()
            .find(|(s, _)| *s == start)
        {
            assert!(len > *prev_len, "dictionary generation must only grow");
        }
        self.seen.push((start, len));
        Ok(())
    }
    fn on_value(
        &mut self,
        backref: u64,
        len: u64,
        source: &mut dyn ByteSource,
    ) -> Result<()> {
        self.dictionary.find(self.sor, backref)?;
        source.skip(len)
    }
}

#[test]
fn dictionary_generations_only_extend() {
    // Small clear threshold to force multiple generations.
    let config = EncoderConfig {
        clear_threshold: 5,
        intern_threshold: 2,
        ..EncoderConfig::default()
    };
    let mut enc = AuEncoder::new(Vec::new(), config).unwrap();
    for i in 0..200u64 {
        enc.encode(|w| {
            w.map(|w| {
                w.key(format!("rotatingKey{}", i % 17).as_bytes());
                w.uint(i);
            });
        })
        .unwrap();
    }
    let bytes = enc.into_inner();

    let mut src = BufferByteSource::new(&bytes);
    let mut check = MonotonicityCheck {
        dictionary: Dictionary::new(8),
        sor: 0,
        current: None,
        seen: Vec::new(),
    };
    RecordParser::new(&mut src, &mut check).parse_stream().unwrap();
    assert!(!check.seen.is_empty());
}

#[test]
fn corrupted_value_length_fails_decode() {
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    enc.encode(|w| {
        w.array(|w| {
            w.int(1).int(2).int(3);
        });
    })
    .unwrap();
    let mut bytes = enc.into_inner();
    // Locate the V record and inflate its declared length.
    let v_at = bytes.iter().position(|&b| b == b'V').unwrap();
    bytes[v_at + 2] += 1;
    let mut src = BufferByteSource::new(&bytes);
    let mut dictionary = Dictionary::new(1);
    let mut sink = JsonOutputHandler::new(Vec::new());
    let mut handler = DictRecordHandler::new(&mut dictionary, &mut sink);
    let err = RecordParser::new(&mut src, &mut handler)
        .parse_stream()
        .unwrap_err();
    assert!(err.is_parse());
}
