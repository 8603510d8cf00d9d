//! Linear grep behaviors over encoded streams, including the re-encode
//! output path and regex matching against interned strings.

use au::dictionary::Dictionary;
use au::encoder::{AuEncoder, EncoderConfig};
use au::grep::{scan, Atom, KeyMatcher, Pattern, StrMatcher};
use au::json::{AuOutputHandler, JsonOutputHandler};
use au::parser::{DictRecordHandler, RecordParser};
use au::source::BufferByteSource;
use regex::bytes::Regex;

fn sample_stream() -> Vec<u8> {
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    let levels = [
        &b"info-level"[..],
        b"warning-level",
        b"error-level",
        b"info-level",
        b"error-level",
    ];
    for (i, &level) in levels.iter().enumerate() {
        enc.encode(|w| {
            w.map(|w| {
                w.key(b"severity");
                w.string_hint(level, Some(true));
                w.key(b"attempt");
                w.uint(i as u64);
                w.key(b"retryable");
                w.boolean(i % 2 == 0);
            });
        })
        .unwrap();
    }
    enc.into_inner()
}

fn run_scan(pattern: &Pattern, bytes: &[u8]) -> (u64, String) {
    let mut src = BufferByteSource::new(bytes);
    let mut dictionary = Dictionary::new(1);
    let mut out = JsonOutputHandler::new(Vec::new());
    let total = scan(pattern, &mut dictionary, &mut src, &mut out).unwrap();
    (total, String::from_utf8(out.into_inner()).unwrap())
}

#[test]
fn string_match_resolves_dict_refs() {
    // The severity values are force-interned, so matching them exercises
    // the dictionary-reference path rather than inline strings.
    let p = Pattern {
        str_pattern: Some(StrMatcher::Literal {
            pattern: b"error-level".to_vec(),
            full_match: true,
        }),
        ..Pattern::default()
    };
    let (total, out) = run_scan(&p, &sample_stream());
    assert_eq!(total, 2);
    assert!(out.lines().all(|l| l.contains("\"error-level\"")));
}

#[test]
fn regex_matches_partial_severities() {
    let p = Pattern {
        key: Some(KeyMatcher::Literal(b"severity".to_vec())),
        str_pattern: Some(StrMatcher::Regex {
            re: Regex::new("(warning|error)-level").unwrap(),
            full_match: true,
        }),
        ..Pattern::default()
    };
    let (total, _) = run_scan(&p, &sample_stream());
    assert_eq!(total, 3);
}

#[test]
fn substring_search_hits_inline_and_interned() {
    let p = Pattern {
        str_pattern: Some(StrMatcher::Literal {
            pattern: b"error".to_vec(),
            full_match: false,
        }),
        ..Pattern::default()
    };
    let (total, _) = run_scan(&p, &sample_stream());
    assert_eq!(total, 2);
}

#[test]
fn atom_pattern_matches_bools() {
    let p = Pattern {
        key: Some(KeyMatcher::Literal(b"retryable".to_vec())),
        atom: Some(Atom::True),
        ..Pattern::default()
    };
    let (total, _) = run_scan(&p, &sample_stream());
    assert_eq!(total, 3);
}

#[test]
fn keyed_uint_match() {
    let p = Pattern {
        key: Some(KeyMatcher::Literal(b"attempt".to_vec())),
        uint: Some(3),
        int: Some(3),
        ..Pattern::default()
    };
    let (total, out) = run_scan(&p, &sample_stream());
    assert_eq!(total, 1);
    assert!(out.contains("\"attempt\":3"));
}

#[test]
fn reencoded_grep_output_decodes_to_same_matches() {
    let bytes = sample_stream();
    let p = Pattern {
        str_pattern: Some(StrMatcher::Literal {
            pattern: b"error-level".to_vec(),
            full_match: true,
        }),
        ..Pattern::default()
    };

    // Grep with the au-encoding sink.
    let mut src = BufferByteSource::new(&bytes);
    let mut dictionary = Dictionary::new(1);
    let mut sink = AuOutputHandler::new(Vec::new(), EncoderConfig::default()).unwrap();
    let total = scan(&p, &mut dictionary, &mut src, &mut sink).unwrap();
    assert_eq!(total, 2);

    // Grep with the JSON sink for comparison.
    let (_, expected) = run_scan(&p, &bytes);

    // The re-encoded stream must decode to exactly the matched records.
    let reencoded = sink.into_inner();
    let mut src = BufferByteSource::new(&reencoded);
    let mut dictionary = Dictionary::new(1);
    let mut json = JsonOutputHandler::new(Vec::new());
    let mut handler = DictRecordHandler::new(&mut dictionary, &mut json);
    RecordParser::new(&mut src, &mut handler)
        .parse_stream()
        .unwrap();
    assert_eq!(String::from_utf8(json.into_inner()).unwrap(), expected);
}

#[test]
fn parse_error_mid_stream_continues_scanning() {
    let mut bytes = sample_stream();
    // Corrupt the declared length of the second V record; the scan must
    // report it and still find matches in later records.
    let mut v_positions: Vec<usize> = Vec::new();
    for (i, w) in bytes.windows(3).enumerate() {
        if w[0] == b'E' && w[1] == b'\n' && w[2] == b'V' {
            v_positions.push(i + 2);
        }
    }
    assert!(v_positions.len() >= 3);
    bytes[v_positions[1] + 2] = 0x7f;

    let p = Pattern {
        key: Some(KeyMatcher::Literal(b"attempt".to_vec())),
        uint: Some(4),
        int: Some(4),
        ..Pattern::default()
    };
    let (total, out) = run_scan(&p, &bytes);
    assert_eq!(total, 1);
    assert!(out.contains("\"attempt\":4"));
}
