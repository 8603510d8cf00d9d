//! Stream encoder.
//!
//! [`AuWriter`] formats a single value into a scratch buffer; [`AuEncoder`]
//! owns the framing: the stream header, dictionary-delta (`A`) records,
//! value (`V`) records, and the purge/clear maintenance policy around the
//! intern table.
//!
//! Record order on the wire matches the order of [`AuEncoder::encode`]
//! calls exactly, and a dictionary delta is always flushed before the value
//! record that references it. Driving two encoders with identical input and
//! configuration produces identical bytes.

use std::io::Write;

use crate::error::Result;
use crate::format::{self, marker, FORMAT_VERSION, RECORD_TERM};
use crate::intern::{InternHint, StringIntern};
use crate::vint::{write_f64, write_i64_le, write_u64_le, write_varint};

// ---------------------------------------------------------------------------
// AuWriter
// ---------------------------------------------------------------------------

/// Value formatter handed to the producer callback of
/// [`AuEncoder::encode`]. Writes markers and payloads into the encoder's
/// scratch buffer and consults the intern table for strings.
pub struct AuWriter<'a> {
    buf: &'a mut Vec<u8>,
    intern: &'a mut StringIntern,
}

impl<'a> AuWriter<'a> {
    pub(crate) fn new(buf: &'a mut Vec<u8>, intern: &'a mut StringIntern) -> Self {
        AuWriter { buf, intern }
    }

    pub fn null(&mut self) -> &mut Self {
        self.buf.push(marker::NULL);
        self
    }

    pub fn boolean(&mut self, v: bool) -> &mut Self {
        self.buf.push(if v { marker::TRUE } else { marker::FALSE });
        self
    }

    /// Non-negative integer. Values needing all 64 bits take the packed
    /// form so they survive the signed decode path unambiguously.
    pub fn uint(&mut self, v: u64) -> &mut Self {
        if v < 1 << 63 {
            self.buf.push(marker::VARINT);
            write_varint(self.buf, v);
        } else {
            self.buf.push(marker::POS_INT64);
            write_u64_le(self.buf, v);
        }
        self
    }

    pub fn int(&mut self, v: i64) -> &mut Self {
        if v >= 0 {
            return self.uint(v as u64);
        }
        let magnitude = v.unsigned_abs();
        if magnitude < 1 << 63 {
            self.buf.push(marker::NEG_VARINT);
            write_varint(self.buf, magnitude);
        } else {
            self.buf.push(marker::NEG_INT64);
            write_u64_le(self.buf, magnitude);
        }
        self
    }

    /// Doubles are written bit-exactly; NaN and infinities included.
    /// Floats widen to doubles before reaching here.
    pub fn double(&mut self, v: f64) -> &mut Self {
        self.buf.push(marker::DOUBLE);
        write_f64(self.buf, v);
        self
    }

    /// Wall-clock timestamp, nanoseconds since the Unix epoch.
    pub fn time(&mut self, nanos: i64) -> &mut Self {
        self.buf.push(marker::TIMESTAMP);
        write_i64_le(self.buf, nanos);
        self
    }

    /// String with the default intern policy: the usage tracker decides.
    pub fn string(&mut self, s: &[u8]) -> &mut Self {
        self.string_hint(s, None)
    }

    /// String with an explicit intern decision. `Some(false)` always
    /// inlines; `Some(true)` always interns (tiny strings excepted);
    /// `None` defers to the tracker.
    pub fn string_hint(&mut self, s: &[u8], hint: InternHint) -> &mut Self {
        if hint == Some(false) {
            self.inline_string(s);
            return self;
        }
        match self.intern.idx(s, hint) {
            Some(idx) => {
                self.buf.push(marker::DICT_REF);
                write_varint(self.buf, idx);
            }
            None => self.inline_string(s),
        }
        self
    }

    /// Object key: always intern-eligible.
    pub fn key(&mut self, s: &[u8]) -> &mut Self {
        self.string_hint(s, Some(true))
    }

    pub fn array(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        self.start_array();
        f(self);
        self.end_array()
    }

    pub fn map(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        self.start_map();
        f(self);
        self.end_map()
    }

    // Event-style interface for callers re-emitting a parsed stream.

    pub fn start_array(&mut self) -> &mut Self {
        self.buf.push(marker::ARRAY_START);
        self
    }

    pub fn end_array(&mut self) -> &mut Self {
        self.buf.push(marker::ARRAY_END);
        self
    }

    pub fn start_map(&mut self) -> &mut Self {
        self.buf.push(marker::OBJECT_START);
        self
    }

    pub fn end_map(&mut self) -> &mut Self {
        self.buf.push(marker::OBJECT_END);
        self
    }

    fn inline_string(&mut self, s: &[u8]) {
        self.buf.push(marker::STRING);
        write_varint(self.buf, s.len() as u64);
        self.buf.extend_from_slice(s);
    }
}

// ---------------------------------------------------------------------------
// Encoder configuration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct EncoderConfig {
    /// Strings at or below this length are always inlined.
    pub tiny_str: usize,
    /// Sightings before the tracker promotes a string.
    pub intern_threshold: u64,
    /// Bound on tracked candidate strings.
    pub cache_size: usize,
    /// Records between purges of cold intern mappings.
    pub purge_interval: u64,
    /// Occurrence count below which a purge drops the mapping.
    pub purge_threshold: u64,
    /// Dictionary size that triggers a fresh dictionary.
    pub clear_threshold: usize,
    /// Free-form metadata string stored in the stream header.
    pub metadata: Option<Vec<u8>>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        EncoderConfig {
            tiny_str: format::DEFAULT_TINY_STR,
            intern_threshold: format::DEFAULT_INTERN_THRESHOLD,
            cache_size: format::DEFAULT_INTERN_CACHE_SIZE,
            purge_interval: format::DEFAULT_PURGE_INTERVAL,
            purge_threshold: format::DEFAULT_PURGE_THRESHOLD,
            clear_threshold: format::DEFAULT_CLEAR_THRESHOLD,
            metadata: None,
        }
    }
}

impl EncoderConfig {
    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

// ---------------------------------------------------------------------------
// AuEncoder
// ---------------------------------------------------------------------------

pub struct AuEncoder<W: Write> {
    out: W,
    intern: StringIntern,
    scratch: Vec<u8>,
    head: Vec<u8>,
    pos: u64,
    last_dict_loc: u64,
    last_dict_size: usize,
    records: u64,
    purge_interval: u64,
    purge_threshold: u64,
    clear_threshold: usize,
}

impl<W: Write> AuEncoder<W> {
    /// Write the stream header and the first dictionary-clear record.
    pub fn new(out: W, config: EncoderConfig) -> Result<Self> {
        let mut enc = AuEncoder {
            out,
            intern: StringIntern::new(
                config.tiny_str,
                config.intern_threshold,
                config.cache_size,
            ),
            scratch: Vec::with_capacity(1024),
            head: Vec::with_capacity(64),
            pos: 0,
            last_dict_loc: 0,
            last_dict_size: 0,
            records: 0,
            purge_interval: config.purge_interval,
            purge_threshold: config.purge_threshold,
            clear_threshold: config.clear_threshold,
        };
        enc.head.clear();
        enc.head.push(marker::HEADER);
        enc.head.push(marker::VARINT);
        write_varint(&mut enc.head, FORMAT_VERSION);
        if let Some(meta) = &config.metadata {
            enc.head.push(marker::STRING);
            write_varint(&mut enc.head, meta.len() as u64);
            enc.head.extend_from_slice(meta);
        }
        enc.head.extend_from_slice(RECORD_TERM);
        enc.out.write_all(&enc.head)?;
        enc.pos = enc.head.len() as u64;
        enc.clear_dictionary(false)?;
        Ok(enc)
    }

    /// Encode one record. The producer writes a single value through the
    /// [`AuWriter`]; if it writes nothing, the call is a no-op and no
    /// record is emitted. Returns whether a record was written.
    pub fn encode(&mut self, f: impl FnOnce(&mut AuWriter)) -> Result<bool> {
        self.try_encode(|w| {
            f(w);
            Ok(())
        })
    }

    /// Like [`AuEncoder::encode`] for fallible producers. If the producer
    /// errors, the partially-written value is discarded and no record is
    /// emitted.
    pub fn try_encode(
        &mut self,
        f: impl FnOnce(&mut AuWriter) -> Result<()>,
    ) -> Result<bool> {
        let mut buf = std::mem::take(&mut self.scratch);
        buf.clear();
        let produced = {
            let mut writer = AuWriter::new(&mut buf, &mut self.intern);
            f(&mut writer)
        };
        if let Err(e) = produced {
            buf.clear();
            self.scratch = buf;
            return Err(e);
        }
        let wrote = !buf.is_empty();
        if wrote {
            self.export_dict()?;
            self.head.clear();
            self.head.push(marker::VALUE);
            write_varint(&mut self.head, self.pos - self.last_dict_loc);
            write_varint(&mut self.head, buf.len() as u64);
            self.out.write_all(&self.head)?;
            self.out.write_all(&buf)?;
            self.out.write_all(RECORD_TERM)?;
            self.pos += (self.head.len() + buf.len() + RECORD_TERM.len()) as u64;
            self.records += 1;

            if self.records % self.purge_interval == 0 {
                self.intern.purge(self.purge_threshold);
            }
            if self.last_dict_size > self.clear_threshold {
                self.clear_dictionary(true)?;
            }
        }
        self.scratch = buf;
        Ok(wrote)
    }

    /// Emit a `C` record and reset the intern table for a new dictionary.
    pub fn clear_dictionary(&mut self, clear_tracker: bool) -> Result<()> {
        self.intern.clear(clear_tracker);
        self.last_dict_size = 0;
        self.last_dict_loc = self.pos;
        self.out.write_all(&[marker::DICT_CLEAR])?;
        self.out.write_all(RECORD_TERM)?;
        self.pos += 1 + RECORD_TERM.len() as u64;
        Ok(())
    }

    /// Drop intern mappings used fewer than `threshold` times.
    pub fn purge_dictionary(&mut self, threshold: u64) -> usize {
        self.intern.purge(threshold)
    }

    /// Records emitted so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Bytes emitted so far.
    pub fn bytes_written(&self) -> u64 {
        self.pos
    }

    /// Current dictionary size (entries exported or pending export).
    pub fn dict_size(&self) -> usize {
        self.intern.dict().len()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Flush any dictionary entries promoted since the last record.
    fn export_dict(&mut self) -> Result<()> {
        let dict_len = self.intern.dict().len();
        if dict_len > self.last_dict_size {
            let new_loc = self.pos;
            self.head.clear();
            self.head.push(marker::DICT_ADD);
            write_varint(&mut self.head, new_loc - self.last_dict_loc);
            for s in &self.intern.dict()[self.last_dict_size..] {
                self.head.push(marker::STRING);
                write_varint(&mut self.head, s.len() as u64);
                self.head.extend_from_slice(s);
            }
            self.head.extend_from_slice(RECORD_TERM);
            self.out.write_all(&self.head)?;
            self.pos += self.head.len() as u64;
            self.last_dict_loc = new_loc;
            self.last_dict_size = dict_len;
        }
        Ok(())
    }
}
