//! Re-encoding decoded records into a fresh stream.
//!
//! Used by `grep -e`: matched records are emitted as au rather than JSON.
//! Dictionary references cannot be copied through verbatim — the output
//! stream builds its own dictionary — so every event is replayed against a
//! new encoder, which re-interns strings under its own policy.

use std::io::Write;

use crate::dictionary::Dict;
use crate::encoder::{AuEncoder, AuWriter, EncoderConfig};
use crate::error::{AuError, Result};
use crate::parser::{ValueHandler, ValueParser, ValueSink};
use crate::source::ByteSource;

/// Emits each value record into a new encoded stream on `out`.
pub struct AuOutputHandler<W: Write> {
    enc: AuEncoder<W>,
    str_buf: Vec<u8>,
}

impl<W: Write> AuOutputHandler<W> {
    pub fn new(out: W, config: EncoderConfig) -> Result<Self> {
        Ok(AuOutputHandler {
            enc: AuEncoder::new(out, config)?,
            str_buf: Vec::new(),
        })
    }

    pub fn flush(&mut self) -> Result<()> {
        self.enc.flush()
    }

    pub fn into_inner(self) -> W {
        self.enc.into_inner()
    }
}

impl<W: Write> ValueSink for AuOutputHandler<W> {
    fn on_value(&mut self, source: &mut dyn ByteSource, dict: &Dict) -> Result<()> {
        let str_buf = &mut self.str_buf;
        self.enc.try_encode(|w| {
            let mut visitor = ReplayVisitor {
                dict,
                w,
                str_buf,
                object_depth: Vec::new(),
            };
            ValueParser::new(source, &mut visitor).value()
        })?;
        Ok(())
    }
}

struct ReplayVisitor<'a, 'w> {
    dict: &'a Dict,
    w: &'a mut AuWriter<'w>,
    str_buf: &'a mut Vec<u8>,
    /// Per-container value counters, to re-apply key interning in objects.
    object_depth: Vec<(bool, usize)>,
}

impl ReplayVisitor<'_, '_> {
    fn is_key_position(&self) -> bool {
        matches!(self.object_depth.last(), Some((true, count)) if count % 2 == 0)
    }

    fn count_value(&mut self) {
        if let Some((_, count)) = self.object_depth.last_mut() {
            *count += 1;
        }
    }

    fn emit_string(&mut self, s: &[u8]) {
        if self.is_key_position() {
            self.w.key(s);
        } else {
            self.w.string(s);
        }
        self.count_value();
    }
}

impl ValueHandler for ReplayVisitor<'_, '_> {
    fn on_object_start(&mut self) -> Result<()> {
        self.w.start_map();
        self.object_depth.push((true, 0));
        Ok(())
    }

    fn on_object_end(&mut self) -> Result<()> {
        self.object_depth.pop();
        self.w.end_map();
        self.count_value();
        Ok(())
    }

    fn on_array_start(&mut self) -> Result<()> {
        self.w.start_array();
        self.object_depth.push((false, 0));
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<()> {
        self.object_depth.pop();
        self.w.end_array();
        self.count_value();
        Ok(())
    }

    fn on_null(&mut self, _pos: u64) -> Result<()> {
        self.w.null();
        self.count_value();
        Ok(())
    }

    fn on_bool(&mut self, _pos: u64, v: bool) -> Result<()> {
        self.w.boolean(v);
        self.count_value();
        Ok(())
    }

    fn on_int(&mut self, _pos: u64, v: i64) -> Result<()> {
        self.w.int(v);
        self.count_value();
        Ok(())
    }

    fn on_uint(&mut self, _pos: u64, v: u64) -> Result<()> {
        self.w.uint(v);
        self.count_value();
        Ok(())
    }

    fn on_double(&mut self, _pos: u64, v: f64) -> Result<()> {
        self.w.double(v);
        self.count_value();
        Ok(())
    }

    fn on_time(&mut self, _pos: u64, nanos: i64) -> Result<()> {
        self.w.time(nanos);
        self.count_value();
        Ok(())
    }

    fn on_dict_ref(&mut self, pos: u64, idx: u64) -> Result<()> {
        let s = self
            .dict
            .get(idx)
            .ok_or_else(|| {
                AuError::parse(pos, format!("dictionary reference {idx} out of range"))
            })?
            .to_vec();
        self.emit_string(&s);
        Ok(())
    }

    fn on_string_start(&mut self, _pos: u64, len: u64) -> Result<()> {
        self.str_buf.clear();
        self.str_buf.reserve(len as usize);
        Ok(())
    }

    fn on_string_fragment(&mut self, frag: &[u8]) -> Result<()> {
        self.str_buf.extend_from_slice(frag);
        Ok(())
    }

    fn on_string_end(&mut self) -> Result<()> {
        let s = std::mem::take(self.str_buf);
        self.emit_string(&s);
        *self.str_buf = s;
        Ok(())
    }
}
