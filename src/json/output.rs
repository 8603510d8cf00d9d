//! Event-to-JSON rendering.
//!
//! One line of JSON text per value record. Byte strings pass through with
//! only the escaping JSON demands — the format never validates UTF-8, and
//! neither does this writer. Non-finite doubles render as the bare tokens
//! `nan`, `inf` and `-inf`; timestamps render in the canonical textual
//! form, quoted.

use std::io::Write;

use crate::dictionary::Dict;
use crate::error::{AuError, Result};
use crate::parser::{ValueHandler, ValueParser, ValueSink};
use crate::source::ByteSource;
use crate::timestamp::format_nanos;

/// Renders each value record as one JSON line on `out`.
pub struct JsonOutputHandler<W: Write> {
    out: W,
    state: JsonState,
}

impl<W: Write> JsonOutputHandler<W> {
    pub fn new(out: W) -> Self {
        JsonOutputHandler {
            out,
            state: JsonState::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ValueSink for JsonOutputHandler<W> {
    fn on_value(&mut self, source: &mut dyn ByteSource, dict: &Dict) -> Result<()> {
        self.state.reset();
        {
            let mut visitor = JsonVisitor {
                dict,
                state: &mut self.state,
            };
            ValueParser::new(source, &mut visitor).value()?;
        }
        self.state.buf.push(b'\n');
        self.out.write_all(&self.state.buf)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rendering state
// ---------------------------------------------------------------------------

struct Frame {
    object: bool,
    count: usize,
}

#[derive(Default)]
struct JsonState {
    buf: Vec<u8>,
    stack: Vec<Frame>,
    str_buf: Vec<u8>,
}

impl JsonState {
    fn reset(&mut self) {
        self.buf.clear();
        self.stack.clear();
        self.str_buf.clear();
    }

    /// Emit the separator a value at the current position needs, and
    /// account for it in the enclosing container.
    fn prefix(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            if frame.object {
                if frame.count % 2 == 1 {
                    self.buf.push(b':');
                } else if frame.count > 0 {
                    self.buf.push(b',');
                }
            } else if frame.count > 0 {
                self.buf.push(b',');
            }
            frame.count += 1;
        }
    }

    fn string(&mut self, bytes: &[u8]) {
        self.prefix();
        self.buf.push(b'"');
        for &b in bytes {
            match b {
                b'"' => self.buf.extend_from_slice(b"\\\""),
                b'\\' => self.buf.extend_from_slice(b"\\\\"),
                b'\n' => self.buf.extend_from_slice(b"\\n"),
                b'\r' => self.buf.extend_from_slice(b"\\r"),
                b'\t' => self.buf.extend_from_slice(b"\\t"),
                0x08 => self.buf.extend_from_slice(b"\\b"),
                0x0c => self.buf.extend_from_slice(b"\\f"),
                b if b < 0x20 => {
                    let _ = write!(self.buf, "\\u{:04x}", b);
                }
                b => self.buf.push(b),
            }
        }
        self.buf.push(b'"');
    }

    fn raw(&mut self, s: &str) {
        self.prefix();
        self.buf.extend_from_slice(s.as_bytes());
    }
}

struct JsonVisitor<'a> {
    dict: &'a Dict,
    state: &'a mut JsonState,
}

impl ValueHandler for JsonVisitor<'_> {
    fn on_object_start(&mut self) -> Result<()> {
        self.state.prefix();
        self.state.buf.push(b'{');
        self.state.stack.push(Frame {
            object: true,
            count: 0,
        });
        Ok(())
    }

    fn on_object_end(&mut self) -> Result<()> {
        self.state.stack.pop();
        self.state.buf.push(b'}');
        Ok(())
    }

    fn on_array_start(&mut self) -> Result<()> {
        self.state.prefix();
        self.state.buf.push(b'[');
        self.state.stack.push(Frame {
            object: false,
            count: 0,
        });
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<()> {
        self.state.stack.pop();
        self.state.buf.push(b']');
        Ok(())
    }

    fn on_null(&mut self, _pos: u64) -> Result<()> {
        self.state.raw("null");
        Ok(())
    }

    fn on_bool(&mut self, _pos: u64, v: bool) -> Result<()> {
        self.state.raw(if v { "true" } else { "false" });
        Ok(())
    }

    fn on_int(&mut self, _pos: u64, v: i64) -> Result<()> {
        self.state.raw(&v.to_string());
        Ok(())
    }

    fn on_uint(&mut self, _pos: u64, v: u64) -> Result<()> {
        self.state.raw(&v.to_string());
        Ok(())
    }

    fn on_double(&mut self, _pos: u64, v: f64) -> Result<()> {
        if v.is_nan() {
            self.state.raw("nan");
        } else if v.is_infinite() {
            self.state.raw(if v < 0.0 { "-inf" } else { "inf" });
        } else {
            let mut text = v.to_string();
            if !text.contains(|c| c == '.' || c == 'e' || c == 'E') {
                text.push_str(".0");
            }
            self.state.raw(&text);
        }
        Ok(())
    }

    fn on_time(&mut self, _pos: u64, nanos: i64) -> Result<()> {
        let text = format_nanos(nanos);
        self.state.string(text.as_bytes());
        Ok(())
    }

    fn on_dict_ref(&mut self, pos: u64, idx: u64) -> Result<()> {
        match self.dict.get(idx) {
            Some(s) => {
                self.state.string(s);
                Ok(())
            }
            None => Err(AuError::parse(
                pos,
                format!("dictionary reference {idx} out of range"),
            )),
        }
    }

    fn on_string_start(&mut self, _pos: u64, len: u64) -> Result<()> {
        self.state.str_buf.clear();
        self.state.str_buf.reserve(len as usize);
        Ok(())
    }

    fn on_string_fragment(&mut self, frag: &[u8]) -> Result<()> {
        self.state.str_buf.extend_from_slice(frag);
        Ok(())
    }

    fn on_string_end(&mut self) -> Result<()> {
        let s = std::mem::take(&mut self.state.str_buf);
        self.state.string(&s);
        self.state.str_buf = s;
        Ok(())
    }
}
