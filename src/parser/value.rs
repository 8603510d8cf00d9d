//! Recursive-descent value parser.

use crate::error::{AuError, Result};
use crate::format::marker;
use crate::parser::{describe, expect};
use crate::source::ByteSource;
use crate::vint::{read_f64, read_i64_le, read_u64_le, read_varint};

/// Receiver for value events. Every method defaults to "ignore", so
/// handlers implement only what they care about. `pos` arguments are the
/// absolute offset of the value's marker byte.
pub trait ValueHandler {
    fn on_object_start(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_object_end(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_array_start(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_array_end(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_null(&mut self, _pos: u64) -> Result<()> {
        Ok(())
    }
    fn on_bool(&mut self, _pos: u64, _v: bool) -> Result<()> {
        Ok(())
    }
    fn on_int(&mut self, _pos: u64, _v: i64) -> Result<()> {
        Ok(())
    }
    fn on_uint(&mut self, _pos: u64, _v: u64) -> Result<()> {
        Ok(())
    }
    fn on_double(&mut self, _pos: u64, _v: f64) -> Result<()> {
        Ok(())
    }
    fn on_time(&mut self, _pos: u64, _nanos: i64) -> Result<()> {
        Ok(())
    }
    fn on_dict_ref(&mut self, _pos: u64, _idx: u64) -> Result<()> {
        Ok(())
    }
    fn on_string_start(&mut self, _pos: u64, _len: u64) -> Result<()> {
        Ok(())
    }
    fn on_string_fragment(&mut self, _frag: &[u8]) -> Result<()> {
        Ok(())
    }
    fn on_string_end(&mut self) -> Result<()> {
        Ok(())
    }
}

pub struct ValueParser<'a, H: ValueHandler> {
    source: &'a mut dyn ByteSource,
    handler: &'a mut H,
}

impl<'a, H: ValueHandler> ValueParser<'a, H> {
    pub fn new(source: &'a mut dyn ByteSource, handler: &'a mut H) -> Self {
        ValueParser { source, handler }
    }

    /// Parse exactly one value, emitting its events.
    pub fn value(&mut self) -> Result<()> {
        let pos = self.source.pos();
        let c = self
            .source
            .next()?
            .ok_or_else(|| AuError::parse(pos, "eof at start of value"))?;
        match c {
            marker::TRUE => self.handler.on_bool(pos, true),
            marker::FALSE => self.handler.on_bool(pos, false),
            marker::NULL => self.handler.on_null(pos),
            marker::VARINT => {
                let v = read_varint(self.source)?;
                self.handler.on_uint(pos, v)
            }
            marker::NEG_VARINT => {
                let v = read_varint(self.source)?;
                self.handler.on_int(pos, negate(self.source, v)?)
            }
            marker::POS_INT64 => {
                let v = read_u64_le(self.source)?;
                self.handler.on_uint(pos, v)
            }
            marker::NEG_INT64 => {
                let v = read_u64_le(self.source)?;
                self.handler.on_int(pos, negate(self.source, v)?)
            }
            marker::DOUBLE => {
                let v = read_f64(self.source)?;
                self.handler.on_double(pos, v)
            }
            marker::TIMESTAMP => {
                let nanos = read_i64_le(self.source)?;
                self.handler.on_time(pos, nanos)
            }
            marker::DICT_REF => {
                let idx = read_varint(self.source)?;
                self.handler.on_dict_ref(pos, idx)
            }
            marker::STRING => self.string(pos),
            marker::ARRAY_START => self.array(),
            marker::OBJECT_START => self.object(),
            other => Err(AuError::parse(
                pos,
                format!("unexpected byte at start of value: {}", describe(other)),
            )),
        }
    }

    fn string(&mut self, sov: u64) -> Result<()> {
        let len = read_varint(self.source)?;
        self.handler.on_string_start(sov, len)?;
        let handler = &mut *self.handler;
        let mut res = Ok(());
        self.source.read_with(len, &mut |frag| {
            if res.is_ok() {
                res = handler.on_string_fragment(frag);
            }
        })?;
        res?;
        self.handler.on_string_end()
    }

    fn array(&mut self) -> Result<()> {
        self.handler.on_array_start()?;
        loop {
            match self.source.peek()? {
                Some(marker::ARRAY_END) => break,
                Some(_) => self.value()?,
                None => {
                    return Err(AuError::parse(self.source.pos(), "eof inside array"))
                }
            }
        }
        expect(self.source, marker::ARRAY_END)?;
        self.handler.on_array_end()
    }

    fn object(&mut self) -> Result<()> {
        self.handler.on_object_start()?;
        loop {
            match self.source.peek()? {
                Some(marker::OBJECT_END) => break,
                Some(_) => {
                    self.value()?; // key
                    self.value()?; // value
                }
                None => {
                    return Err(AuError::parse(self.source.pos(), "eof inside object"))
                }
            }
        }
        expect(self.source, marker::OBJECT_END)?;
        self.handler.on_object_end()
    }
}

/// Negate a wire magnitude into an i64, rejecting values that cannot be
/// represented.
fn negate(source: &dyn ByteSource, magnitude: u64) -> Result<i64> {
    if magnitude > 1 << 63 {
        return Err(AuError::parse(
            source.pos(),
            format!("negated integer magnitude {magnitude} out of range"),
        ));
    }
    Ok((magnitude as i64).wrapping_neg())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BufferByteSource;

    #[derive(Default)]
    struct Events(Vec<String>);

    impl ValueHandler for Events {
        fn on_object_start(&mut self) -> Result<()> {
            self.0.push("{".into());
            Ok(())
        }
        fn on_object_end(&mut self) -> Result<()> {
            self.0.push("}".into());
            Ok(())
        }
        fn on_array_start(&mut self) -> Result<()> {
            self.0.push("[".into());
            Ok(())
        }
        fn on_array_end(&mut self) -> Result<()> {
            self.0.push("]".into());
            Ok(())
        }
        fn on_null(&mut self, _: u64) -> Result<()> {
            self.0.push("null".into());
            Ok(())
        }
        fn on_bool(&mut self, _: u64, v: bool) -> Result<()> {
            self.0.push(format!("bool:{v}"));
            Ok(())
        }
        fn on_int(&mut self, _: u64, v: i64) -> Result<()> {
            self.0.push(format!("int:{v}"));
            Ok(())
        }
        fn on_uint(&mut self, _: u64, v: u64) -> Result<()> {
            self.0.push(format!("uint:{v}"));
            Ok(())
        }
        fn on_double(&mut self, _: u64, v: f64) -> Result<()> {
            self.0.push(format!("double:{v}"));
            Ok(())
        }
        fn on_time(&mut self, _: u64, nanos: i64) -> Result<()> {
            self.0.push(format!("time:{nanos}"));
            Ok(())
        }
        fn on_dict_ref(&mut self, _: u64, idx: u64) -> Result<()> {
            self.0.push(format!("ref:{idx}"));
            Ok(())
        }
        fn on_string_start(&mut self, _: u64, _: u64) -> Result<()> {
            self.0.push("str<".into());
            Ok(())
        }
        fn on_string_fragment(&mut self, frag: &[u8]) -> Result<()> {
            self.0.push(String::from_utf8_lossy(frag).into_owned());
            Ok(())
        }
        fn on_string_end(&mut self) -> Result<()> {
            self.0.push(">".into());
            Ok(())
        }
    }

    fn parse(bytes: &[u8]) -> Result<Vec<String>> {
        let mut src = BufferByteSource::new(bytes);
        let mut ev = Events::default();
        ValueParser::new(&mut src, &mut ev).value()?;
        Ok(ev.0)
    }

    #[test]
    fn scalars() {
        assert_eq!(parse(b"T").unwrap(), ["bool:true"]);
        assert_eq!(parse(b"N").unwrap(), ["null"]);
        assert_eq!(parse(b"I\x7f").unwrap(), ["uint:127"]);
        assert_eq!(parse(b"J\x80\x01").unwrap(), ["int:-128"]);
    }

    #[test]
    fn packed_forms_accepted() {
        let mut bytes = vec![b'i'];
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        assert_eq!(parse(&bytes).unwrap(), [format!("uint:{}", u64::MAX)]);

        let mut bytes = vec![b'j'];
        bytes.extend_from_slice(&(1u64 << 63).to_le_bytes());
        assert_eq!(parse(&bytes).unwrap(), [format!("int:{}", i64::MIN)]);

        // Packed forms must decode even for values the encoder would have
        // written as varints.
        let mut bytes = vec![b'i'];
        bytes.extend_from_slice(&42u64.to_le_bytes());
        assert_eq!(parse(&bytes).unwrap(), ["uint:42"]);
    }

    #[test]
    fn packed_negative_overflow_is_structural() {
        let mut bytes = vec![b'j'];
        bytes.extend_from_slice(&((1u64 << 63) + 1).to_le_bytes());
        assert!(parse(&bytes).unwrap_err().is_parse());
    }

    #[test]
    fn nested_containers() {
        // [1, {"ab"(inline): null}, []]
        let events = parse(b"[I\x01{S\x02abN}[]]").unwrap();
        assert_eq!(
            events,
            ["[", "uint:1", "{", "str<", "ab", ">", "null", "}", "[", "]", "]"]
        );
    }

    #[test]
    fn timestamp_value() {
        let mut bytes = vec![b't'];
        bytes.extend_from_slice(&123_456_789i64.to_le_bytes());
        assert_eq!(parse(&bytes).unwrap(), ["time:123456789"]);
    }

    #[test]
    fn dict_ref_value() {
        assert_eq!(parse(b"X\x05").unwrap(), ["ref:5"]);
    }

    #[test]
    fn bad_marker_is_structural() {
        assert!(parse(b"Q").unwrap_err().is_parse());
    }

    #[test]
    fn truncated_container_is_structural() {
        assert!(parse(b"[I\x01").unwrap_err().is_parse());
    }
}
