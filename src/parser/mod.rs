//! Event-driven stream parsers.
//!
//! [`RecordParser`] walks the record framing (`H`/`C`/`A`/`V`);
//! [`ValueParser`] walks a single value's markers. Both deliver events to
//! handler traits rather than materializing a document, so consumers can
//! stream arbitrarily large values. Strings arrive as a
//! start/fragment*/end triple.
//!
//! Any unexpected byte, over-long varint, mismatched value length, or
//! dangling dictionary reference is a structural error carrying the byte
//! offset where it was detected.

mod record;
mod value;

pub use record::{DictRecordHandler, RecordHandler, RecordParser, ValueSink};
pub use value::{ValueHandler, ValueParser};

use crate::error::{AuError, Result};
use crate::format::marker;
use crate::source::ByteSource;

pub(crate) fn describe(b: u8) -> String {
    if b.is_ascii_graphic() {
        format!("'{}' (0x{b:02x})", b as char)
    } else {
        format!("0x{b:02x}")
    }
}

/// Consume one byte, requiring it to equal `want`.
pub(crate) fn expect(source: &mut dyn ByteSource, want: u8) -> Result<()> {
    match source.next()? {
        Some(b) if b == want => Ok(()),
        Some(b) => Err(AuError::parse(
            source.pos() - 1,
            format!("unexpected byte {}, expected {}", describe(b), describe(want)),
        )),
        None => Err(AuError::parse(
            source.pos(),
            format!("eof, expected {}", describe(want)),
        )),
    }
}

/// Consume the two-byte record terminator.
pub(crate) fn term(source: &mut dyn ByteSource) -> Result<()> {
    expect(source, marker::RECORD_END)?;
    expect(source, b'\n')
}
