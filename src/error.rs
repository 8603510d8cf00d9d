//! Error types shared across the crate.
//!
//! Two failure kinds exist on the decode path:
//!
//! - [`AuError::Parse`] — a structural problem in the stream itself (bad
//!   marker, over-long varint, length mismatch, dangling dictionary
//!   reference). Carries the absolute byte offset at which the problem was
//!   detected. Sequential decodes abort on these; tail/bisect catch them
//!   per-candidate and resynchronize.
//! - [`AuError::Io`] — the underlying source failed (open/read/seek/zlib).
//!   Always fatal; propagated to the caller.

use std::fmt;
use std::io;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AuError>;

#[derive(Debug)]
pub enum AuError {
    /// Malformed stream, detected at absolute byte offset `pos`.
    Parse { msg: String, pos: u64 },
    /// Failure of the underlying byte source or sink.
    Io(io::Error),
}

impl AuError {
    /// Construct a structural error at the given stream offset.
    pub fn parse(pos: u64, msg: impl Into<String>) -> Self {
        AuError::Parse {
            msg: msg.into(),
            pos,
        }
    }

    /// True for structural errors, which sync loops may catch and retry.
    pub fn is_parse(&self) -> bool {
        matches!(self, AuError::Parse { .. })
    }
}

impl fmt::Display for AuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuError::Parse { msg, pos } => {
                write!(f, "parse error at byte {pos}: {msg}")
            }
            AuError::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for AuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AuError::Io(e) => Some(e),
            AuError::Parse { .. } => None,
        }
    }
}

impl From<io::Error> for AuError {
    fn from(e: io::Error) -> Self {
        AuError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_offset() {
        let e = AuError::parse(42, "bad marker");
        assert_eq!(e.to_string(), "parse error at byte 42: bad marker");
        assert!(e.is_parse());
    }

    #[test]
    fn io_error_is_not_parse() {
        let e = AuError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert!(!e.is_parse());
    }
}
