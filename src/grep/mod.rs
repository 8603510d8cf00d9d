//! Pattern search over streams: linear scan, ordered bisect, and the
//! plaintext timestamp analog.

mod ascii;
mod handler;
mod pattern;
mod scan;

pub use ascii::ascii_grep;
pub use handler::GrepHandler;
pub use pattern::{Atom, KeyMatcher, Pattern, StrMatcher};
pub use scan::{bisect, scan, seek_sync, PREFIX_AMOUNT, SCAN_THRESHOLD, SUFFIX_AMOUNT};
