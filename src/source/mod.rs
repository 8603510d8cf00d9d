//! Pull-based byte sources.
//!
//! Every decoder component reads through [`ByteSource`]: a cursor over a
//! byte stream with single-byte peek/next, bulk fragment reads, bounded
//! backward seeks, and a forward needle scan. Implementations:
//!
//! - [`FileByteSource`] — buffered file or stdin, optional wait-for-data
//!   mode for `tail -f`.
//! - [`BufferByteSource`] — an in-memory slice.
//! - [`crate::zindex::ZipByteSource`] — a seekable view over an indexed
//!   gzip member.
//!
//! The file-backed variants share [`BufferedSource`], which implements the
//! history/pin buffer policy: at least [`MIN_HISTORY`] consumed bytes stay
//! addressable for short back-seeks (stdin included), and a pin extends
//! that guarantee as far back as the caller needs.

mod buffer;
mod file;

pub use buffer::BufferByteSource;
pub use file::{BufferedSource, FileByteSource, FileRaw, RawSource};

use crate::error::Result;

/// Minimum number of consumed bytes kept in memory behind the cursor.
pub const MIN_HISTORY: usize = 1024;

/// Default buffer granularity: initial size and fixed growth increment.
pub const DEFAULT_BUFFER_CHUNK: usize = 256 * crate::format::KB;

pub trait ByteSource {
    /// Human-readable name for diagnostics (path, `<stdin>`, `<buffer>`).
    fn name(&self) -> &str;

    /// Absolute position of the cursor, `0..=end_pos`.
    fn pos(&self) -> u64;

    /// Total length of the source. Errors for non-seekable sources.
    fn end_pos(&mut self) -> Result<u64>;

    /// Whether [`ByteSource::seek`] can reach arbitrary positions.
    fn is_seekable(&self) -> bool;

    /// The byte under the cursor without consuming it; `None` at EOF.
    fn peek(&mut self) -> Result<Option<u8>>;

    /// Consume and return the byte under the cursor; `None` at EOF.
    fn next(&mut self) -> Result<Option<u8>>;

    /// Deliver the next `len` bytes to `f` in one or more fragments.
    /// EOF before `len` bytes is a structural error.
    fn read_with(&mut self, len: u64, f: &mut dyn FnMut(&[u8])) -> Result<()>;

    /// Advance the cursor by `len` bytes. EOF first is a structural error.
    fn skip(&mut self, len: u64) -> Result<()>;

    /// Move the cursor to an absolute position. Positions inside the
    /// current buffer never touch the underlying device, which is what
    /// makes short back-seeks work on pipes.
    fn seek(&mut self, abspos: u64) -> Result<()>;

    /// Scan forward for `needle`, leaving the cursor on its first byte.
    /// Returns false if EOF is reached first.
    fn scan_to(&mut self, needle: &[u8]) -> Result<bool>;

    /// Require all bytes from `abspos` (which must still be buffered)
    /// onward to stay addressable until the pin is cleared or replaced.
    fn set_pin(&mut self, abspos: u64);

    /// Drop the pin, letting the buffer discard old history again.
    fn clear_pin(&mut self);

    /// Fill `out` exactly, erroring on truncation.
    fn read_into(&mut self, out: &mut [u8]) -> Result<()> {
        let mut off = 0usize;
        let total = out.len() as u64;
        self.read_with(total, &mut |frag| {
            out[off..off + frag.len()].copy_from_slice(frag);
            off += frag.len();
        })
    }

    /// Append the next `len` bytes to `out`.
    fn read_to_vec(&mut self, len: u64, out: &mut Vec<u8>) -> Result<()> {
        self.read_with(len, &mut |frag| out.extend_from_slice(frag))
    }

    /// Position the cursor `len` bytes before EOF (or at 0 for short
    /// sources).
    fn tail(&mut self, len: u64) -> Result<()> {
        let end = self.end_pos()?;
        self.seek(end.saturating_sub(len))
    }
}
