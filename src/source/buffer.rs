//! Byte source over an in-memory slice.

use memchr::memmem;

use crate::error::{AuError, Result};
use crate::source::ByteSource;

/// Zero-copy [`ByteSource`] over a borrowed buffer. The whole slice is
/// always addressable, so pins are no-ops and every seek is in-range or an
/// error.
pub struct BufferByteSource<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BufferByteSource<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        BufferByteSource { buf, pos: 0 }
    }
}

impl ByteSource for BufferByteSource<'_> {
    fn name(&self) -> &str {
        "<buffer>"
    }

    fn pos(&self) -> u64 {
        self.pos as u64
    }

    fn end_pos(&mut self) -> Result<u64> {
        Ok(self.buf.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.buf.get(self.pos).copied())
    }

    fn next(&mut self) -> Result<Option<u8>> {
        match self.buf.get(self.pos).copied() {
            Some(b) => {
                self.pos += 1;
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    fn read_with(&mut self, len: u64, f: &mut dyn FnMut(&[u8])) -> Result<()> {
        let remaining = (self.buf.len() - self.pos) as u64;
        if len > remaining {
            return Err(AuError::parse(
                self.buf.len() as u64,
                format!("reached eof while trying to read {len} bytes"),
            ));
        }
        let end = self.pos + len as usize;
        f(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(())
    }

    fn skip(&mut self, len: u64) -> Result<()> {
        self.read_with(len, &mut |_| {})
    }

    fn seek(&mut self, abspos: u64) -> Result<()> {
        if abspos > self.buf.len() as u64 {
            return Err(AuError::parse(abspos, "seek beyond end of buffer"));
        }
        self.pos = abspos as usize;
        Ok(())
    }

    fn scan_to(&mut self, needle: &[u8]) -> Result<bool> {
        match memmem::find(&self.buf[self.pos..], needle) {
            Some(off) => {
                self.pos += off;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_pin(&mut self, _abspos: u64) {}

    fn clear_pin(&mut self) {}
}
