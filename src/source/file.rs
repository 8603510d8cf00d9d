//! Buffered byte source over a raw device.
//!
//! [`BufferedSource`] owns the buffer/history/pin machinery and delegates
//! actual reads and seeks to a [`RawSource`]. [`FileRaw`] is the plain
//! file/stdin device; the gzip-indexed device lives in `crate::zindex`.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::thread;
use std::time::Duration;

use memchr::memmem;

use crate::error::{AuError, Result};
use crate::source::{ByteSource, DEFAULT_BUFFER_CHUNK, MIN_HISTORY};

/// A device the buffer layer can pull from.
pub trait RawSource {
    fn name(&self) -> &str;
    /// Read some bytes into `buf`; 0 means EOF (for now — a growing file
    /// may yield more later).
    fn do_read(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Reposition the device; the next `do_read` starts at `abspos`.
    fn do_seek(&mut self, abspos: u64) -> Result<()>;
    fn end_pos(&mut self) -> Result<u64>;
    fn is_seekable(&self) -> bool;
}

// ---------------------------------------------------------------------------
// BufferedSource
// ---------------------------------------------------------------------------

/// Growable read buffer with bounded look-back.
///
/// Invariant: all bytes from `min(pin, pos - MIN_HISTORY)` up to the
/// read-ahead limit remain addressable in `buf`. The buffer grows by a
/// fixed chunk whenever the pinned history leaves no room to read ahead.
pub struct BufferedSource<R> {
    raw: R,
    buf: Vec<u8>,
    /// Buffer index of the cursor.
    cur: usize,
    /// One past the last valid byte in `buf`.
    limit: usize,
    /// Absolute stream position of the cursor.
    pos: u64,
    pin: Option<u64>,
    wait_for_data: bool,
    chunk: usize,
}

impl<R> std::fmt::Debug for BufferedSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedSource")
            .field("pos", &self.pos)
            .field("pin", &self.pin)
            .finish()
    }
}

impl<R: RawSource> BufferedSource<R> {
    pub fn new(raw: R, wait_for_data: bool) -> Self {
        Self::with_chunk_size(raw, wait_for_data, DEFAULT_BUFFER_CHUNK)
    }

    pub fn with_chunk_size(raw: R, wait_for_data: bool, chunk: usize) -> Self {
        BufferedSource {
            raw,
            buf: vec![0; chunk],
            cur: 0,
            limit: 0,
            pos: 0,
            pin: None,
            wait_for_data,
            chunk,
        }
    }

    pub fn raw(&mut self) -> &mut R {
        &mut self.raw
    }

    /// Absolute position of the first buffered byte.
    fn buf_start(&self) -> u64 {
        self.pos - self.cur as u64
    }

    /// Bytes buffered ahead of the cursor.
    fn avail(&self) -> usize {
        self.limit - self.cur
    }

    /// Pull more data from the device, sliding out history beyond what the
    /// pin (or the default minimum) requires. Returns false on EOF.
    fn refill(&mut self) -> Result<bool> {
        let mut hist = MIN_HISTORY;
        if let Some(pin) = self.pin {
            if pin < self.pos {
                hist = hist.max((self.pos - pin) as usize);
            }
        }
        if self.cur > hist {
            let start = self.cur - hist;
            self.buf.copy_within(start..self.limit, 0);
            self.cur -= start;
            self.limit -= start;
        }
        if self.limit == self.buf.len() {
            // No free space left: grow by a fixed chunk. Linear growth is
            // enough here; the buffer only exceeds one chunk while a pin is
            // holding history.
            let new_len = self.buf.len() + self.chunk;
            self.buf.resize(new_len, 0);
        }
        loop {
            let n = self.raw.do_read(&mut self.buf[self.limit..])?;
            if n == 0 {
                if self.wait_for_data {
                    thread::sleep(Duration::from_secs(1));
                    continue;
                }
                return Ok(false);
            }
            self.limit += n;
            return Ok(true);
        }
    }
}

impl<R: RawSource> ByteSource for BufferedSource<R> {
    fn name(&self) -> &str {
        self.raw.name()
    }

    fn pos(&self) -> u64 {
        self.pos
    }

    fn end_pos(&mut self) -> Result<u64> {
        self.raw.end_pos()
    }

    fn is_seekable(&self) -> bool {
        self.raw.is_seekable()
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        while self.cur == self.limit {
            if !self.refill()? {
                return Ok(None);
            }
        }
        Ok(Some(self.buf[self.cur]))
    }

    fn next(&mut self) -> Result<Option<u8>> {
        while self.cur == self.limit {
            if !self.refill()? {
                return Ok(None);
            }
        }
        let b = self.buf[self.cur];
        self.cur += 1;
        self.pos += 1;
        Ok(Some(b))
    }

    fn read_with(&mut self, mut len: u64, f: &mut dyn FnMut(&[u8])) -> Result<()> {
        while len > 0 {
            while self.cur == self.limit {
                if !self.refill()? {
                    return Err(AuError::parse(
                        self.pos,
                        format!("reached eof while trying to read {len} bytes"),
                    ));
                }
            }
            let take = (self.avail() as u64).min(len) as usize;
            f(&self.buf[self.cur..self.cur + take]);
            self.cur += take;
            self.pos += take as u64;
            len -= take as u64;
        }
        Ok(())
    }

    fn skip(&mut self, mut len: u64) -> Result<()> {
        // Preferable to seek() even for large skips: not all sources are
        // seekable, and the overwhelming majority of skips are tiny.
        while len > 0 {
            let jump = (self.avail() as u64).min(len) as usize;
            self.cur += jump;
            self.pos += jump as u64;
            len -= jump as u64;
            if len > 0 && !self.refill()? {
                return Err(AuError::parse(self.pos, "eof while skipping"));
            }
        }
        Ok(())
    }

    fn seek(&mut self, abspos: u64) -> Result<()> {
        let start = self.buf_start();
        let end = self.pos + self.avail() as u64;
        if abspos >= start && abspos < end {
            self.cur = (abspos - start) as usize;
            self.pos = abspos;
            return Ok(());
        }
        // Leaving the buffer invalidates any pin.
        self.pin = None;
        self.raw.do_seek(abspos)?;
        self.cur = 0;
        self.limit = 0;
        self.pos = abspos;
        if self.refill()? {
            Ok(())
        } else {
            Err(AuError::parse(abspos, "no data at seek target"))
        }
    }

    fn scan_to(&mut self, needle: &[u8]) -> Result<bool> {
        loop {
            while self.avail() < needle.len() {
                // A seek may have left only a few buffered bytes; the
                // device may also legitimately return short reads. Keep
                // pulling until we can scan or truly hit EOF.
                if !self.refill()? {
                    return Ok(false);
                }
            }
            match memmem::find(&self.buf[self.cur..self.limit], needle) {
                Some(off) => {
                    self.cur += off;
                    self.pos += off as u64;
                    return Ok(true);
                }
                None => {
                    let advance = self.avail() - (needle.len() - 1);
                    self.cur += advance;
                    self.pos += advance as u64;
                }
            }
        }
    }

    fn set_pin(&mut self, abspos: u64) {
        debug_assert!(abspos >= self.buf_start(), "pin must be within buffer");
        self.pin = Some(abspos);
    }

    fn clear_pin(&mut self) {
        self.pin = None;
    }
}

// ---------------------------------------------------------------------------
// FileRaw
// ---------------------------------------------------------------------------

enum Input {
    File(File),
    Stdin(io::Stdin),
}

/// Plain file or stdin device.
pub struct FileRaw {
    name: String,
    input: Input,
}

impl FileRaw {
    pub fn open(path: &str) -> Result<Self> {
        if path == "-" {
            return Ok(FileRaw {
                name: "<stdin>".to_owned(),
                input: Input::Stdin(io::stdin()),
            });
        }
        let file = File::open(path).map_err(|e| {
            AuError::Io(io::Error::new(e.kind(), format!("{path}: {e}")))
        })?;
        Ok(FileRaw {
            name: path.to_owned(),
            input: Input::File(file),
        })
    }
}

impl RawSource for FileRaw {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = match &mut self.input {
            Input::File(f) => f.read(buf)?,
            Input::Stdin(s) => s.lock().read(buf)?,
        };
        Ok(n)
    }

    fn do_seek(&mut self, abspos: u64) -> Result<()> {
        match &mut self.input {
            Input::File(f) => {
                f.seek(SeekFrom::Start(abspos))?;
                Ok(())
            }
            Input::Stdin(_) => Err(AuError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot seek stdin",
            ))),
        }
    }

    fn end_pos(&mut self) -> Result<u64> {
        match &self.input {
            Input::File(f) => Ok(f.metadata()?.len()),
            Input::Stdin(_) => Err(AuError::Io(io::Error::new(
                io::ErrorKind::Unsupported,
                "stdin has no length",
            ))),
        }
    }

    fn is_seekable(&self) -> bool {
        matches!(self.input, Input::File(_))
    }
}

/// Buffered file/stdin byte source.
pub type FileByteSource = BufferedSource<FileRaw>;

impl FileByteSource {
    /// Open `path` (`-` for stdin). `wait_for_data` makes EOF block and
    /// poll once a second instead of terminating, for follow mode.
    pub fn open(path: &str, wait_for_data: bool) -> Result<Self> {
        Ok(BufferedSource::new(FileRaw::open(path)?, wait_for_data))
    }
}
