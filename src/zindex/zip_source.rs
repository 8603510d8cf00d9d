//! Seekable byte source over an indexed gzip member.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{AuError, Result};
use crate::source::{BufferedSource, RawSource};
use crate::zindex::{
    index_filename, mod_time_secs, uncompress_window, zlib_io_error, ZStream, Zindex,
    CHUNK_SIZE, WINDOW_SIZE,
};

/// One inflation context: a position in the uncompressed stream and the
/// zlib state that produces bytes from there on.
struct InflateCtx {
    zs: ZStream,
    /// Uncompressed position of the next byte `read` will produce.
    pos: u64,
    eof: bool,
}

impl InflateCtx {
    /// Fresh context at the very start of the member.
    fn from_start() -> Result<Self> {
        Ok(InflateCtx {
            zs: ZStream::auto()?,
            pos: 0,
            eof: false,
        })
    }

    /// Raw context resuming at an access point.
    fn at_offset(uncompressed_offset: u64) -> Result<Self> {
        Ok(InflateCtx {
            zs: ZStream::raw()?,
            pos: uncompressed_offset,
            eof: false,
        })
    }
}

/// The decompressing device under [`ZipByteSource`].
pub struct ZipRaw {
    name: String,
    file: File,
    index: Zindex,
    ctx: InflateCtx,
    /// Compressed input buffer; the z_stream keeps pointers into this
    /// between reads, so it is allocated once and never resized.
    input: Box<[u8]>,
    /// Average uncompressed span per access point; seeks closer than
    /// this decompress forward instead of restarting.
    forward_window: u64,
}

impl ZipRaw {
    pub fn open(path: &str, index_path: Option<&str>) -> Result<Self> {
        let ifn = index_filename(path, index_path);
        let index = Zindex::load(&ifn)?;
        let file = File::open(path)?;

        let base = crate::zindex::base_name(path);
        if index.compressed_filename != base.as_bytes() {
            return Err(AuError::parse(
                0,
                format!(
                    "wrong compressed filename in index: '{}', expected '{base}'",
                    String::from_utf8_lossy(&index.compressed_filename)
                ),
            ));
        }
        let meta = file.metadata()?;
        if meta.len() != index.compressed_size {
            return Err(AuError::parse(
                0,
                "compressed size changed since the index was built",
            ));
        }
        if mod_time_secs(&file)? != index.compressed_mod_time {
            return Err(AuError::parse(
                0,
                "compressed file has been modified since the index was built",
            ));
        }

        let forward_window =
            2 * index.uncompressed_size() / index.num_entries().max(1) as u64;
        Ok(ZipRaw {
            name: path.to_owned(),
            file,
            index,
            ctx: InflateCtx::from_start()?,
            input: vec![0u8; CHUNK_SIZE].into_boxed_slice(),
            forward_window,
        })
    }

    /// Restart inflation at the access point covering `abspos`, or at
    /// the start of the member when none precedes it.
    fn restart_at(&mut self, abspos: u64) -> Result<()> {
        let point = match self.index.find(abspos) {
            Some(e) => Some((
                e.compressed_offset,
                e.uncompressed_offset,
                e.bit_offset,
                uncompress_window(&e.window)?,
            )),
            None => None,
        };
        let (compressed_offset, uncompressed_offset, bit_offset, window) = match point {
            Some(p) => p,
            None => {
                self.ctx = InflateCtx::from_start()?;
                self.file.seek(SeekFrom::Start(0))?;
                return Ok(());
            }
        };

        self.ctx = InflateCtx::at_offset(uncompressed_offset)?;
        let seek_pos = if bit_offset > 0 {
            compressed_offset - 1
        } else {
            compressed_offset
        };
        self.file.seek(SeekFrom::Start(seek_pos))?;
        self.ctx.zs.clear_input();
        if bit_offset > 0 {
            let mut byte = [0u8; 1];
            self.file.read_exact(&mut byte)?;
            self.ctx.zs.prime(bit_offset, byte[0] >> (8 - bit_offset))?;
        }
        self.ctx.zs.set_dictionary(&window[..WINDOW_SIZE])?;
        Ok(())
    }

    /// Decompress and discard until the context reaches `abspos`.
    fn skip_to(&mut self, abspos: u64) -> Result<()> {
        let mut scratch = vec![0u8; WINDOW_SIZE];
        while self.ctx.pos < abspos {
            let want = (abspos - self.ctx.pos).min(scratch.len() as u64) as usize;
            let n = self.do_read(&mut scratch[..want])?;
            if n == 0 {
                return Err(AuError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unable to skip forward in compressed stream",
                )));
            }
        }
        Ok(())
    }
}

impl RawSource for ZipRaw {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_read(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.ctx.eof || out.is_empty() {
            return Ok(0);
        }
        self.ctx.zs.set_output(out);
        let mut produced = 0usize;
        while self.ctx.zs.avail_out() > 0 {
            if self.ctx.zs.avail_in() == 0 {
                let n = self.file.read(&mut self.input)?;
                if n == 0 {
                    if produced == 0 {
                        return Err(zlib_io_error(
                            libz_sys::Z_DATA_ERROR,
                            "compressed stream truncated",
                        ));
                    }
                    break;
                }
                self.ctx.zs.set_input(&self.input[..n]);
            }
            let in_before = self.ctx.zs.avail_in();
            let out_before = self.ctx.zs.avail_out();
            let rc = self.ctx.zs.inflate_some()?;
            produced += (out_before - self.ctx.zs.avail_out()) as usize;
            if rc == libz_sys::Z_STREAM_END {
                // End of the first member. Anything after it was never
                // indexed; the builder warned when it mattered.
                self.ctx.eof = true;
                break;
            }
            if self.ctx.zs.avail_in() == in_before
                && self.ctx.zs.avail_out() == out_before
            {
                return Err(zlib_io_error(rc, "inflate made no progress"));
            }
        }
        self.ctx.pos += produced as u64;
        Ok(produced)
    }

    fn do_seek(&mut self, abspos: u64) -> Result<()> {
        if abspos < self.ctx.pos || abspos - self.ctx.pos > self.forward_window {
            self.restart_at(abspos)?;
        }
        self.skip_to(abspos)
    }

    fn end_pos(&mut self) -> Result<u64> {
        Ok(self.index.uncompressed_size())
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

/// Buffered, seekable view over an indexed gzip member.
pub type ZipByteSource = BufferedSource<ZipRaw>;

impl ZipByteSource {
    /// Open `path` through its sidecar index (`<path>.auzx` unless
    /// overridden), validating that the index still matches the file.
    pub fn open(path: &str, index_path: Option<&str>) -> Result<Self> {
        Ok(BufferedSource::new(ZipRaw::open(path, index_path)?, false))
    }
}
