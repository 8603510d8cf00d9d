//! Minimal RAII wrapper over the zlib inflate state.
//!
//! `flate2` covers the one-shot window snapshots, but building and using
//! access points needs three things only the C API exposes: `Z_BLOCK`
//! flush (stop at DEFLATE block boundaries and report them in
//! `data_type`), `inflatePrime` (resume at a bit offset inside a byte),
//! and `inflateSetDictionary` (preload the 32 KiB sliding window).

use std::io;
use std::mem;

use libc::{c_int, c_uint};

use crate::error::{AuError, Result};

fn zlib_error_name(rc: c_int) -> &'static str {
    match rc {
        libz_sys::Z_ERRNO => "Z_ERRNO",
        libz_sys::Z_STREAM_ERROR => "Z_STREAM_ERROR",
        libz_sys::Z_DATA_ERROR => "Z_DATA_ERROR",
        libz_sys::Z_MEM_ERROR => "Z_MEM_ERROR",
        libz_sys::Z_BUF_ERROR => "Z_BUF_ERROR",
        libz_sys::Z_VERSION_ERROR => "Z_VERSION_ERROR",
        libz_sys::Z_NEED_DICT => "Z_NEED_DICT",
        _ => "unknown zlib error",
    }
}

pub(crate) fn zlib_io_error(rc: c_int, context: &str) -> AuError {
    AuError::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("{context}: {} ({rc})", zlib_error_name(rc)),
    ))
}

fn check(rc: c_int, context: &str) -> Result<()> {
    if rc == libz_sys::Z_OK {
        Ok(())
    } else {
        Err(zlib_io_error(rc, context))
    }
}

/// Inflate state. The `set_input`/`set_output` pointers must refer to
/// buffers that stay alive and unmoved until fully consumed or replaced;
/// both callers in this module own fixed heap buffers for exactly that
/// reason.
///
/// The `z_stream` itself is boxed: zlib's internal state keeps a
/// back-pointer to it, so its address must survive moves of this wrapper.
pub(crate) struct ZStream {
    strm: Box<libz_sys::z_stream>,
}

impl ZStream {
    fn init(window_bits: c_int, context: &str) -> Result<Self> {
        // SAFETY: a zeroed z_stream is the documented way to initialize —
        // null zalloc/zfree select the default allocator. Written via
        // MaybeUninit + write_bytes rather than mem::zeroed() because the
        // current libz-sys z_stream layout trips Rust's invalid-value
        // check on a direct zeroing read, even though all-zero is a valid
        // z_stream per the zlib docs.
        let mut strm: Box<libz_sys::z_stream> = unsafe {
            let mut uninit: Box<mem::MaybeUninit<libz_sys::z_stream>> =
                Box::new(mem::MaybeUninit::uninit());
            std::ptr::write_bytes(uninit.as_mut_ptr(), 0, 1);
            Box::from_raw(Box::into_raw(uninit) as *mut libz_sys::z_stream)
        };
        // SAFETY: strm is a valid zeroed stream at a stable heap address;
        // the version/size pair is the ABI handshake inflateInit2_
        // requires.
        let rc = unsafe {
            libz_sys::inflateInit2_(
                strm.as_mut(),
                window_bits,
                libz_sys::zlibVersion(),
                mem::size_of::<libz_sys::z_stream>() as c_int,
            )
        };
        check(rc, context)?;
        Ok(ZStream { strm })
    }

    /// Auto-detecting zlib/gzip stream with the maximum window.
    pub(crate) fn auto() -> Result<Self> {
        Self::init(32 + 15, "inflateInit2 (auto)")
    }

    /// Raw DEFLATE, for resuming mid-member at an access point.
    pub(crate) fn raw() -> Result<Self> {
        Self::init(-15, "inflateInit2 (raw)")
    }

    pub(crate) fn avail_in(&self) -> u32 {
        self.strm.avail_in
    }

    pub(crate) fn avail_out(&self) -> u32 {
        self.strm.avail_out
    }

    /// Point the inflater at fresh compressed input.
    pub(crate) fn set_input(&mut self, buf: &[u8]) {
        self.strm.next_in = buf.as_ptr() as *mut u8;
        self.strm.avail_in = buf.len() as c_uint;
    }

    /// Point the inflater at an output region.
    pub(crate) fn set_output(&mut self, buf: &mut [u8]) {
        self.strm.next_out = buf.as_mut_ptr();
        self.strm.avail_out = buf.len() as c_uint;
    }

    /// Drop any unconsumed input.
    pub(crate) fn clear_input(&mut self) {
        self.strm.next_in = std::ptr::null_mut();
        self.strm.avail_in = 0;
    }

    fn inflate(&mut self, flush: c_int, context: &str) -> Result<c_int> {
        // SAFETY: next_in/next_out were established by set_input/
        // set_output over live buffers (or are null with avail 0).
        let rc = unsafe { libz_sys::inflate(self.strm.as_mut(), flush) };
        match rc {
            libz_sys::Z_NEED_DICT => Err(zlib_io_error(libz_sys::Z_DATA_ERROR, context)),
            libz_sys::Z_MEM_ERROR | libz_sys::Z_DATA_ERROR | libz_sys::Z_STREAM_ERROR => {
                Err(zlib_io_error(rc, context))
            }
            rc => Ok(rc),
        }
    }

    /// Inflate, stopping at DEFLATE block boundaries.
    pub(crate) fn inflate_block(&mut self) -> Result<c_int> {
        self.inflate(libz_sys::Z_BLOCK, "inflate (Z_BLOCK)")
    }

    /// Plain inflate until input or output runs out.
    pub(crate) fn inflate_some(&mut self) -> Result<c_int> {
        self.inflate(libz_sys::Z_NO_FLUSH, "inflate")
    }

    /// After `inflate_block`: positioned exactly at a block boundary?
    pub(crate) fn at_block_boundary(&self) -> bool {
        self.strm.data_type & 0x80 != 0
    }

    /// After `inflate_block`: was that boundary the final block's?
    pub(crate) fn at_last_block(&self) -> bool {
        self.strm.data_type & 0x40 != 0
    }

    /// Bit offset of the current position within its compressed byte.
    pub(crate) fn bit_offset(&self) -> u8 {
        (self.strm.data_type & 0x7) as u8
    }

    /// Feed the fractional leading bits when resuming mid-byte.
    pub(crate) fn prime(&mut self, bits: u8, value: u8) -> Result<()> {
        // SAFETY: strm is initialized; prime copies the bits immediately.
        let rc = unsafe {
            libz_sys::inflatePrime(self.strm.as_mut(), c_int::from(bits), c_int::from(value))
        };
        check(rc, "inflatePrime")
    }

    /// Preload the sliding window for a raw resume.
    pub(crate) fn set_dictionary(&mut self, window: &[u8]) -> Result<()> {
        // SAFETY: strm is initialized; zlib copies the dictionary into
        // its own state before returning.
        let rc = unsafe {
            libz_sys::inflateSetDictionary(
                self.strm.as_mut(),
                window.as_ptr(),
                window.len() as c_uint,
            )
        };
        check(rc, "inflateSetDictionary")
    }
}

impl Drop for ZStream {
    fn drop(&mut self) {
        // SAFETY: strm was initialized by inflateInit2_ and not yet ended.
        unsafe {
            libz_sys::inflateEnd(self.strm.as_mut());
        }
    }
}

// The stream owns no thread-affine state; the raw pointers refer to
// buffers owned by the same enclosing struct.
unsafe impl Send for ZStream {}
