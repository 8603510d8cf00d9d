//! Variable-length and fixed-width integer codecs.
//!
//! Unsigned varints are LEB128: low seven bits first, high bit set on every
//! byte except the last, at most [`MAX_VARINT_LEN`] bytes. Doubles and the
//! packed 64-bit integer forms are 8 raw little-endian bytes; big-endian
//! hosts byte-swap via `to_le_bytes`/`from_le_bytes`.

use crate::error::{AuError, Result};
use crate::format::MAX_VARINT_LEN;
use crate::source::ByteSource;

// ---------------------------------------------------------------------------
// Encoding (into an in-memory buffer)
// ---------------------------------------------------------------------------

/// Append `v` to `out` as an unsigned varint.
pub fn write_varint(out: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

/// Number of bytes `write_varint` would emit for `v`.
pub fn varint_len(v: u64) -> usize {
    // 1 byte per 7 significant bits, minimum one byte.
    (64 - v.leading_zeros() as usize).div_ceil(7).max(1)
}

/// Append a double as 8 little-endian bytes. NaN and infinities pass
/// through bit-exactly.
pub fn write_f64(out: &mut Vec<u8>, v: f64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Append a packed 64-bit value as 8 little-endian bytes.
pub fn write_u64_le(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Append a packed signed 64-bit value as 8 little-endian bytes.
pub fn write_i64_le(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Decoding (from a byte source)
// ---------------------------------------------------------------------------

/// Read an unsigned varint. More than [`MAX_VARINT_LEN`] bytes is a
/// structural error, as is EOF mid-varint.
pub fn read_varint(source: &mut dyn ByteSource) -> Result<u64> {
    let mut shift = 0u32;
    let mut result = 0u64;
    for _ in 0..MAX_VARINT_LEN {
        let b = source
            .next()?
            .ok_or_else(|| AuError::parse(source.pos(), "eof inside varint"))?;
        result |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
    Err(AuError::parse(
        source.pos(),
        format!("varint exceeds {MAX_VARINT_LEN} bytes"),
    ))
}

/// Read 8 raw little-endian bytes as a double.
pub fn read_f64(source: &mut dyn ByteSource) -> Result<f64> {
    let mut buf = [0u8; 8];
    source.read_into(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Read 8 raw little-endian bytes as an unsigned integer.
pub fn read_u64_le(source: &mut dyn ByteSource) -> Result<u64> {
    let mut buf = [0u8; 8];
    source.read_into(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Read 8 raw little-endian bytes as a signed integer.
pub fn read_i64_le(source: &mut dyn ByteSource) -> Result<i64> {
    let mut buf = [0u8; 8];
    source.read_into(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}
