//! Stream-type sniffing and source construction.
//!
//! The canonical probe for an encoded stream is its header record prefix
//! (`H`, `I`, varint 1, `E`); the historical 4-byte signature is still
//! recognized. Gzip members are detected by their standard 2-byte magic
//! and unwrapped through the index-backed source.

use crate::error::Result;
use crate::format::{AU_LEGACY_MAGIC, AU_MAGIC, GZIP_MAGIC};
use crate::source::{ByteSource, FileByteSource};
use crate::zindex::ZipByteSource;

/// Peek the first bytes of the source without disturbing its position.
fn peek_prefix(source: &mut dyn ByteSource, want: usize) -> Result<Vec<u8>> {
    let pos = source.pos();
    let mut prefix = Vec::with_capacity(want);
    for _ in 0..want {
        match source.next()? {
            Some(b) => prefix.push(b),
            None => break,
        }
    }
    // An empty source consumed nothing; seeking it back would have
    // nothing to re-read.
    if source.pos() != pos {
        source.seek(pos)?;
    }
    Ok(prefix)
}

/// Whether the source starts with an encoded stream header.
pub fn is_au_stream(source: &mut dyn ByteSource) -> Result<bool> {
    let prefix = peek_prefix(source, 4)?;
    if prefix.len() < 4 {
        return Ok(false);
    }
    // Canonical: `H I <varint 1>` then either the terminator or the
    // optional metadata string.
    if prefix.starts_with(&AU_MAGIC[..3]) && (prefix[3] == b'E' || prefix[3] == b'S') {
        return Ok(true);
    }
    Ok(prefix.starts_with(AU_LEGACY_MAGIC))
}

/// Whether the source starts with a gzip member.
pub fn is_gzip_stream(source: &mut dyn ByteSource) -> Result<bool> {
    let prefix = peek_prefix(source, 2)?;
    Ok(prefix.starts_with(GZIP_MAGIC))
}

/// Open `path` as a byte source, unwrapping gzip through its sidecar
/// index when the file is compressed (or `force_compressed` is set).
pub fn open_source(
    path: &str,
    index_path: Option<&str>,
    force_compressed: bool,
    wait_for_data: bool,
) -> Result<Box<dyn ByteSource>> {
    let mut file = FileByteSource::open(path, wait_for_data)?;
    if path != "-" && (force_compressed || is_gzip_stream(&mut file)?) {
        let zip = ZipByteSource::open(path, index_path)?;
        return Ok(Box::new(zip));
    }
    Ok(Box::new(file))
}
