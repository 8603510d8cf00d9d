//! Gzip random-access index (`.auzx`).
//!
//! A gzip member is a single DEFLATE stream: decompression normally must
//! start from byte zero. The index records *access points* — positions
//! where inflation can resume, given the bit offset into the compressed
//! byte and a snapshot of the preceding 32 KiB of uncompressed output
//! (the DEFLATE sliding window). With those, a reader seeks the
//! compressed file, primes the inflater with the fractional byte, loads
//! the window as a dictionary, and continues as if it had been inflating
//! all along.
//!
//! The index file is itself an encoded stream. Record one is metadata
//! (`fileType`, `version`, `compressedFile`, `compressedSize`,
//! `compressedModTime`); each further record is one access point
//! (`uncompressedOffset`, `compressedOffset`, `bitOffset`, `window`,
//! with the window zlib-compressed); the final record is a sentinel with
//! an empty window whose offsets record the totals.
//!
//! Only single-member files are supported: a multi-member file is indexed
//! up to the end of its first member and the builder warns.

mod zstream;
mod zip_source;

pub use zip_source::{ZipByteSource, ZipRaw};
pub(crate) use zstream::{zlib_io_error, ZStream};

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::dictionary::{Dict, Dictionary};
use crate::displaylevel;
use crate::encoder::{AuEncoder, EncoderConfig};
use crate::error::{AuError, Result};
use crate::format::{MB, ZINDEX_EXTENSION};
use crate::parser::{DictRecordHandler, RecordParser, ValueHandler, ValueParser, ValueSink};
use crate::source::{ByteSource, FileByteSource};

/// Minimum uncompressed distance between access points.
pub const DEFAULT_INDEX_EVERY: u64 = 8 * MB as u64;
/// The DEFLATE sliding window.
pub const WINDOW_SIZE: usize = 32768;
/// Compressed-file read granularity.
pub(crate) const CHUNK_SIZE: usize = 16384;
/// Index format version.
pub const ZINDEX_VERSION: u64 = 1;

/// Resolve the sidecar filename: an explicit override, or
/// `<realpath>.auzx`.
pub fn index_filename(path: &str, explicit: Option<&str>) -> String {
    if let Some(p) = explicit {
        return p.to_owned();
    }
    let real = std::fs::canonicalize(path)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| path.to_owned());
    format!("{real}{ZINDEX_EXTENSION}")
}

pub(crate) fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_owned())
}

/// Seconds-since-epoch mtime of an open file.
pub(crate) fn mod_time_secs(file: &File) -> Result<u64> {
    let modified = file.metadata()?.modified()?;
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Index builder
// ---------------------------------------------------------------------------

/// Build the access-point index for `path`, writing the sidecar next to
/// it (or to `index_path`).
pub fn build_index(
    path: &str,
    index_path: Option<&str>,
    index_every: u64,
) -> Result<()> {
    let ifn = index_filename(path, index_path);
    displaylevel!(2, "Indexing {path} to {ifn}...\n");

    let mut from = File::open(path)?;
    let compressed_size = from.metadata()?.len();
    let compressed_mod_time = mod_time_secs(&from)?;

    if std::fs::remove_file(&ifn).is_ok() {
        displaylevel!(2, "Rebuilding existing index {ifn}\n");
    }
    let out = BufWriter::new(File::create(&ifn)?);
    let config = EncoderConfig::default()
        .with_metadata(format!("Index of {path}, written by au"));
    let mut idx = AuEncoder::new(out, config)?;

    let file_base = base_name(path);
    idx.encode(|w| {
        w.map(|w| {
            w.key(b"fileType");
            w.string_hint(b"zindex", Some(false));
            w.key(b"version");
            w.uint(ZINDEX_VERSION);
            w.key(b"compressedFile");
            w.string_hint(file_base.as_bytes(), Some(false));
            w.key(b"compressedSize");
            w.uint(compressed_size);
            w.key(b"compressedModTime");
            w.uint(compressed_mod_time);
        });
    })?;

    let mut zs = ZStream::auto()?;
    let mut input = vec![0u8; CHUNK_SIZE];
    let mut window = vec![0u8; WINDOW_SIZE];

    let mut total_in: u64 = 0;
    let mut total_out: u64 = 0;
    let mut last_point: u64 = 0;
    let mut first_point_pending = true;
    let mut stream_ended = false;

    while !stream_ended {
        if zs.avail_in() == 0 {
            let n = from.read(&mut input)?;
            if n == 0 {
                return Err(zlib_io_error(
                    libz_sys::Z_DATA_ERROR,
                    "unexpected end of compressed input",
                ));
            }
            zs.set_input(&input[..n]);
        }
        loop {
            if zs.avail_out() == 0 {
                // The window buffer doubles as the rolling 32 KiB of
                // uncompressed history.
                zs.set_output(&mut window);
            }
            let in_before = zs.avail_in() as u64;
            let out_before = zs.avail_out() as u64;
            let rc = zs.inflate_block()?;
            total_in += in_before - zs.avail_in() as u64;
            total_out += out_before - zs.avail_out() as u64;
            if rc == libz_sys::Z_STREAM_END {
                stream_ended = true;
                break;
            }
            let since_last = total_out - last_point;
            let needs_point = since_last > index_every || first_point_pending;
            if zs.at_block_boundary() && !zs.at_last_block() && needs_point {
                displaylevel!(
                    3,
                    "Creating checkpoint at {total_out} (compressed offset {total_in})\n"
                );
                let snapshot = window_snapshot(&window, zs.avail_out() as usize)?;
                idx.encode(|w| {
                    w.map(|w| {
                        w.key(b"uncompressedOffset");
                        w.uint(total_out);
                        w.key(b"compressedOffset");
                        w.uint(total_in);
                        w.key(b"bitOffset");
                        w.uint(u64::from(zs.bit_offset()));
                        w.key(b"window");
                        w.string_hint(&snapshot, Some(false));
                    });
                })?;
                last_point = total_out;
                first_point_pending = false;
            }
            if zs.avail_in() == 0 {
                break;
            }
        }
    }

    let mut trailing = [0u8; 1];
    if zs.avail_in() > 0 || from.read(&mut trailing)? > 0 {
        displaylevel!(
            1,
            "WARNING: this file appears to contain multiple gzip members.\n\
             Data beyond the first member will not be indexed.\n"
        );
    }

    let final_bit_offset = zs.bit_offset();
    idx.encode(|w| {
        w.map(|w| {
            w.key(b"uncompressedOffset");
            w.uint(total_out);
            w.key(b"compressedOffset");
            w.uint(total_in);
            w.key(b"bitOffset");
            w.uint(u64::from(final_bit_offset));
            w.key(b"window");
            w.string_hint(b"", Some(false));
        });
    })?;
    idx.flush()?;
    displaylevel!(2, "Index complete.\n");
    Ok(())
}

/// Assemble the last 32 KiB of output from the rolling window buffer and
/// compress it for storage. `left` is the unwritten remainder of the
/// current window cycle, so the oldest data sits just past it.
fn window_snapshot(window: &[u8], left: usize) -> Result<Vec<u8>> {
    let mut ordered = Vec::with_capacity(WINDOW_SIZE);
    if left > 0 {
        ordered.extend_from_slice(&window[WINDOW_SIZE - left..]);
    }
    ordered.extend_from_slice(&window[..WINDOW_SIZE - left]);

    let mut enc = ZlibEncoder::new(Vec::new(), Compression::new(9));
    enc.write_all(&ordered)?;
    Ok(enc.finish()?)
}

/// Inflate a stored window snapshot back to its 32 KiB.
pub(crate) fn uncompress_window(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(WINDOW_SIZE);
    ZlibDecoder::new(compressed).read_to_end(&mut out)?;
    if out.len() != WINDOW_SIZE {
        return Err(AuError::parse(
            0,
            format!("index window inflated to {} bytes, wanted {WINDOW_SIZE}", out.len()),
        ));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Index model
// ---------------------------------------------------------------------------

pub struct IndexEntry {
    pub compressed_offset: u64,
    pub uncompressed_offset: u64,
    pub bit_offset: u8,
    pub window: Vec<u8>,
}

pub struct Zindex {
    entries: Vec<IndexEntry>,
    pub compressed_filename: Vec<u8>,
    pub compressed_size: u64,
    pub compressed_mod_time: u64,
}

impl Zindex {
    /// Load and validate a sidecar index file.
    pub fn load(index_path: &str) -> Result<Self> {
        let mut source = FileByteSource::open(index_path, false)?;
        let mut dictionary = Dictionary::new(1);
        let mut collector = FlatMapSink::default();
        {
            let mut handler = DictRecordHandler::new(&mut dictionary, &mut collector);
            RecordParser::new(&mut source, &mut handler).parse_stream()?;
        }
        let mut records = collector.records.into_iter();

        let meta = records.next().ok_or_else(|| {
            AuError::parse(0, "index contains no metadata record")
        })?;
        if meta.str_field(b"fileType") != Some(b"zindex".as_slice()) {
            return Err(AuError::parse(0, "wrong fileType in index, expected 'zindex'"));
        }
        if meta.uint_field(b"version") != Some(ZINDEX_VERSION) {
            return Err(AuError::parse(
                0,
                format!("wrong index version, expected {ZINDEX_VERSION}"),
            ));
        }
        let compressed_filename = meta
            .str_field(b"compressedFile")
            .ok_or_else(|| AuError::parse(0, "index metadata lacks compressedFile"))?
            .to_vec();
        let compressed_size = meta
            .uint_field(b"compressedSize")
            .ok_or_else(|| AuError::parse(0, "index metadata lacks compressedSize"))?;
        let compressed_mod_time = meta
            .uint_field(b"compressedModTime")
            .ok_or_else(|| AuError::parse(0, "index metadata lacks compressedModTime"))?;

        let mut entries = Vec::new();
        for rec in records {
            entries.push(IndexEntry {
                compressed_offset: rec.uint_field(b"compressedOffset").ok_or_else(|| {
                    AuError::parse(0, "index entry lacks compressedOffset")
                })?,
                uncompressed_offset: rec
                    .uint_field(b"uncompressedOffset")
                    .ok_or_else(|| {
                        AuError::parse(0, "index entry lacks uncompressedOffset")
                    })?,
                bit_offset: rec
                    .uint_field(b"bitOffset")
                    .ok_or_else(|| AuError::parse(0, "index entry lacks bitOffset"))?
                    as u8,
                window: rec
                    .str_field(b"window")
                    .ok_or_else(|| AuError::parse(0, "index entry lacks window"))?
                    .to_vec(),
            });
        }

        if entries.is_empty() {
            return Err(AuError::parse(0, "index should contain at least one entry"));
        }
        let last = entries.last().expect("checked non-empty");
        if !last.window.is_empty() {
            return Err(AuError::parse(
                0,
                "index appears incomplete: final entry has window data",
            ));
        }
        if last.compressed_offset != compressed_size {
            return Err(AuError::parse(
                0,
                format!(
                    "index appears incomplete: final compressed offset {} vs size {}",
                    last.compressed_offset, compressed_size
                ),
            ));
        }

        Ok(Zindex {
            entries,
            compressed_filename,
            compressed_size,
            compressed_mod_time,
        })
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Total uncompressed size: the sentinel's offset.
    pub fn uncompressed_size(&self) -> u64 {
        self.entries.last().map(|e| e.uncompressed_offset).unwrap_or(0)
    }

    /// The newest access point at or before `abspos`, excluding the
    /// sentinel. `None` means "start from the beginning of the member".
    pub fn find(&self, abspos: u64) -> Option<&IndexEntry> {
        let idx = self
            .entries
            .partition_point(|e| e.uncompressed_offset <= abspos);
        if idx == 0 {
            return None;
        }
        let entry = &self.entries[idx - 1];
        if entry.window.is_empty() {
            // Sentinel: past every usable access point.
            return None;
        }
        Some(entry)
    }
}

// ---------------------------------------------------------------------------
// Flat-record collection (for reading index files)
// ---------------------------------------------------------------------------

pub(crate) enum Scalar {
    Uint(u64),
    Str(Vec<u8>),
    Other,
}

#[derive(Default)]
pub(crate) struct FlatRecord {
    pairs: Vec<(Vec<u8>, Scalar)>,
}

impl FlatRecord {
    pub(crate) fn uint_field(&self, key: &[u8]) -> Option<u64> {
        self.pairs.iter().find(|(k, _)| k == key).and_then(|(_, v)| match v {
            Scalar::Uint(u) => Some(*u),
            _ => None,
        })
    }

    pub(crate) fn str_field(&self, key: &[u8]) -> Option<&[u8]> {
        self.pairs.iter().find(|(k, _)| k == key).and_then(|(_, v)| match v {
            Scalar::Str(s) => Some(s.as_slice()),
            _ => None,
        })
    }
}

/// Collects each record as a flat key/scalar map. Nested containers
/// inside a record collapse to [`Scalar::Other`].
#[derive(Default)]
pub(crate) struct FlatMapSink {
    pub(crate) records: Vec<FlatRecord>,
}

impl ValueSink for FlatMapSink {
    fn on_value(&mut self, source: &mut dyn ByteSource, dict: &Dict) -> Result<()> {
        let mut visitor = FlatMapVisitor {
            dict,
            record: FlatRecord::default(),
            depth: 0,
            pending_key: None,
            str_buf: Vec::new(),
        };
        ValueParser::new(source, &mut visitor).value()?;
        self.records.push(visitor.record);
        Ok(())
    }
}

struct FlatMapVisitor<'a> {
    dict: &'a Dict,
    record: FlatRecord,
    depth: u32,
    pending_key: Option<Vec<u8>>,
    str_buf: Vec<u8>,
}

impl FlatMapVisitor<'_> {
    fn scalar(&mut self, v: Scalar) {
        if self.depth == 1 {
            if let Some(key) = self.pending_key.take() {
                self.record.pairs.push((key, v));
            }
        }
    }

    fn string(&mut self, s: &[u8]) {
        if self.depth != 1 {
            return;
        }
        if self.pending_key.is_none() {
            self.pending_key = Some(s.to_vec());
        } else {
            self.scalar(Scalar::Str(s.to_vec()));
        }
    }
}

impl ValueHandler for FlatMapVisitor<'_> {
    fn on_object_start(&mut self) -> Result<()> {
        if self.depth >= 1 {
            self.scalar(Scalar::Other);
        }
        self.depth += 1;
        Ok(())
    }
    fn on_object_end(&mut self) -> Result<()> {
        self.depth -= 1;
        Ok(())
    }
    fn on_array_start(&mut self) -> Result<()> {
        if self.depth >= 1 {
            self.scalar(Scalar::Other);
        }
        self.depth += 1;
        Ok(())
    }
    fn on_array_end(&mut self) -> Result<()> {
        self.depth -= 1;
        Ok(())
    }
    fn on_null(&mut self, _pos: u64) -> Result<()> {
        self.scalar(Scalar::Other);
        Ok(())
    }
    fn on_bool(&mut self, _pos: u64, _v: bool) -> Result<()> {
        self.scalar(Scalar::Other);
        Ok(())
    }
    fn on_int(&mut self, _pos: u64, v: i64) -> Result<()> {
        let s = if v >= 0 { Scalar::Uint(v as u64) } else { Scalar::Other };
        self.scalar(s);
        Ok(())
    }
    fn on_uint(&mut self, _pos: u64, v: u64) -> Result<()> {
        self.scalar(Scalar::Uint(v));
        Ok(())
    }
    fn on_double(&mut self, _pos: u64, _v: f64) -> Result<()> {
        self.scalar(Scalar::Other);
        Ok(())
    }
    fn on_time(&mut self, _pos: u64, _nanos: i64) -> Result<()> {
        self.scalar(Scalar::Other);
        Ok(())
    }
    fn on_dict_ref(&mut self, pos: u64, idx: u64) -> Result<()> {
        let dict = self.dict;
        let s = dict.get(idx).ok_or_else(|| {
            AuError::parse(pos, format!("dictionary reference {idx} out of range"))
        })?;
        self.string(s);
        Ok(())
    }
    fn on_string_start(&mut self, _pos: u64, len: u64) -> Result<()> {
        self.str_buf.clear();
        self.str_buf.reserve(len as usize);
        Ok(())
    }
    fn on_string_fragment(&mut self, frag: &[u8]) -> Result<()> {
        self.str_buf.extend_from_slice(frag);
        Ok(())
    }
    fn on_string_end(&mut self) -> Result<()> {
        let s = std::mem::take(&mut self.str_buf);
        self.string(&s);
        self.str_buf = s;
        Ok(())
    }
}
