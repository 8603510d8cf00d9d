//! Gzip index: build a sidecar over a compressed stream, then verify
//! that indexed random access returns exactly the bytes a linear
//! decompression would.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;

use au::dictionary::Dictionary;
use au::encoder::{AuEncoder, EncoderConfig};
use au::json::JsonOutputHandler;
use au::parser::{DictRecordHandler, RecordParser};
use au::source::{BufferByteSource, ByteSource};
use au::tail::TailHandler;
use au::zindex::{build_index, ZipByteSource, Zindex};

/// Deterministic pseudo-random generator; no external entropy in tests.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0
    }
}

/// A few MiB of moderately compressible log-like bytes.
fn sample_payload(len: usize) -> Vec<u8> {
    let mut rng = Lcg(42);
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let n = rng.next();
        out.extend_from_slice(
            format!("line {:016x} from generator with filler text\n", n).as_bytes(),
        );
    }
    out.truncate(len);
    out
}

struct Fixture {
    _dir: tempfile::TempDir,
    gz_path: String,
    index_path: String,
    payload: Vec<u8>,
}

fn gzip_fixture(payload: Vec<u8>, index_every: u64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let gz_path = dir.path().join("data.gz").to_str().unwrap().to_owned();
    let index_path = format!("{gz_path}.auzx");

    let file = std::fs::File::create(&gz_path).unwrap();
    let mut gz = GzEncoder::new(file, Compression::default());
    gz.write_all(&payload).unwrap();
    gz.finish().unwrap().sync_all().unwrap();

    build_index(&gz_path, Some(&index_path), index_every).unwrap();
    Fixture {
        _dir: dir,
        gz_path,
        index_path,
        payload,
    }
}

#[test]
fn indexed_reads_match_linear_decompression() {
    let fx = gzip_fixture(sample_payload(3 * 1024 * 1024), 256 * 1024);

    let index = Zindex::load(&fx.index_path).unwrap();
    assert!(
        index.num_entries() > 3,
        "expected several access points, got {}",
        index.num_entries()
    );
    assert_eq!(index.uncompressed_size(), fx.payload.len() as u64);

    let mut src = ZipByteSource::open(&fx.gz_path, Some(&fx.index_path)).unwrap();
    assert_eq!(src.end_pos().unwrap(), fx.payload.len() as u64);

    let mut rng = Lcg(7);
    let mut buf = [0u8; 64];
    for _ in 0..1000 {
        let pos = (rng.next() % (fx.payload.len() as u64 - buf.len() as u64)) as usize;
        src.seek(pos as u64).unwrap();
        src.read_into(&mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &fx.payload[pos..pos + buf.len()],
            "mismatch at offset {pos}"
        );
    }
}

#[test]
fn sequential_read_through_index_is_exact() {
    let fx = gzip_fixture(sample_payload(512 * 1024), 64 * 1024);
    let mut src = ZipByteSource::open(&fx.gz_path, Some(&fx.index_path)).unwrap();
    let mut all = Vec::new();
    src.read_to_vec(fx.payload.len() as u64, &mut all).unwrap();
    assert_eq!(all, fx.payload);
    assert_eq!(src.next().unwrap(), None);
}

#[test]
fn size_change_invalidates_index() {
    let fx = gzip_fixture(sample_payload(128 * 1024), 32 * 1024);
    // Appending anything changes the compressed size; the index must
    // refuse to serve a file it no longer describes.
    let mut f = std::fs::OpenOptions::new()
        .append(true)
        .open(&fx.gz_path)
        .unwrap();
    f.write_all(b"x").unwrap();
    f.sync_all().unwrap();

    let err = ZipByteSource::open(&fx.gz_path, Some(&fx.index_path)).unwrap_err();
    assert!(err.to_string().contains("size"));
}

#[test]
fn renamed_file_invalidates_index() {
    let fx = gzip_fixture(sample_payload(128 * 1024), 32 * 1024);
    let renamed = format!("{}.other", fx.gz_path);
    std::fs::copy(&fx.gz_path, &renamed).unwrap();

    let err = ZipByteSource::open(&renamed, Some(&fx.index_path)).unwrap_err();
    assert!(err.to_string().contains("filename"));
}

#[test]
fn truncated_index_is_rejected() {
    let fx = gzip_fixture(sample_payload(256 * 1024), 32 * 1024);
    let bytes = std::fs::read(&fx.index_path).unwrap();
    // Drop the sentinel record (and then some).
    std::fs::write(&fx.index_path, &bytes[..bytes.len() - 40]).unwrap();
    assert!(Zindex::load(&fx.index_path).is_err());
}

#[test]
fn tail_through_zip_source_decodes_suffix() {
    // An actual encoded stream, gzipped and indexed; ztail semantics.
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    for i in 0..20_000u64 {
        enc.encode(|w| {
            w.map(|w| {
                w.key(b"sequence");
                w.uint(i);
                w.key(b"message");
                w.string_hint(
                    format!("record number {i} with some body text").as_bytes(),
                    Some(false),
                );
            });
        })
        .unwrap();
    }
    let au_bytes = enc.into_inner();

    // Reference: sequential decode of the raw stream.
    let full = {
        let mut src = BufferByteSource::new(&au_bytes);
        let mut dictionary = Dictionary::new(1);
        let mut sink = JsonOutputHandler::new(Vec::new());
        let mut handler = DictRecordHandler::new(&mut dictionary, &mut sink);
        RecordParser::new(&mut src, &mut handler).parse_stream().unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    };

    let fx = gzip_fixture(au_bytes, 128 * 1024);
    let mut src = ZipByteSource::open(&fx.gz_path, Some(&fx.index_path)).unwrap();
    src.tail(32 * 1024).unwrap();

    let mut dictionary = Dictionary::new(1);
    let mut sink = JsonOutputHandler::new(Vec::new());
    {
        let mut tail = TailHandler::new(&mut dictionary, &mut src);
        tail.parse_stream(&mut sink).unwrap();
    }
    let tailed = String::from_utf8(sink.into_inner()).unwrap();
    assert!(!tailed.is_empty());
    assert!(
        full.ends_with(&tailed),
        "ztail output must be a suffix of the sequential decode"
    );
}
