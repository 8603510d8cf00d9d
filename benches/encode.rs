//! Encoder and decoder throughput benchmarks.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use au::dictionary::Dictionary;
use au::encoder::{AuEncoder, EncoderConfig};
use au::parser::{DictRecordHandler, RecordParser, ValueSink};
use au::source::{BufferByteSource, ByteSource};
use au::{Dict, Result, ValueHandler, ValueParser};

const RECORDS: u64 = 10_000;

fn encode_stream() -> Vec<u8> {
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    for i in 0..RECORDS {
        enc.encode(|w| {
            w.map(|w| {
                w.key(b"sequence");
                w.uint(i);
                w.key(b"service");
                w.string(if i % 2 == 0 {
                    &b"billing-gateway"[..]
                } else {
                    &b"session-broker"[..]
                });
                w.key(b"elapsedMicros");
                w.double(i as f64 * 1.5);
            });
        })
        .unwrap();
    }
    enc.into_inner()
}

fn bench_encode(c: &mut Criterion) {
    let size = encode_stream().len() as u64;
    let mut group = c.benchmark_group("encode");
    group.throughput(Throughput::Bytes(size));
    group.bench_function("typical_records", |b| {
        b.iter(|| black_box(encode_stream()));
    });
    group.finish();
}

struct Devour;
impl ValueHandler for Devour {}
struct DevourSink;
impl ValueSink for DevourSink {
    fn on_value(&mut self, source: &mut dyn ByteSource, _dict: &Dict) -> Result<()> {
        let mut h = Devour;
        ValueParser::new(source, &mut h).value()
    }
}

fn bench_decode(c: &mut Criterion) {
    let bytes = encode_stream();
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("typical_records", |b| {
        b.iter(|| {
            let mut src = BufferByteSource::new(&bytes);
            let mut dictionary = Dictionary::new(1);
            let mut sink = DevourSink;
            let mut handler = DictRecordHandler::new(&mut dictionary, &mut sink);
            RecordParser::new(&mut src, &mut handler).parse_stream().unwrap();
        });
    });
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
