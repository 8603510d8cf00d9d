//! Bisect over an ordered key: a day of 1 Hz timestamped records,
//! searched for a mid-day instant.

use au::dictionary::Dictionary;
use au::encoder::{AuEncoder, EncoderConfig};
use au::grep::{bisect, scan, KeyMatcher, Pattern, SCAN_THRESHOLD};
use au::json::JsonOutputHandler;
use au::source::BufferByteSource;
use au::timestamp::{parse_nanos, parse_pattern};

/// One record per second for `hours` hours starting at midnight UTC.
fn day_stream(hours: u64) -> Vec<u8> {
    let base = parse_nanos("2024-01-01T00:00:00.000000000").unwrap();
    let mut enc = AuEncoder::new(Vec::new(), EncoderConfig::default()).unwrap();
    for s in 0..hours * 3600 {
        enc.encode(|w| {
            w.map(|w| {
                w.key(b"ts");
                w.time(base + (s as i64) * 1_000_000_000);
                w.key(b"series");
                w.string(b"heartbeat-monitor");
                w.key(b"sequenceNumber");
                w.uint(s);
            });
        })
        .unwrap();
    }
    enc.into_inner()
}

fn ts_pattern(text: &str) -> Pattern {
    Pattern {
        key: Some(KeyMatcher::Literal(b"ts".to_vec())),
        timestamp: Some(parse_pattern(text).unwrap()),
        bisect: true,
        ..Pattern::default()
    }
}

#[test]
fn bisect_lands_on_first_record_at_or_after_noon() {
    let bytes = day_stream(24);
    assert!(bytes.len() as u64 > 4 * SCAN_THRESHOLD);

    let mut p = ts_pattern("2024-01-01T12:00:00");
    p.num_matches = Some(1);

    let mut src = BufferByteSource::new(&bytes);
    let mut out = JsonOutputHandler::new(Vec::new());
    let total = bisect(&p, &mut src, &mut out).unwrap();
    assert_eq!(total, 1);

    let text = String::from_utf8(out.into_inner()).unwrap();
    assert!(
        text.starts_with("{\"ts\":\"2024-01-01T12:00:00.000000000\""),
        "got: {text}"
    );
}

#[test]
fn bisect_with_or_greater_streams_forward() {
    let bytes = day_stream(24);
    let mut p = ts_pattern("2024-01-01T18:30");
    p.match_or_greater = true;
    p.num_matches = Some(5);

    let mut src = BufferByteSource::new(&bytes);
    let mut out = JsonOutputHandler::new(Vec::new());
    let total = bisect(&p, &mut src, &mut out).unwrap();
    assert_eq!(total, 5);

    let text = String::from_utf8(out.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 5);
    for (i, line) in lines.iter().enumerate() {
        let expect = format!("{{\"ts\":\"2024-01-01T18:30:{:02}.000000000\"", i);
        assert!(line.starts_with(&expect), "line {i}: {line}");
    }
}

#[test]
fn bisect_interval_finds_every_record_in_range() {
    let bytes = day_stream(24);
    // A full minute: exactly 60 records at 1 Hz.
    let mut p = ts_pattern("2024-01-01T06:30");
    p.count = true;

    let mut src = BufferByteSource::new(&bytes);
    let mut out = JsonOutputHandler::new(Vec::new());
    let total = bisect(&p, &mut src, &mut out).unwrap();
    assert_eq!(total, 60);
}

#[test]
fn bisect_before_first_record_scans_from_start() {
    let bytes = day_stream(2);
    let mut p = ts_pattern("2023-12-31T23:59");
    p.match_or_greater = true;
    p.num_matches = Some(1);

    let mut src = BufferByteSource::new(&bytes);
    let mut out = JsonOutputHandler::new(Vec::new());
    let total = bisect(&p, &mut src, &mut out).unwrap();
    assert_eq!(total, 1);
    let text = String::from_utf8(out.into_inner()).unwrap();
    assert!(text.starts_with("{\"ts\":\"2024-01-01T00:00:00"));
}

#[test]
fn bisect_past_last_record_matches_nothing() {
    let bytes = day_stream(2);
    let p = ts_pattern("2024-06-01");

    let mut src = BufferByteSource::new(&bytes);
    let mut out = JsonOutputHandler::new(Vec::new());
    let total = bisect(&p, &mut src, &mut out).unwrap();
    assert_eq!(total, 0);
    assert!(out.into_inner().is_empty());
}

#[test]
fn linear_scan_agrees_with_bisect() {
    let bytes = day_stream(3);
    let p = ts_pattern("2024-01-01T01:15");

    let mut src = BufferByteSource::new(&bytes);
    let mut out = JsonOutputHandler::new(Vec::new());
    let from_bisect = bisect(&p, &mut src, &mut out).unwrap();
    let bisect_text = String::from_utf8(out.into_inner()).unwrap();

    let mut src = BufferByteSource::new(&bytes);
    let mut dictionary = Dictionary::new(1);
    let mut out = JsonOutputHandler::new(Vec::new());
    let mut linear_pattern = p.clone();
    linear_pattern.bisect = false;
    let from_scan = scan(&linear_pattern, &mut dictionary, &mut src, &mut out).unwrap();
    let scan_text = String::from_utf8(out.into_inner()).unwrap();

    assert_eq!(from_bisect, from_scan);
    assert_eq!(bisect_text, scan_text);
}
