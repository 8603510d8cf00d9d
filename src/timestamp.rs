//! Textual timestamps.
//!
//! The wire carries timestamps as signed nanoseconds since the Unix epoch;
//! text renders them as `YYYY-MM-DDTHH:MM:SS.fffffffff`, always UTC, no
//! zone suffix. A pattern may truncate that form from the right — whole
//! fields, or digits within the final field — and denotes the half-open
//! nanosecond interval covering every timestamp it prefixes:
//!
//! - `2024-03-27T18:45:00.123456789` — exactly one nanosecond.
//! - `2024-03-27T18:4` — 18:40:00 up to (not including) 18:50:00.
//! - `2024-03` — the whole month.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

/// Full textual width: `yyyy-mm-ddThh:mm:ss.nnnnnnnnn`.
pub const TIMESTAMP_WIDTH: usize = 29;

/// Render epoch nanoseconds in the canonical textual form.
pub fn format_nanos(nanos: i64) -> String {
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    match Utc.timestamp_opt(secs, subsec).single() {
        Some(dt) => format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:09}",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.nanosecond()
        ),
        // Out of civil range; fall back to raw nanoseconds.
        None => format!("@{nanos}ns"),
    }
}

/// Whether a string's length is one a timestamp rendering could have:
/// the full form, or the full form minus trailing 3-digit groups, or
/// minus the whole fractional part.
pub fn plausible_timestamp_len(len: usize) -> bool {
    len == TIMESTAMP_WIDTH
        || len == TIMESTAMP_WIDTH - 3
        || len == TIMESTAMP_WIDTH - 6
        || len == TIMESTAMP_WIDTH - 10
}

/// Parse a complete (possibly fraction-truncated) timestamp into epoch
/// nanoseconds. Used when converting JSON text to the wire form; partial
/// date patterns are not accepted here.
pub fn parse_nanos(s: &str) -> Option<i64> {
    if !plausible_timestamp_len(s.len()) {
        return None;
    }
    let (start, end) = parse_pattern(s)?;
    // A full timestamp covers exactly the sub-second granularity it
    // spells out; anything coarser than one second is not a timestamp
    // literal.
    if end - start > 1_000_000_000 {
        return None;
    }
    Some(start)
}

/// Parse a timestamp pattern into the half-open `[start, end)` interval
/// of epoch nanoseconds it covers. Returns `None` for malformed text.
pub fn parse_pattern(s: &str) -> Option<(i64, i64)> {
    let mut p = PatternParser::new(s);
    let (y0, y1) = p.field(4, Some('-'), 0, 9999)?;
    let (mo0, mo1) = p.field(2, Some('-'), 1, 12)?;
    let (d0, d1) = p.field(2, Some('T'), 1, 31)?;
    let (h0, h1) = p.field(2, Some(':'), 0, 23)?;
    let (mi0, mi1) = p.field(2, Some(':'), 0, 59)?;
    let (s0, s1) = p.field(2, Some('.'), 0, 59)?;
    let (n0, n1) = p.field(9, None, 0, 999_999_999)?;
    if !p.done() {
        return None;
    }
    // At least a full year must be present.
    if !p.any_digits {
        return None;
    }
    let start = civil_to_nanos(y0, mo0.max(1), d0.max(1), h0, mi0, s0, n0)?;
    let end = civil_to_nanos_carry(y1, mo1.max(1), d1.max(1), h1, mi1, s1, n1)?;
    if start == end {
        Some((start, end + 1))
    } else {
        Some((start, end))
    }
}

struct PatternParser<'a> {
    rest: &'a str,
    exhausted: bool,
    any_digits: bool,
}

impl<'a> PatternParser<'a> {
    fn new(s: &'a str) -> Self {
        PatternParser {
            rest: s,
            exhausted: false,
            any_digits: false,
        }
    }

    /// Consume one field of up to `width` digits plus its delimiter.
    ///
    /// Returns the `(start, end)` pair for this field: for a complete
    /// field both bound the written value (end exclusive only once a
    /// later field widens it); for a partially-written field the missing
    /// digits scale the bounds (`"4"` in a 2-digit field means 40..50);
    /// for an absent field the bounds are the field's full range floor.
    fn field(
        &mut self,
        width: usize,
        delim: Option<char>,
        min: i64,
        max: i64,
    ) -> Option<(i64, i64)> {
        if self.exhausted || self.rest.is_empty() {
            self.exhausted = true;
            return Some((0, 0));
        }
        let mut value = 0i64;
        let mut digits = 0usize;
        while digits < width {
            match self.rest.as_bytes().first() {
                Some(b) if b.is_ascii_digit() => {
                    value = value * 10 + i64::from(b - b'0');
                    digits += 1;
                    self.rest = &self.rest[1..];
                }
                _ => break,
            }
        }
        if digits == 0 {
            return None;
        }
        self.any_digits = true;
        let scale = 10i64.pow((width - digits) as u32);
        let start = value * scale;
        let end = if digits == width {
            value * scale
        } else {
            (value + 1) * scale
        };
        if start < min || start > max {
            return None;
        }
        if end < min || end > max + 1 {
            return None;
        }
        if self.rest.is_empty() {
            self.exhausted = true;
            // The last field present widens the interval to cover one
            // unit of itself (a complete field) or the unwritten digits
            // (a partial one).
            return Some((start, if digits == width { end + 1 } else { end }));
        }
        match delim {
            Some(d) if self.rest.starts_with(d) => {
                self.rest = &self.rest[1..];
                if self.rest.is_empty() {
                    // Trailing delimiter with nothing after it.
                    return None;
                }
                Some((start, end))
            }
            _ => None,
        }
    }

    fn done(&self) -> bool {
        self.rest.is_empty()
    }
}

fn civil_to_nanos(
    y: i64,
    mo: i64,
    d: i64,
    h: i64,
    mi: i64,
    s: i64,
    n: i64,
) -> Option<i64> {
    let date = NaiveDate::from_ymd_opt(y as i32, mo as u32, d as u32)?;
    let dt = date.and_hms_opt(h as u32, mi as u32, s as u32)?;
    let secs = DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).timestamp();
    Some(secs.checked_mul(1_000_000_000)?.checked_add(n)?)
}

/// Like [`civil_to_nanos`] but tolerating single-unit overflow produced
/// by interval ends: month 13, day 32, hour 24, minute/second 60,
/// nanosecond 10^9.
fn civil_to_nanos_carry(
    mut y: i64,
    mut mo: i64,
    mut d: i64,
    mut h: i64,
    mut mi: i64,
    mut s: i64,
    mut n: i64,
) -> Option<i64> {
    if n >= 1_000_000_000 {
        n -= 1_000_000_000;
        s += 1;
    }
    if s >= 60 {
        s -= 60;
        mi += 1;
    }
    if mi >= 60 {
        mi -= 60;
        h += 1;
    }
    if h >= 24 {
        h -= 24;
        d += 1;
    }
    if mo > 12 {
        mo -= 12;
        y += 1;
    }
    loop {
        let dim = days_in_month(y, mo)?;
        if d <= dim {
            break;
        }
        d -= dim;
        mo += 1;
        if mo > 12 {
            mo = 1;
            y += 1;
        }
    }
    civil_to_nanos(y, mo, d, h, mi, s, n)
}

fn days_in_month(y: i64, mo: i64) -> Option<i64> {
    let first = NaiveDate::from_ymd_opt(y as i32, mo as u32, 1)?;
    let next = if mo == 12 {
        NaiveDate::from_ymd_opt(y as i32 + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(y as i32, mo as u32 + 1, 1)?
    };
    Some((next - first).num_days())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: i64 = 1;
    const SEC: i64 = 1_000_000_000;

    fn nanos_of(s: &str) -> i64 {
        parse_nanos(s).unwrap()
    }

    #[test]
    fn format_epoch() {
        assert_eq!(format_nanos(0), "1970-01-01T00:00:00.000000000");
    }

    #[test]
    fn format_round_trips_parse() {
        for nanos in [
            0i64,
            1,
            1_700_000_000_123_456_789,
            -1,
            -1_000_000_001,
        ] {
            let text = format_nanos(nanos);
            assert_eq!(nanos_of(&text), nanos, "text = {text}");
        }
    }

    #[test]
    fn negative_nanos_render_before_epoch() {
        assert_eq!(format_nanos(-1), "1969-12-31T23:59:59.999999999");
    }

    #[test]
    fn parse_accepts_legal_truncations() {
        assert_eq!(nanos_of("2024-01-01T00:00:00.000000000"), nanos_of("2024-01-01T00:00:00"));
        assert_eq!(
            nanos_of("2024-01-01T00:00:00.123"),
            nanos_of("2024-01-01T00:00:00") + 123_000_000
        );
        assert_eq!(
            nanos_of("2024-01-01T00:00:00.123456"),
            nanos_of("2024-01-01T00:00:00") + 123_456_000
        );
    }

    #[test]
    fn parse_rejects_other_lengths() {
        assert!(parse_nanos("2024-01-01T00:00").is_none());
        assert!(parse_nanos("2024-01-01").is_none());
        assert!(parse_nanos("not-a-time-at-all-just-text!!").is_none());
    }

    #[test]
    fn pattern_full_timestamp_covers_one_nanosecond() {
        let (start, end) = parse_pattern("2018-03-27T18:45:00.123456789").unwrap();
        assert_eq!(end - start, NS);
    }

    #[test]
    fn pattern_second_truncation_covers_one_second() {
        let (start, end) = parse_pattern("2018-03-27T18:45:00").unwrap();
        assert_eq!(end - start, SEC);
        assert_eq!(start, nanos_of("2018-03-27T18:45:00.000000000"));
    }

    #[test]
    fn pattern_partial_minute_digit_scales() {
        let (start, end) = parse_pattern("2018-03-27T18:4").unwrap();
        assert_eq!(start, nanos_of("2018-03-27T18:40:00.000000000"));
        assert_eq!(end, nanos_of("2018-03-27T18:50:00.000000000"));
    }

    #[test]
    fn pattern_month_covers_month() {
        let (start, end) = parse_pattern("2018-03").unwrap();
        assert_eq!(start, nanos_of("2018-03-01T00:00:00.000000000"));
        assert_eq!(end, nanos_of("2018-04-01T00:00:00.000000000"));
    }

    #[test]
    fn pattern_december_carries_into_next_year() {
        let (start, end) = parse_pattern("2018-12").unwrap();
        assert_eq!(start, nanos_of("2018-12-01T00:00:00.000000000"));
        assert_eq!(end, nanos_of("2019-01-01T00:00:00.000000000"));
    }

    #[test]
    fn pattern_year_covers_year() {
        let (start, end) = parse_pattern("2018").unwrap();
        assert_eq!(start, nanos_of("2018-01-01T00:00:00.000000000"));
        assert_eq!(end, nanos_of("2019-01-01T00:00:00.000000000"));
    }

    #[test]
    fn pattern_rejects_garbage() {
        assert!(parse_pattern("").is_none());
        assert!(parse_pattern("20x8").is_none());
        assert!(parse_pattern("2018-13").is_none());
        assert!(parse_pattern("2018-00").is_none());
        assert!(parse_pattern("2018-03-27X01").is_none());
        assert!(parse_pattern("2018-").is_none());
    }

    #[test]
    fn pattern_fraction_truncations() {
        let (start, end) = parse_pattern("2018-03-27T18:45:00.123").unwrap();
        assert_eq!(start, nanos_of("2018-03-27T18:45:00.123000000"));
        assert_eq!(end - start, 1_000_000);
    }
}
