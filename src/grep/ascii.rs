//! Plaintext analog of the bisect: timestamp search over ordinary
//! line-oriented log files.
//!
//! Input lines are expected to begin with a textual timestamp (any legal
//! truncation). The file is binary-searched for the first line whose
//! timestamp is at or past the pattern's start, then linearly scanned.
//! Lines that do not parse as timestamps (stack traces, wrapped output)
//! inherit the match state of the preceding timestamped line.

use std::io::Write;

use crate::error::Result;
use crate::grep::pattern::Pattern;
use crate::grep::scan::{PREFIX_AMOUNT, SCAN_THRESHOLD, SUFFIX_AMOUNT};
use crate::source::ByteSource;
use crate::timestamp::parse_pattern;

/// Timestamp of a log line: the longest leading run that parses as a
/// timestamp pattern, taken at its interval start.
fn line_timestamp(line: &[u8]) -> Option<i64> {
    let head = line
        .iter()
        .position(|&b| b == b' ' || b == b'\t')
        .map_or(line, |i| &line[..i]);
    let text = std::str::from_utf8(head).ok()?;
    parse_pattern(text).map(|(start, _)| start)
}

/// Read one line (without the terminator) into `buf`; false at EOF.
fn read_line(source: &mut dyn ByteSource, buf: &mut Vec<u8>) -> Result<bool> {
    buf.clear();
    loop {
        match source.next()? {
            Some(b'\n') => return Ok(true),
            Some(b) => buf.push(b),
            None => return Ok(!buf.is_empty()),
        }
    }
}

/// Position the cursor at the start of the first full line at or after
/// `pos`.
fn sync_line(source: &mut dyn ByteSource, pos: u64) -> Result<()> {
    source.seek(pos)?;
    if pos == 0 {
        return Ok(());
    }
    if source.scan_to(b"\n")? {
        source.next()?;
    }
    Ok(())
}

/// Binary-search a plain log for the pattern's timestamp interval and
/// print the matching region. Returns the number of matching lines.
pub fn ascii_grep(
    pattern: &Pattern,
    source: &mut dyn ByteSource,
    out: &mut dyn Write,
) -> Result<u64> {
    let (ts_start, ts_end) = match pattern.timestamp {
        Some(range) => range,
        None => return Ok(0),
    };

    let mut line = Vec::new();
    let mut start = 0u64;
    let mut end = source.end_pos()?;

    while end > start && end - start > SCAN_THRESHOLD {
        let mid = start + (end - start) / 2;
        sync_line(source, mid)?;
        let sor = source.pos();
        if sor >= end || !read_line(source, &mut line)? {
            end = if sor >= end { start + 1 } else { sor };
            continue;
        }
        match line_timestamp(&line) {
            Some(ts) if ts >= ts_start => end = sor,
            // Unparseable lines sort with their predecessor.
            _ => start = sor,
        }
    }

    // Linear scan of the narrowed region.
    sync_line(source, start.saturating_sub(PREFIX_AMOUNT))?;

    let num_matches = pattern.num_matches.unwrap_or(u64::MAX);
    let before = if pattern.count { 0 } else { pattern.before_context as usize };
    let after = if pattern.count { 0 } else { pattern.after_context };
    let mut before_ring: Vec<Vec<u8>> = Vec::new();
    let mut force = 0u32;
    let mut total = 0u64;
    let mut last_ts_matched = false;
    let mut match_pos = source.pos();

    loop {
        if force == 0 {
            if total >= num_matches {
                break;
            }
            if source.pos() - match_pos > SUFFIX_AMOUNT {
                break;
            }
        }
        if !read_line(source, &mut line)? {
            break;
        }

        let matched = match line_timestamp(&line) {
            Some(ts) => {
                let m = ts >= ts_start && ts < ts_end;
                last_ts_matched = m;
                m
            }
            None => last_ts_matched,
        };

        if matched && total < num_matches {
            match_pos = source.pos();
            total += 1;
            if pattern.count {
                continue;
            }
            for held in before_ring.drain(..) {
                out.write_all(&held)?;
                out.write_all(b"\n")?;
            }
            out.write_all(&line)?;
            out.write_all(b"\n")?;
            force = after;
        } else if force > 0 {
            out.write_all(&line)?;
            out.write_all(b"\n")?;
            force -= 1;
        } else if before > 0 {
            if before_ring.len() == before {
                before_ring.remove(0);
            }
            before_ring.push(line.clone());
        }
    }

    Ok(total)
}
