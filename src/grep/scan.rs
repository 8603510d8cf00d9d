//! Scan and bisect drivers.
//!
//! [`scan`] is the linear pass: parse records, test each against the
//! pattern, and emit matches (with any before/after context) through the
//! output sink. [`bisect`] narrows a sorted stream to the region that can
//! hold the first match, then hands off to a bounded linear scan.

use crate::dictionary::Dictionary;
use crate::displaylevel;
use crate::error::{AuError, Result};
use crate::format::KB;
use crate::grep::handler::GrepHandler;
use crate::grep::pattern::Pattern;
use crate::parser::{DictRecordHandler, RecordParser, ValueSink};
use crate::source::ByteSource;
use crate::tail::TailHandler;

/// Once the bisect window shrinks to this, switch to a linear scan.
pub const SCAN_THRESHOLD: u64 = 256 * KB as u64;
/// How far before the window the linear scan starts, to catch records
/// straddling the boundary.
pub const PREFIX_AMOUNT: u64 = 512 * KB as u64;
/// How far past the last match the linear scan keeps looking. Must cover
/// the scan window plus the prefix, so the entire candidate region is
/// searched before giving up.
pub const SUFFIX_AMOUNT: u64 = SCAN_THRESHOLD + PREFIX_AMOUNT + 266 * KB as u64;

/// Linear scan from the current position. Returns the match count.
pub fn scan<O: ValueSink>(
    pattern: &Pattern,
    dictionary: &mut Dictionary,
    source: &mut dyn ByteSource,
    out: &mut O,
) -> Result<u64> {
    let before = if pattern.count { 0 } else { pattern.before_context };
    let after = if pattern.count { 0 } else { pattern.after_context };

    let mut grep = GrepHandler::new(pattern);
    let mut pos_buffer: Vec<u64> = Vec::with_capacity(before as usize + 1);
    let mut force = 0u32;
    let mut following = false;
    let mut total = 0u64;
    let mut match_pos = source.pos();
    let num_matches = pattern.num_matches.unwrap_or(u64::MAX);
    let suffix = pattern.scan_suffix.unwrap_or(u64::MAX);

    while source.peek()?.is_some() {
        if force == 0 && !following {
            if total >= num_matches {
                break;
            }
            if source.pos() - match_pos > suffix {
                break;
            }
        }

        if pos_buffer.len() == before as usize + 1 {
            pos_buffer.remove(0);
        }
        let sor = source.pos();
        pos_buffer.push(sor);
        // Keep every buffered record start addressable: emitting context
        // requires seeking back to the oldest one, even on a pipe.
        source.set_pin(pos_buffer[0]);

        let more = {
            let mut handler = DictRecordHandler::new(dictionary, &mut grep);
            RecordParser::new(source, &mut handler).parse_until_value()
        };
        match more {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) if e.is_parse() => {
                displaylevel!(1, "{e} in {}\n", source.name());
                if !recover(source, dictionary, sor)? {
                    break;
                }
                pos_buffer.clear();
                continue;
            }
            Err(e) => return Err(e),
        }

        if grep.matched() && total < num_matches {
            match_pos = *pos_buffer.last().expect("just pushed");
            total += 1;
            following = pattern.follow_context;
            if pattern.count {
                continue;
            }
            source.seek(pos_buffer[0])?;
            while !pos_buffer.is_empty() {
                let mut handler = DictRecordHandler::new(dictionary, out);
                RecordParser::new(source, &mut handler).parse_until_value()?;
                pos_buffer.pop();
            }
            force = after;
        } else if following {
            if grep.explicit_mismatch() {
                following = false;
            } else {
                replay_last(dictionary, source, out, &pos_buffer)?;
            }
        } else if force > 0 {
            replay_last(dictionary, source, out, &pos_buffer)?;
            force -= 1;
        }
    }

    source.clear_pin();
    Ok(total)
}

/// Re-parse the record just tested, sending it to the output sink.
fn replay_last<O: ValueSink>(
    dictionary: &mut Dictionary,
    source: &mut dyn ByteSource,
    out: &mut O,
    pos_buffer: &[u64],
) -> Result<()> {
    let sor = *pos_buffer.last().expect("caller pushed a record start");
    source.seek(sor)?;
    let mut handler = DictRecordHandler::new(dictionary, out);
    RecordParser::new(source, &mut handler).parse_until_value()?;
    Ok(())
}

/// After a structural error, resynchronize on the next valid value
/// record. The full sync (not a bare needle hop) matters: a skipped
/// dictionary-add record would otherwise break every later reference,
/// and sync rebuilds the chain. Returns false at EOF.
fn recover(
    source: &mut dyn ByteSource,
    dictionary: &mut Dictionary,
    failed_sor: u64,
) -> Result<bool> {
    if source.pos() <= failed_sor && source.seek(failed_sor + 1).is_err() {
        return Ok(false);
    }
    let mut tail = TailHandler::new(dictionary, source);
    match tail.sync() {
        Ok(found) => Ok(found),
        // Rebuilding a chain can require seeks a pipe cannot serve; give
        // up on the rest of the scan rather than fail the whole run.
        Err(AuError::Io(e)) if e.kind() == std::io::ErrorKind::Unsupported => Ok(false),
        Err(e) => Err(e),
    }
}

/// Seek to `pos` and synchronize on the next record boundary.
pub fn seek_sync(
    source: &mut dyn ByteSource,
    dictionary: &mut Dictionary,
    pos: u64,
) -> Result<()> {
    source.seek(pos)?;
    let mut tail = TailHandler::new(dictionary, source);
    if !tail.sync()? {
        return Err(AuError::parse(pos, "failed to find a record at position"));
    }
    Ok(())
}

/// Binary search over a stream whose selected key is (roughly)
/// non-decreasing. Emits the matching region through `out` and returns
/// the match count.
pub fn bisect<O: ValueSink>(
    pattern: &Pattern,
    source: &mut dyn ByteSource,
    out: &mut O,
) -> Result<u64> {
    let probe_pattern = pattern.for_bisect();
    let mut dictionary = Dictionary::new(32);
    let mut grep = GrepHandler::new(&probe_pattern);

    let mut start = 0u64;
    let mut end = source.end_pos()?;
    while end > start {
        if end - start <= SCAN_THRESHOLD {
            seek_sync(source, &mut dictionary, start.saturating_sub(PREFIX_AMOUNT))?;
            let mut scan_pattern = pattern.clone();
            scan_pattern.scan_suffix = Some(SUFFIX_AMOUNT);
            return scan(&scan_pattern, &mut dictionary, source, out);
        }

        let mid = start + (end - start) / 2;
        seek_sync(source, &mut dictionary, mid)?;
        let sor = source.pos();
        let more = {
            let mut handler = DictRecordHandler::new(&mut dictionary, &mut grep);
            RecordParser::new(source, &mut handler).parse_until_value()?
        };
        if !more {
            break;
        }

        // The probe matches any record at or past the target, so a hit
        // moves the upper bound down and a miss moves the lower bound up.
        if grep.matched() {
            if sor >= end {
                // The synced record sits at or past the window: nothing
                // between start and it can be probed any finer. Degrade
                // to the linear scan.
                end = start + 1;
            } else {
                end = sor;
            }
        } else {
            start = sor;
        }
    }
    Ok(0)
}
