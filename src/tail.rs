//! Mid-stream synchronization.
//!
//! Given a source positioned at an arbitrary offset, [`TailHandler::sync`]
//! finds the next valid value-record boundary and rebuilds the dictionary
//! that record depends on, by walking the `A`-record back-reference chain
//! to its `C`. Candidates that fail anywhere — bad framing, a broken
//! chain, a value that doesn't parse within its declared length — are
//! abandoned and the search resumes one byte later.

use crate::dictionary::{Dict, Dictionary};
use crate::displaylevel;
use crate::error::{AuError, Result};
use crate::format::{marker, SYNC_NEEDLE};
use crate::parser::{
    expect, term, DictRecordHandler, RecordParser, ValueHandler, ValueParser, ValueSink,
};
use crate::source::ByteSource;
use crate::vint::read_varint;

// ---------------------------------------------------------------------------
// DictionaryBuilder
// ---------------------------------------------------------------------------

/// Rebuilds one dictionary generation by walking backward from the newest
/// `A`/`C` record a value referenced.
///
/// On entry the source sits at the start of a dictionary record that is
/// not yet known. Each `A` visited contributes its entries (prepended —
/// the walk runs backward) and names its predecessor; the walk ends when
/// it reaches a `C` or runs into an already-known generation.
pub struct DictionaryBuilder<'a> {
    source: &'a mut dyn ByteSource,
    dictionary: &'a mut Dictionary,
    /// A valid dictionary must end before this position.
    end_of_dict: u64,
    /// Position the rebuilt entries are stamped with: the newest `A`/`C`
    /// of the chain, i.e. where the walk started.
    last_dict_pos: u64,
    pending: Vec<Vec<u8>>,
}

impl<'a> DictionaryBuilder<'a> {
    pub fn new(
        source: &'a mut dyn ByteSource,
        dictionary: &'a mut Dictionary,
        end_of_dict: u64,
    ) -> Self {
        let last_dict_pos = source.pos();
        DictionaryBuilder {
            source,
            dictionary,
            end_of_dict,
            last_dict_pos,
            pending: Vec::new(),
        }
    }

    /// Build a complete generation or fail structurally.
    pub fn build(mut self) -> Result<()> {
        loop {
            // Invariant: the source sits at the start of a dictionary
            // record that is not part of any known generation. The `A`
            // branch bails out as soon as the chain reaches one.
            let sor = self.source.pos();
            let c = self
                .source
                .next()?
                .ok_or_else(|| AuError::parse(sor, "eof while building dictionary"))?;
            match c {
                marker::DICT_ADD => {
                    let backref = read_varint(self.source)?;
                    if backref > sor {
                        return Err(AuError::parse(
                            sor,
                            "dictionary chain points before start of file",
                        ));
                    }
                    self.read_entries(sor)?;

                    let prev = sor - backref;
                    if let Some(idx) = self.dictionary.search(prev) {
                        let dict = self.dictionary.get(idx);
                        if prev != dict.last_dict_pos() {
                            return Err(AuError::parse(
                                sor,
                                format!(
                                    "chain should land exactly on the end of a known \
                                     dictionary: {prev} vs {}",
                                    dict.last_dict_pos()
                                ),
                            ));
                        }
                        self.populate(idx);
                        return Ok(());
                    }
                    self.source.seek(prev)?;
                }
                marker::DICT_CLEAR => {
                    term(self.source)?;
                    // By the invariant this position is no known
                    // generation, so clear() starts a fresh one.
                    let idx = self.dictionary.clear(sor)?;
                    self.populate(idx);
                    return Ok(());
                }
                other => {
                    return Err(AuError::parse(
                        sor,
                        format!(
                            "dictionary chain hit 0x{other:02x}, expected 'A' or 'C'"
                        ),
                    ));
                }
            }
        }
    }

    /// Read this `A` record's strings, prepending them to the pending
    /// list (the walk visits newest records first).
    fn read_entries(&mut self, sor: u64) -> Result<()> {
        let mut batch: Vec<Vec<u8>> = Vec::new();
        loop {
            match self.source.peek()? {
                Some(marker::RECORD_END) => break,
                Some(marker::STRING) => {
                    self.source.next()?;
                    let len = read_varint(self.source)?;
                    if self.source.pos() + len >= self.end_of_dict {
                        return Err(AuError::parse(
                            self.source.pos(),
                            "dictionary entry overruns the record being synced",
                        ));
                    }
                    let mut s = Vec::with_capacity(len as usize);
                    self.source.read_to_vec(len, &mut s)?;
                    batch.push(s);
                }
                Some(other) => {
                    return Err(AuError::parse(
                        self.source.pos(),
                        format!("expected a string in dictionary record, got 0x{other:02x}"),
                    ));
                }
                None => return Err(AuError::parse(sor, "eof inside dictionary record")),
            }
        }
        term(self.source)?;
        batch.append(&mut self.pending);
        self.pending = batch;
        Ok(())
    }

    fn populate(&mut self, idx: usize) {
        let dict = self.dictionary.get_mut(idx);
        for word in self.pending.drain(..) {
            dict.add(self.last_dict_pos, &word);
        }
    }
}

// ---------------------------------------------------------------------------
// ValidatingHandler
// ---------------------------------------------------------------------------

/// Checks a candidate value record as it is parsed: no event may extend
/// past the declared end of the value, and dictionary references must
/// resolve. Catching an endless run of plausible-looking bytes early beats
/// parsing megabytes before the length check fires.
struct ValidatingHandler<'a> {
    dict: &'a Dict,
    end_of_value: u64,
}

impl ValidatingHandler<'_> {
    fn bounds(&self, pos: u64) -> Result<()> {
        if pos > self.end_of_value {
            return Err(AuError::parse(pos, "value overruns its declared length"));
        }
        Ok(())
    }
}

impl ValueHandler for ValidatingHandler<'_> {
    fn on_null(&mut self, pos: u64) -> Result<()> {
        self.bounds(pos)
    }
    fn on_bool(&mut self, pos: u64, _: bool) -> Result<()> {
        self.bounds(pos)
    }
    fn on_int(&mut self, pos: u64, _: i64) -> Result<()> {
        self.bounds(pos)
    }
    fn on_uint(&mut self, pos: u64, _: u64) -> Result<()> {
        self.bounds(pos)
    }
    fn on_double(&mut self, pos: u64, _: f64) -> Result<()> {
        self.bounds(pos)
    }
    fn on_time(&mut self, pos: u64, _: i64) -> Result<()> {
        self.bounds(pos)
    }
    fn on_dict_ref(&mut self, pos: u64, idx: u64) -> Result<()> {
        if self.dict.get(idx).is_none() {
            return Err(AuError::parse(
                pos,
                format!("invalid dictionary index {idx}"),
            ));
        }
        self.bounds(pos)
    }
    fn on_string_start(&mut self, pos: u64, len: u64) -> Result<()> {
        if pos + len > self.end_of_value {
            return Err(AuError::parse(pos, "string overruns the value record"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TailHandler
// ---------------------------------------------------------------------------

pub struct TailHandler<'a> {
    dictionary: &'a mut Dictionary,
    source: &'a mut dyn ByteSource,
}

impl<'a> TailHandler<'a> {
    pub fn new(dictionary: &'a mut Dictionary, source: &'a mut dyn ByteSource) -> Self {
        TailHandler { dictionary, source }
    }

    /// Sync, then decode the remainder of the stream into `sink`.
    pub fn parse_stream<V: ValueSink>(&mut self, sink: &mut V) -> Result<()> {
        if !self.sync()? {
            displaylevel!(
                1,
                "Unable to find the start of a valid value record. Consider \
                 starting earlier in the file.\n"
            );
            return Ok(());
        }
        let mut handler = DictRecordHandler::new(self.dictionary, sink);
        RecordParser::new(self.source, &mut handler).parse_stream()
    }

    /// Find the next valid value-record boundary at or after the current
    /// position and leave the source positioned on it, with its
    /// dictionary fully rebuilt. Returns false when EOF is reached with
    /// no valid candidate.
    pub fn sync(&mut self) -> Result<bool> {
        loop {
            if !self.source.scan_to(SYNC_NEEDLE)? {
                return Ok(false);
            }
            let needle_pos = self.source.pos();
            match self.try_candidate() {
                Ok(()) => return Ok(true),
                Err(e) if e.is_parse() => {
                    displaylevel!(
                        3,
                        "ignoring candidate at {needle_pos} while syncing: {e}\n"
                    );
                    // Step past this needle; the next scan finds a
                    // strictly later candidate. A failed step means the
                    // needle sat at the very end of the stream.
                    if self.source.seek(needle_pos + 1).is_err() {
                        return Ok(false);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn try_candidate(&mut self) -> Result<()> {
        term(self.source)?;
        let sor = self.source.pos();
        expect(self.source, marker::VALUE)?;
        let backref = read_varint(self.source)?;
        if backref > sor {
            return Err(AuError::parse(
                sor,
                "dictionary back-reference points before the start of the file",
            ));
        }

        if self.dictionary.search(sor - backref).is_none() {
            self.source.seek(sor - backref)?;
            DictionaryBuilder::new(self.source, self.dictionary, sor).build()?;
            // Chain walked; return to the candidate and re-read it.
            self.source.seek(sor)?;
            expect(self.source, marker::VALUE)?;
            let second = read_varint(self.source)?;
            if second != backref {
                return Err(AuError::parse(sor, "re-read a different back-reference"));
            }
        }

        let value_len = read_varint(self.source)?;
        let start_of_value = self.source.pos();

        let idx = self.dictionary.find(sor, backref)?;
        let mut validator = ValidatingHandler {
            dict: self.dictionary.get(idx),
            end_of_value: start_of_value + value_len,
        };
        ValueParser::new(self.source, &mut validator).value()?;
        term(self.source)?;
        let consumed = self.source.pos() - 2 - start_of_value;
        if consumed != value_len {
            return Err(AuError::parse(
                sor,
                format!("length mismatch: expected {value_len}, got {consumed}"),
            ));
        }

        // A good value record. Rewind to its start for the caller.
        self.source.seek(sor)?;
        Ok(())
    }
}
