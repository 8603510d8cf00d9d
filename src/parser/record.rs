//! Record-framing parser and the dictionary-maintaining record handler.

use crate::dictionary::{Dict, Dictionary};
use crate::error::{AuError, Result};
use crate::format::{marker, FORMAT_VERSION};
use crate::parser::{describe, expect, term};
use crate::source::ByteSource;
use crate::vint::read_varint;

/// Receiver for record events.
pub trait RecordHandler {
    fn on_record_start(&mut self, _pos: u64) -> Result<()> {
        Ok(())
    }
    fn on_header(&mut self, _version: u64, _metadata: &[u8]) -> Result<()> {
        Ok(())
    }
    fn on_dict_clear(&mut self) -> Result<()> {
        Ok(())
    }
    fn on_dict_add_start(&mut self, _backref: u64) -> Result<()> {
        Ok(())
    }
    fn on_dict_entry(&mut self, _entry: &[u8]) -> Result<()> {
        Ok(())
    }
    /// Handle a `V` record's payload. The implementation must consume
    /// exactly `len` bytes from `source`; the default skips the value.
    fn on_value(
        &mut self,
        _backref: u64,
        len: u64,
        source: &mut dyn ByteSource,
    ) -> Result<()> {
        source.skip(len)
    }
}

pub struct RecordParser<'a, H: RecordHandler> {
    source: &'a mut dyn ByteSource,
    handler: &'a mut H,
    entry_buf: Vec<u8>,
}

impl<'a, H: RecordHandler> RecordParser<'a, H> {
    pub fn new(source: &'a mut dyn ByteSource, handler: &'a mut H) -> Self {
        RecordParser {
            source,
            handler,
            entry_buf: Vec::new(),
        }
    }

    /// Parse records until EOF.
    pub fn parse_stream(&mut self) -> Result<()> {
        while self.source.peek()?.is_some() {
            self.record()?;
        }
        Ok(())
    }

    /// Parse records until one `V` record has been handled. Returns false
    /// if EOF arrives first.
    pub fn parse_until_value(&mut self) -> Result<bool> {
        while self.source.peek()?.is_some() {
            if self.record()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Parse a single record; true if it was a `V` record.
    pub fn record(&mut self) -> Result<bool> {
        let sor = self.source.pos();
        let c = self
            .source
            .next()?
            .ok_or_else(|| AuError::parse(sor, "eof at start of record"))?;
        self.handler.on_record_start(sor)?;
        match c {
            marker::HEADER => {
                expect(self.source, marker::VARINT)?;
                let version = read_varint(self.source)?;
                if version != FORMAT_VERSION {
                    return Err(AuError::parse(
                        sor,
                        format!(
                            "bad format version: expected {FORMAT_VERSION}, got {version}"
                        ),
                    ));
                }
                self.entry_buf.clear();
                if self.source.peek()? == Some(marker::STRING) {
                    self.source.next()?;
                    let len = read_varint(self.source)?;
                    let buf = &mut self.entry_buf;
                    self.source.read_with(len, &mut |frag| {
                        buf.extend_from_slice(frag);
                    })?;
                }
                term(self.source)?;
                self.handler.on_header(version, &self.entry_buf)?;
                Ok(false)
            }
            marker::DICT_CLEAR => {
                term(self.source)?;
                self.handler.on_dict_clear()?;
                Ok(false)
            }
            marker::DICT_ADD => {
                let backref = read_varint(self.source)?;
                self.handler.on_dict_add_start(backref)?;
                loop {
                    match self.source.peek()? {
                        Some(marker::RECORD_END) => break,
                        Some(marker::STRING) => {
                            self.source.next()?;
                            let len = read_varint(self.source)?;
                            self.entry_buf.clear();
                            let buf = &mut self.entry_buf;
                            self.source.read_with(len, &mut |frag| {
                                buf.extend_from_slice(frag);
                            })?;
                            self.handler.on_dict_entry(&self.entry_buf)?;
                        }
                        Some(other) => {
                            return Err(AuError::parse(
                                self.source.pos(),
                                format!(
                                    "expected a string in dictionary record, got {}",
                                    describe(other)
                                ),
                            ));
                        }
                        None => {
                            return Err(AuError::parse(
                                self.source.pos(),
                                "eof inside dictionary record",
                            ));
                        }
                    }
                }
                term(self.source)?;
                Ok(false)
            }
            marker::VALUE => {
                let backref = read_varint(self.source)?;
                let len = read_varint(self.source)?;
                let start = self.source.pos();
                self.handler.on_value(backref, len, self.source)?;
                let consumed = self.source.pos() - start;
                if consumed != len {
                    return Err(AuError::parse(
                        self.source.pos(),
                        format!(
                            "value length mismatch: declared {len}, consumed {consumed}"
                        ),
                    ));
                }
                term(self.source)?;
                Ok(true)
            }
            other => Err(AuError::parse(
                sor,
                format!("unexpected byte at start of record: {}", describe(other)),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Dictionary-maintaining bridge
// ---------------------------------------------------------------------------

/// Consumer of one value record's payload, with the resolved dictionary.
pub trait ValueSink {
    fn on_value(&mut self, source: &mut dyn ByteSource, dict: &Dict) -> Result<()>;
}

/// Standard record handler: applies `C`/`A` records to a [`Dictionary`]
/// and hands `V` payloads to a [`ValueSink`] along with the generation
/// their back-reference resolves to.
pub struct DictRecordHandler<'a, V: ValueSink> {
    dictionary: &'a mut Dictionary,
    sink: &'a mut V,
    sor: u64,
    adding: Option<usize>,
}

impl<'a, V: ValueSink> DictRecordHandler<'a, V> {
    pub fn new(dictionary: &'a mut Dictionary, sink: &'a mut V) -> Self {
        DictRecordHandler {
            dictionary,
            sink,
            sor: 0,
            adding: None,
        }
    }
}

impl<V: ValueSink> RecordHandler for DictRecordHandler<'_, V> {
    fn on_record_start(&mut self, pos: u64) -> Result<()> {
        self.sor = pos;
        self.adding = None;
        Ok(())
    }

    fn on_dict_clear(&mut self) -> Result<()> {
        self.dictionary.clear(self.sor)?;
        Ok(())
    }

    fn on_dict_add_start(&mut self, backref: u64) -> Result<()> {
        let idx = self.dictionary.find(self.sor, backref)?;
        // A generation that already spans this record was rebuilt or
        // replayed; applying the entries again would duplicate them.
        if !self.dictionary.get(idx).includes(self.sor) {
            self.adding = Some(idx);
        }
        Ok(())
    }

    fn on_dict_entry(&mut self, entry: &[u8]) -> Result<()> {
        if let Some(idx) = self.adding {
            self.dictionary.get_mut(idx).add(self.sor, entry);
        }
        Ok(())
    }

    fn on_value(
        &mut self,
        backref: u64,
        _len: u64,
        source: &mut dyn ByteSource,
    ) -> Result<()> {
        let idx = self.dictionary.find(self.sor, backref)?;
        self.sink.on_value(source, self.dictionary.get(idx))
    }
}
