//! Stream statistics.
//!
//! A full decode pass that counts rather than materializes: records by
//! kind, dictionary activity, value types, and size histograms for
//! strings and integer encodings.

use std::io::Write;

use crate::dictionary::Dictionary;
use crate::error::Result;
use crate::parser::{RecordHandler, RecordParser, ValueHandler, ValueParser};
use crate::source::ByteSource;
use crate::vint::varint_len;

/// Counts bucketed by power of two of the sample size.
#[derive(Default)]
pub struct SizeHistogram {
    buckets: Vec<u64>,
    pub total_bytes: u64,
}

impl SizeHistogram {
    pub fn add(&mut self, size: u64) {
        self.total_bytes += size;
        let bucket = if size == 0 {
            0
        } else {
            64 - size.leading_zeros() as usize
        };
        if bucket + 1 > self.buckets.len() {
            self.buckets.resize(bucket + 1, 0);
        }
        self.buckets[bucket] += 1;
    }

    pub fn total_count(&self) -> u64 {
        self.buckets.iter().sum()
    }

    fn dump(&self, out: &mut dyn Write, name: &str) -> std::io::Result<()> {
        let total = self.total_count();
        writeln!(out, "     {name}: {}", commafy(total))?;
        if total == 0 {
            return Ok(());
        }
        writeln!(out, "       By size, less than:")?;
        for (i, count) in self.buckets.iter().enumerate() {
            writeln!(
                out,
                "        {:>10}: {} ({}%)",
                pretty_bytes(1u64 << i),
                commafy(*count),
                100 * count / total
            )?;
        }
        writeln!(out, "       Total bytes: {}", pretty_bytes(self.total_bytes))
    }
}

#[derive(Default)]
pub struct StreamStats {
    pub header_records: u64,
    pub clear_records: u64,
    pub add_records: u64,
    pub value_records: u64,
    pub value_bytes: u64,
    pub dict_entries_added: u64,
    pub dict_entry_bytes: u64,

    pub nulls: u64,
    pub bools: u64,
    pub uints: u64,
    pub ints: u64,
    pub doubles: u64,
    pub times: u64,
    pub dict_refs: u64,
    pub strings: u64,
    pub arrays: u64,
    pub objects: u64,

    pub string_sizes: SizeHistogram,
    pub varint_sizes: SizeHistogram,
    pub stream_bytes: u64,
    /// Entries of the final dictionary generation, for `-d` dumps.
    pub final_dict: Vec<Vec<u8>>,
}

impl StreamStats {
    pub fn records(&self) -> u64 {
        self.header_records + self.clear_records + self.add_records + self.value_records
    }

    pub fn dump(&self, out: &mut dyn Write, name: &str) -> std::io::Result<()> {
        writeln!(out, "{name}: {}", pretty_bytes(self.stream_bytes))?;
        writeln!(out, "   records: {}", commafy(self.records()))?;
        writeln!(out, "     header: {}", commafy(self.header_records))?;
        writeln!(out, "     dictionary clear: {}", commafy(self.clear_records))?;
        writeln!(out, "     dictionary add: {}", commafy(self.add_records))?;
        writeln!(out, "     value: {}", commafy(self.value_records))?;
        writeln!(
            out,
            "   value payload: {} ({}% of stream)",
            pretty_bytes(self.value_bytes),
            if self.stream_bytes > 0 {
                100 * self.value_bytes / self.stream_bytes
            } else {
                0
            }
        )?;
        writeln!(
            out,
            "   dictionary entries: {} ({})",
            commafy(self.dict_entries_added),
            pretty_bytes(self.dict_entry_bytes)
        )?;
        writeln!(out, "   values:")?;
        writeln!(out, "     null: {}", commafy(self.nulls))?;
        writeln!(out, "     bool: {}", commafy(self.bools))?;
        writeln!(out, "     uint: {}", commafy(self.uints))?;
        writeln!(out, "     int: {}", commafy(self.ints))?;
        writeln!(out, "     double: {}", commafy(self.doubles))?;
        writeln!(out, "     timestamp: {}", commafy(self.times))?;
        writeln!(out, "     dict ref: {}", commafy(self.dict_refs))?;
        writeln!(out, "     string: {}", commafy(self.strings))?;
        writeln!(out, "     array: {}", commafy(self.arrays))?;
        writeln!(out, "     object: {}", commafy(self.objects))?;
        self.string_sizes.dump(out, "inline strings")?;
        self.varint_sizes.dump(out, "integer encodings")
    }
}

/// Decode the stream, collecting statistics. The dictionary is tracked
/// only so far as validity requires; entries are never resolved.
pub fn collect_stats(source: &mut dyn ByteSource) -> Result<StreamStats> {
    let mut stats = StreamStats::default();
    let mut dictionary = Dictionary::new(1);
    {
        let mut handler = StatsHandler {
            stats: &mut stats,
            dictionary: &mut dictionary,
            sor: 0,
            current_add: None,
        };
        RecordParser::new(source, &mut handler).parse_stream()?;
    }
    stats.stream_bytes = source.pos();
    if let Some(dict) = dictionary.latest() {
        stats.final_dict = dict.entries().to_vec();
    }
    Ok(stats)
}

struct StatsHandler<'a> {
    stats: &'a mut StreamStats,
    dictionary: &'a mut Dictionary,
    sor: u64,
    current_add: Option<usize>,
}

impl RecordHandler for StatsHandler<'_> {
    fn on_record_start(&mut self, pos: u64) -> Result<()> {
        self.sor = pos;
        self.current_add = None;
        Ok(())
    }

    fn on_header(&mut self, _version: u64, _metadata: &[u8]) -> Result<()> {
        self.stats.header_records += 1;
        Ok(())
    }

    fn on_dict_clear(&mut self) -> Result<()> {
        self.stats.clear_records += 1;
        self.dictionary.clear(self.sor)?;
        Ok(())
    }

    fn on_dict_add_start(&mut self, backref: u64) -> Result<()> {
        self.stats.add_records += 1;
        self.current_add = Some(self.dictionary.find(self.sor, backref)?);
        Ok(())
    }

    fn on_dict_entry(&mut self, entry: &[u8]) -> Result<()> {
        self.stats.dict_entries_added += 1;
        self.stats.dict_entry_bytes += entry.len() as u64;
        if let Some(idx) = self.current_add {
            let sor = self.sor;
            self.dictionary.get_mut(idx).add(sor, entry);
        }
        Ok(())
    }

    fn on_value(
        &mut self,
        backref: u64,
        len: u64,
        source: &mut dyn ByteSource,
    ) -> Result<()> {
        self.stats.value_records += 1;
        self.stats.value_bytes += len;
        self.dictionary.find(self.sor, backref)?;
        let mut visitor = CountVisitor { stats: self.stats };
        ValueParser::new(source, &mut visitor).value()
    }
}

struct CountVisitor<'a> {
    stats: &'a mut StreamStats,
}

impl ValueHandler for CountVisitor<'_> {
    fn on_object_start(&mut self) -> Result<()> {
        self.stats.objects += 1;
        Ok(())
    }
    fn on_array_start(&mut self) -> Result<()> {
        self.stats.arrays += 1;
        Ok(())
    }
    fn on_null(&mut self, _pos: u64) -> Result<()> {
        self.stats.nulls += 1;
        Ok(())
    }
    fn on_bool(&mut self, _pos: u64, _v: bool) -> Result<()> {
        self.stats.bools += 1;
        Ok(())
    }
    fn on_uint(&mut self, _pos: u64, v: u64) -> Result<()> {
        self.stats.uints += 1;
        self.stats.varint_sizes.add(varint_len(v) as u64);
        Ok(())
    }
    fn on_int(&mut self, _pos: u64, v: i64) -> Result<()> {
        self.stats.ints += 1;
        self.stats.varint_sizes.add(varint_len(v.unsigned_abs()) as u64);
        Ok(())
    }
    fn on_double(&mut self, _pos: u64, _v: f64) -> Result<()> {
        self.stats.doubles += 1;
        Ok(())
    }
    fn on_time(&mut self, _pos: u64, _nanos: i64) -> Result<()> {
        self.stats.times += 1;
        Ok(())
    }
    fn on_dict_ref(&mut self, _pos: u64, _idx: u64) -> Result<()> {
        self.stats.dict_refs += 1;
        Ok(())
    }
    fn on_string_start(&mut self, _pos: u64, len: u64) -> Result<()> {
        self.stats.strings += 1;
        self.stats.string_sizes.add(len);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// `1234567` -> `"1,234,567"`.
pub fn commafy(mut val: u64) -> String {
    if val == 0 {
        return "0".to_owned();
    }
    let mut groups = Vec::new();
    while val > 0 {
        groups.push((val % 1000) as u16);
        val /= 1000;
    }
    let mut out = String::new();
    for (i, g) in groups.iter().rev().enumerate() {
        if i == 0 {
            out.push_str(&g.to_string());
        } else {
            out.push_str(&format!(",{g:03}"));
        }
    }
    out
}

/// Humanized byte count with binary suffixes.
pub fn pretty_bytes(bytes: u64) -> String {
    const SUFFIXES: [&str; 5] = ["B", "K", "M", "G", "T"];
    let mut count = bytes as f64;
    let mut s = 0usize;
    while count >= 1024.0 && s + 1 < SUFFIXES.len() {
        s += 1;
        count /= 1024.0;
    }
    if count.fract() == 0.0 {
        format!("{}{}", count as u64, SUFFIXES[s])
    } else {
        format!("{count:.1}{}", SUFFIXES[s])
    }
}
