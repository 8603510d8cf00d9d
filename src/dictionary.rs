//! Reader-side dictionary reconstruction.
//!
//! Each `C` record starts a new dictionary generation, identified by the
//! absolute position of that record. `A` records append entries; `V`
//! records reference the generation through a back-reference that must land
//! inside the generation's `[start_pos, last_dict_pos]` span.
//!
//! [`Dictionary`] keeps a handful of generations alive at once — one is
//! enough for sequential decoding, but a bisect jumps around and would
//! otherwise rebuild the same generation over and over. Eviction is
//! oldest-first.

use crate::error::{AuError, Result};

/// One dictionary generation.
pub struct Dict {
    start_pos: u64,
    last_dict_pos: u64,
    entries: Vec<Vec<u8>>,
}

impl Dict {
    fn new(start_pos: u64) -> Self {
        Dict {
            start_pos,
            last_dict_pos: start_pos,
            entries: Vec::new(),
        }
    }

    fn reset(&mut self, sor: u64) {
        self.entries.clear();
        self.start_pos = sor;
        self.last_dict_pos = sor;
    }

    /// Position of the `C` record that began this generation.
    pub fn start_pos(&self) -> u64 {
        self.start_pos
    }

    /// Position of the newest `A` (or the `C` itself) in this generation.
    pub fn last_dict_pos(&self) -> u64 {
        self.last_dict_pos
    }

    /// Whether `pos` falls within this generation's back-reference span.
    pub fn includes(&self, pos: u64) -> bool {
        self.start_pos <= pos && pos <= self.last_dict_pos
    }

    /// Append an entry recorded by an `A` record starting at `sor`.
    pub fn add(&mut self, sor: u64, value: &[u8]) {
        self.entries.push(value.to_vec());
        self.last_dict_pos = sor;
    }

    /// Entry lookup; `None` for an out-of-range index.
    pub fn get(&self, idx: u64) -> Option<&[u8]> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.entries.get(i))
            .map(|v| v.as_slice())
    }

    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A small pool of dictionary generations keyed by `C` position.
pub struct Dictionary {
    dicts: Vec<Dict>,
    max_dicts: usize,
}

impl Dictionary {
    /// `max_dicts` of 1 suits sequential decoding; bisect wants more so
    /// that revisited generations need not be rebuilt.
    pub fn new(max_dicts: usize) -> Self {
        Dictionary {
            dicts: Vec::with_capacity(max_dicts),
            max_dicts: max_dicts.max(1),
        }
    }

    /// Begin (or re-observe) a generation whose `C` record starts at
    /// `sor`. Re-observing the same position is a no-op; a position inside
    /// a different generation's span is a structural error.
    pub fn clear(&mut self, sor: u64) -> Result<usize> {
        if let Some(i) = self.search(sor) {
            if self.dicts[i].start_pos() == sor {
                return Ok(i);
            }
            return Err(AuError::parse(
                sor,
                format!(
                    "dictionary mismatch: dict-clear at {sor} is within the valid \
                     range of the dictionary starting at {}",
                    self.dicts[i].start_pos()
                ),
            ));
        }
        if self.dicts.len() == self.max_dicts {
            let mut dict = self.dicts.remove(0);
            dict.reset(sor);
            self.dicts.push(dict);
        } else {
            self.dicts.push(Dict::new(sor));
        }
        Ok(self.dicts.len() - 1)
    }

    /// Resolve the generation containing absolute position `sor - backref`.
    pub fn find(&self, sor: u64, backref: u64) -> Result<usize> {
        let pos = sor.checked_sub(backref).ok_or_else(|| {
            AuError::parse(
                sor,
                format!("back-reference {backref} points before the start of the file"),
            )
        })?;
        self.search(pos).ok_or_else(|| {
            AuError::parse(
                sor,
                format!(
                    "wrong backref: no dictionary includes absolute position {pos} \
                     (start-of-record {sor}, backref {backref})"
                ),
            )
        })
    }

    /// Index of the generation whose span contains `pos`, if any. Scans
    /// newest-first: sequential decoding always hits the last one.
    pub fn search(&self, pos: u64) -> Option<usize> {
        self.dicts.iter().rposition(|d| d.includes(pos))
    }

    pub fn get(&self, idx: usize) -> &Dict {
        &self.dicts[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Dict {
        &mut self.dicts[idx]
    }

    /// The most recently started generation.
    pub fn latest(&self) -> Option<&Dict> {
        self.dicts.last()
    }
}
