//! Encoder-side string interning.
//!
//! Two cooperating structures decide which strings earn a dictionary slot:
//!
//! - [`UsageTracker`] — a bounded cache of candidate strings in
//!   first-sighting order. Each sighting bumps a counter; a candidate whose
//!   counter reaches the threshold is promoted (and leaves the cache). When
//!   the cache is full the oldest candidate is evicted to make room.
//! - [`StringIntern`] — the dictionary itself: an append-only ordered list
//!   of promoted strings plus a hash from string to `{index, occurrences}`.
//!   Purging removes cold hash entries but never renumbers the ordered
//!   list, since readers reconstruct that list verbatim.
//!
//! A string is in exactly one of three states: unknown, candidate, or
//! interned.

use std::collections::{HashMap, VecDeque};

// ---------------------------------------------------------------------------
// UsageTracker
// ---------------------------------------------------------------------------

/// Recency-bounded frequency tracker for intern candidates.
///
/// The queue holds candidates in insertion order; membership is decided by
/// the counts map. Promotion and eviction remove both together, so the
/// queue front is always the oldest live candidate.
pub struct UsageTracker {
    threshold: u64,
    cache_size: usize,
    counts: HashMap<Vec<u8>, u64>,
    order: VecDeque<Vec<u8>>,
}

impl UsageTracker {
    pub fn new(threshold: u64, cache_size: usize) -> Self {
        UsageTracker {
            threshold,
            cache_size,
            counts: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Record a sighting of `s`; true means "promote to the dictionary".
    pub fn should_intern(&mut self, s: &[u8]) -> bool {
        if let Some(count) = self.counts.get_mut(s) {
            if *count >= self.threshold {
                self.counts.remove(s);
                // Drop the queue slot too, so a purged-and-retracked
                // string cannot inherit this sighting's age.
                if let Some(i) = self.order.iter().position(|x| x == s) {
                    self.order.remove(i);
                }
                return true;
            }
            *count += 1;
            return false;
        }
        if self.counts.len() >= self.cache_size {
            // Evict the oldest candidate. The loop is defensive; the
            // front is live whenever the map is at capacity.
            while let Some(old) = self.order.pop_front() {
                if self.counts.remove(&old).is_some() {
                    break;
                }
            }
        }
        self.counts.insert(s.to_vec(), 1);
        self.order.push_back(s.to_vec());
        false
    }

    pub fn clear(&mut self) {
        self.counts.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

// ---------------------------------------------------------------------------
// StringIntern
// ---------------------------------------------------------------------------

struct InternEntry {
    index: u64,
    occurrences: u64,
}

/// Intern decision for a string: force, forbid, or let the tracker decide.
pub type InternHint = Option<bool>;

pub struct StringIntern {
    tiny_str: usize,
    dict_in_order: Vec<Vec<u8>>,
    entries: HashMap<Vec<u8>, InternEntry>,
    next_entry: u64,
    tracker: UsageTracker,
}

impl StringIntern {
    pub fn new(tiny_str: usize, threshold: u64, cache_size: usize) -> Self {
        StringIntern {
            tiny_str,
            dict_in_order: Vec::new(),
            entries: HashMap::new(),
            next_entry: 0,
            tracker: UsageTracker::new(threshold, cache_size),
        }
    }

    /// Dictionary index for `s`, if it is (or just became) interned.
    ///
    /// `hint`: `Some(false)` forbids interning, `Some(true)` forces it
    /// (tiny strings excepted), `None` defers to the usage tracker.
    pub fn idx(&mut self, s: &[u8], hint: InternHint) -> Option<u64> {
        if s.len() <= self.tiny_str {
            return None;
        }
        if hint == Some(false) {
            return None;
        }
        if let Some(entry) = self.entries.get_mut(s) {
            entry.occurrences += 1;
            return Some(entry.index);
        }
        if hint == Some(true) || self.tracker.should_intern(s) {
            let index = self.next_entry;
            self.next_entry += 1;
            self.entries.insert(
                s.to_vec(),
                InternEntry {
                    index,
                    occurrences: 1,
                },
            );
            self.dict_in_order.push(s.to_vec());
            return Some(index);
        }
        None
    }

    /// The ordered dictionary, as readers will reconstruct it.
    pub fn dict(&self) -> &[Vec<u8>] {
        &self.dict_in_order
    }

    /// Drop hash entries seen fewer than `threshold` times. The ordered
    /// list is left untouched — indices already on the wire stay valid.
    /// Returns the number of entries removed.
    pub fn purge(&mut self, threshold: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.occurrences >= threshold);
        before - self.entries.len()
    }

    /// Reset for a fresh dictionary generation.
    pub fn clear(&mut self, clear_tracker: bool) {
        self.entries.clear();
        self.dict_in_order.clear();
        self.next_entry = 0;
        if clear_tracker {
            self.tracker.clear();
        }
    }
}
