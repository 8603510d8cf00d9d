//! Typed match patterns.
//!
//! One user-supplied pattern text is compiled into whichever typed
//! matchers it can represent — string, integer, double, timestamp
//! interval, atom — and a record matches when any value of a matching
//! type compares equal (or `>=` in match-or-greater mode, which is what
//! bisect probes with). Regex and substring matching are equality-only:
//! they have no useful ordering, so they refuse match-or-greater.

use regex::bytes::Regex;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Atom {
    True,
    False,
    Null,
}

#[derive(Clone)]
pub enum KeyMatcher {
    Literal(Vec<u8>),
    Regex(Regex),
}

impl KeyMatcher {
    fn matches(&self, key: &[u8]) -> bool {
        match self {
            KeyMatcher::Literal(k) => k == key,
            KeyMatcher::Regex(re) => full_match(re, key),
        }
    }
}

#[derive(Clone)]
pub enum StrMatcher {
    Literal { pattern: Vec<u8>, full_match: bool },
    Regex { re: Regex, full_match: bool },
}

fn full_match(re: &Regex, s: &[u8]) -> bool {
    match re.find(s) {
        Some(m) => m.start() == 0 && m.end() == s.len(),
        None => false,
    }
}

#[derive(Clone, Default)]
pub struct Pattern {
    pub key: Option<KeyMatcher>,
    pub atom: Option<Atom>,
    pub int: Option<i64>,
    pub uint: Option<u64>,
    pub double: Option<f64>,
    /// Half-open nanosecond interval `[start, end)`.
    pub timestamp: Option<(i64, i64)>,
    pub str_pattern: Option<StrMatcher>,

    pub num_matches: Option<u64>,
    /// Stop a linear scan after this many bytes without a match.
    pub scan_suffix: Option<u64>,
    pub before_context: u32,
    pub after_context: u32,
    pub follow_context: bool,
    pub bisect: bool,
    pub count: bool,
    pub match_or_greater: bool,
}

impl Pattern {
    /// Whether matching is restricted to values under a specific key.
    pub fn requires_key_match(&self) -> bool {
        self.key.is_some()
    }

    pub fn matches_key(&self, key: &[u8]) -> bool {
        match &self.key {
            None => true,
            Some(m) => m.matches(key),
        }
    }

    pub fn matches_atom(&self, val: Atom) -> bool {
        // Atoms have no ordering to search by.
        if self.match_or_greater {
            return false;
        }
        self.atom == Some(val)
    }

    pub fn matches_time(&self, nanos: i64) -> bool {
        match self.timestamp {
            None => false,
            Some((start, end)) => {
                if self.match_or_greater {
                    nanos >= start
                } else {
                    nanos >= start && nanos < end
                }
            }
        }
    }

    pub fn matches_uint(&self, val: u64) -> bool {
        match self.uint {
            None => false,
            Some(p) => {
                if self.match_or_greater {
                    val >= p
                } else {
                    val == p
                }
            }
        }
    }

    pub fn matches_int(&self, val: i64) -> bool {
        match self.int {
            None => false,
            Some(p) => {
                if self.match_or_greater {
                    val >= p
                } else {
                    val == p
                }
            }
        }
    }

    pub fn matches_double(&self, val: f64) -> bool {
        match self.double {
            None => false,
            Some(p) => {
                if self.match_or_greater {
                    val >= p
                } else {
                    val == p
                }
            }
        }
    }

    pub fn matches_str(&self, val: &[u8]) -> bool {
        match &self.str_pattern {
            None => false,
            Some(StrMatcher::Literal {
                pattern,
                full_match,
            }) => {
                if *full_match {
                    if self.match_or_greater {
                        val >= pattern.as_slice()
                    } else {
                        val == pattern.as_slice()
                    }
                } else {
                    // Substring search has no ordering.
                    if self.match_or_greater {
                        return false;
                    }
                    memchr::memmem::find(val, pattern).is_some()
                }
            }
            Some(StrMatcher::Regex { re, full_match: fm }) => {
                if self.match_or_greater {
                    return false;
                }
                if *fm {
                    full_match(re, val)
                } else {
                    re.is_match(val)
                }
            }
        }
    }

    /// True when no typed matcher can drive the binary search: bisect
    /// needs an ordered comparison.
    pub fn incompatible_with_bisect(&self) -> bool {
        let ordered_str = matches!(
            self.str_pattern,
            Some(StrMatcher::Literal {
                full_match: true,
                ..
            })
        );
        let ordered = ordered_str
            || self.int.is_some()
            || self.uint.is_some()
            || self.double.is_some()
            || self.timestamp.is_some();
        !ordered
    }

    /// The probe pattern bisect parses candidate records with.
    pub fn for_bisect(&self) -> Pattern {
        let mut p = self.clone();
        p.match_or_greater = true;
        p
    }
}
