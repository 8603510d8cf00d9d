//! Match evaluation over value events.
//!
//! [`GrepHandler`] parses one value record at a time, tracking whether the
//! cursor is at a key or a value position so key-restricted patterns only
//! test the right values. It records whether the record matched; the scan
//! driver then decides what to output.

use crate::dictionary::Dict;
use crate::error::Result;
use crate::grep::pattern::{Atom, Pattern};
use crate::parser::{ValueHandler, ValueParser, ValueSink};
use crate::source::ByteSource;

#[derive(Clone, Copy, PartialEq)]
enum Ctx {
    Bare,
    Object,
    Array,
}

struct Marker {
    ctx: Ctx,
    counter: usize,
    check_val: bool,
}

pub struct GrepHandler<'p> {
    pattern: &'p Pattern,
    matched: bool,
    /// A key matching the key pattern was seen, but its value did not
    /// match: the record explicitly mismatches (vs. simply lacking the
    /// key). Follow-context mode stops on these.
    explicit_mismatch: bool,
    str_buf: Vec<u8>,
    context: Vec<Marker>,
}

impl<'p> GrepHandler<'p> {
    pub fn new(pattern: &'p Pattern) -> Self {
        GrepHandler {
            pattern,
            matched: false,
            explicit_mismatch: false,
            str_buf: Vec::with_capacity(1 << 10),
            context: Vec::new(),
        }
    }

    pub fn matched(&self) -> bool {
        self.matched
    }

    pub fn explicit_mismatch(&self) -> bool {
        self.explicit_mismatch && !self.matched
    }
}

impl ValueSink for GrepHandler<'_> {
    fn on_value(&mut self, source: &mut dyn ByteSource, dict: &Dict) -> Result<()> {
        self.matched = false;
        self.explicit_mismatch = false;
        self.context.clear();
        self.context.push(Marker {
            ctx: Ctx::Bare,
            counter: 0,
            check_val: !self.pattern.requires_key_match(),
        });
        let mut visitor = GrepVisitor { dict, h: self };
        ValueParser::new(source, &mut visitor).value()
    }
}

struct GrepVisitor<'a, 'p> {
    dict: &'a Dict,
    h: &'a mut GrepHandler<'p>,
}

impl GrepVisitor<'_, '_> {
    fn top(&mut self) -> &mut Marker {
        self.h.context.last_mut().expect("context never empty")
    }

    fn is_key(&self) -> bool {
        let c = self.h.context.last().expect("context never empty");
        c.ctx == Ctx::Object && c.counter % 2 == 0
    }

    fn check_val(&self) -> bool {
        self.h.context.last().expect("context never empty").check_val
    }

    fn incr(&mut self) {
        self.top().counter += 1;
    }

    fn found(&mut self, matches: bool) {
        if self.check_val() {
            if matches {
                self.h.matched = true;
            } else if self.h.pattern.requires_key_match() {
                self.h.explicit_mismatch = true;
            }
        }
        self.incr();
    }

    fn check_string(&mut self, s: &[u8]) {
        if self.is_key() {
            let hit = self.h.pattern.matches_key(s);
            self.top().check_val = hit;
        } else {
            let matches = self.h.pattern.matches_str(s);
            self.found(matches);
            return;
        }
        self.incr();
    }

    fn wants_strings(&self) -> bool {
        self.h.pattern.str_pattern.is_some()
            || (self.h.pattern.requires_key_match() && self.is_key())
    }
}

impl ValueHandler for GrepVisitor<'_, '_> {
    fn on_object_start(&mut self) -> Result<()> {
        self.h.context.push(Marker {
            ctx: Ctx::Object,
            counter: 0,
            check_val: false,
        });
        Ok(())
    }

    fn on_object_end(&mut self) -> Result<()> {
        self.h.context.pop();
        self.incr();
        Ok(())
    }

    fn on_array_start(&mut self) -> Result<()> {
        let check = self.check_val();
        self.h.context.push(Marker {
            ctx: Ctx::Array,
            counter: 0,
            check_val: check,
        });
        Ok(())
    }

    fn on_array_end(&mut self) -> Result<()> {
        self.h.context.pop();
        self.incr();
        Ok(())
    }

    fn on_null(&mut self, _pos: u64) -> Result<()> {
        let m = self.h.pattern.matches_atom(Atom::Null);
        self.found(m);
        Ok(())
    }

    fn on_bool(&mut self, _pos: u64, v: bool) -> Result<()> {
        let atom = if v { Atom::True } else { Atom::False };
        let m = self.h.pattern.matches_atom(atom);
        self.found(m);
        Ok(())
    }

    fn on_int(&mut self, _pos: u64, v: i64) -> Result<()> {
        let m = self.h.pattern.matches_int(v);
        self.found(m);
        Ok(())
    }

    fn on_uint(&mut self, _pos: u64, v: u64) -> Result<()> {
        // An unsigned value within signed range should also satisfy a
        // signed pattern.
        let m = self.h.pattern.matches_uint(v)
            || (i64::try_from(v)
                .map(|i| self.h.pattern.matches_int(i))
                .unwrap_or(false));
        self.found(m);
        Ok(())
    }

    fn on_double(&mut self, _pos: u64, v: f64) -> Result<()> {
        let m = self.h.pattern.matches_double(v);
        self.found(m);
        Ok(())
    }

    fn on_time(&mut self, _pos: u64, nanos: i64) -> Result<()> {
        let m = self.h.pattern.matches_time(nanos);
        self.found(m);
        Ok(())
    }

    fn on_dict_ref(&mut self, pos: u64, idx: u64) -> Result<()> {
        let dict = self.dict;
        let s = dict.get(idx).ok_or_else(|| {
            crate::error::AuError::parse(
                pos,
                format!("dictionary reference {idx} out of range"),
            )
        })?;
        self.check_string(s);
        Ok(())
    }

    fn on_string_start(&mut self, _pos: u64, len: u64) -> Result<()> {
        if self.wants_strings() {
            self.h.str_buf.clear();
            self.h.str_buf.reserve(len as usize);
        }
        Ok(())
    }

    fn on_string_fragment(&mut self, frag: &[u8]) -> Result<()> {
        if self.wants_strings() {
            self.h.str_buf.extend_from_slice(frag);
        }
        Ok(())
    }

    fn on_string_end(&mut self) -> Result<()> {
        if self.wants_strings() {
            let s = std::mem::take(&mut self.h.str_buf);
            self.check_string(&s);
            self.h.str_buf = s;
        } else {
            // Nothing cared about the content, but position tracking
            // must stay accurate.
            self.incr();
        }
        Ok(())
    }
}
