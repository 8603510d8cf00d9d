//! `au grep` / `au zgrep` — pattern search.
//!
//! The pattern text is compiled into every typed matcher it can
//! represent (string, integer, double, timestamp, atom) unless explicit
//! type flags narrow it. `-o` marks the keyed values as roughly ordered
//! and switches to the bisect strategy; `-l` applies the plaintext
//! timestamp analog to ordinary log files.

use std::io::{self, BufWriter, Write};

use regex::bytes::Regex;

use crate::cli::args::GrepArgs;
use crate::detect::{is_au_stream, open_source};
use crate::dictionary::Dictionary;
use crate::display;
use crate::encoder::EncoderConfig;
use crate::error::Result;
use crate::grep::{ascii_grep, bisect, scan, Atom, KeyMatcher, Pattern, StrMatcher};
use crate::json::{AuOutputHandler, JsonOutputHandler};
use crate::parser::ValueSink;
use crate::source::ByteSource;
use crate::timestamp::parse_pattern as parse_ts_pattern;

pub fn run(args: &GrepArgs, compressed: bool) -> anyhow::Result<i32> {
    let pattern = match build_pattern(args) {
        Ok(p) => p,
        Err(msg) => {
            display!("{msg}\n");
            return Ok(1);
        }
    };

    let paths: Vec<String> = if args.paths.is_empty() {
        vec!["-".to_owned()]
    } else {
        args.paths.clone()
    };
    for path in &paths {
        let result = grep_file(&pattern, path, args, compressed)?;
        if result != 0 {
            return Ok(result);
        }
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Pattern construction
// ---------------------------------------------------------------------------

/// `R(...)` unless regex mode is disabled.
fn regex_payload<'a>(text: &'a str, args: &GrepArgs) -> Option<&'a str> {
    if args.no_regex {
        return None;
    }
    text.strip_prefix("R(").and_then(|rest| rest.strip_suffix(')'))
}

fn compile_regex(payload: &str) -> std::result::Result<Regex, String> {
    Regex::new(payload).map_err(|e| format!("regex failed to compile: {payload}\n  error: {e}"))
}

fn build_pattern(args: &GrepArgs) -> std::result::Result<Pattern, String> {
    let mut flags = 0;
    if args.key.is_some() {
        flags += 1;
    }
    if args.ordered.is_some() {
        flags += 1;
    }
    if args.ascii_log {
        flags += 1;
    }
    if flags > 1 {
        return Err("only one of -k, -o or -l may be specified".to_owned());
    }

    let mut pattern = Pattern::default();

    let key_text = args.key.as_deref().or(args.ordered.as_deref());
    if let Some(text) = key_text {
        pattern.key = Some(match regex_payload(text, args) {
            Some(payload) => KeyMatcher::Regex(compile_regex(payload)?),
            None => KeyMatcher::Literal(text.as_bytes().to_vec()),
        });
    }
    if args.ordered.is_some() || args.ascii_log {
        pattern.bisect = true;
    }
    pattern.match_or_greater = args.or_greater;
    pattern.num_matches = args.matches;
    pattern.count = args.count;
    pattern.follow_context = args.follow_context;
    if let Some(c) = args.context {
        pattern.before_context = c;
        pattern.after_context = c;
    }
    if let Some(b) = args.before {
        pattern.before_context = b;
    }
    if let Some(a) = args.after {
        pattern.after_context = a;
    }

    let explicit_timestamp = args.ascii_log || args.timestamp;
    let explicit_string = args.string || args.substring;
    let numeric = args.integer || args.double || args.timestamp || args.atom;
    let default_match = !(numeric || explicit_string);

    if args.substring && numeric {
        return Err("-u (substring search) is not compatible with -i/-d/-t/-a".to_owned());
    }

    let pattern_is_regex = regex_payload(&args.pattern, args).is_some();
    if pattern_is_regex && args.ordered.is_some() {
        return Err("pattern for -o/--ordered cannot be regex".to_owned());
    }
    if pattern_is_regex && args.or_greater {
        return Err("pattern for -g/--or-greater cannot be regex".to_owned());
    }

    // By default, try to match the pattern as anything it can parse as.
    if default_match || explicit_string {
        pattern.str_pattern = Some(match regex_payload(&args.pattern, args) {
            Some(payload) => StrMatcher::Regex {
                re: compile_regex(payload)?,
                full_match: !args.substring,
            },
            None => StrMatcher::Literal {
                pattern: args.pattern.as_bytes().to_vec(),
                full_match: !args.substring,
            },
        });
    }

    if default_match || args.integer {
        pattern.int = args.pattern.parse::<i64>().ok();
        pattern.uint = args.pattern.parse::<u64>().ok();
        if pattern.int.is_none() && pattern.uint.is_none() && args.integer {
            return Err(format!(
                "-i specified, but pattern '{}' is not an integer",
                args.pattern
            ));
        }
    }

    if default_match || args.double {
        pattern.double = args.pattern.parse::<f64>().ok();
        if pattern.double.is_none() && args.double {
            return Err(format!(
                "-d specified, but pattern '{}' is not a double-precision number",
                args.pattern
            ));
        }
    }

    if default_match || explicit_timestamp {
        pattern.timestamp = parse_ts_pattern(&args.pattern);
        if pattern.timestamp.is_none() && explicit_timestamp {
            return Err(format!(
                "-t/-l specified, but pattern '{}' is not a date/time",
                args.pattern
            ));
        }
    }

    if default_match || args.atom {
        pattern.atom = match args.pattern.as_str() {
            "true" => Some(Atom::True),
            "false" => Some(Atom::False),
            "null" => Some(Atom::Null),
            _ => None,
        };
        if pattern.atom.is_none() && args.atom {
            return Err(format!(
                "-a specified, but pattern '{}' is not true, false or null",
                args.pattern
            ));
        }
    }

    Ok(pattern)
}

// ---------------------------------------------------------------------------
// Per-file execution
// ---------------------------------------------------------------------------

fn grep_file(
    pattern: &Pattern,
    path: &str,
    args: &GrepArgs,
    compressed: bool,
) -> anyhow::Result<i32> {
    let mut source = open_source(path, args.index.as_deref(), compressed, false)?;
    let stdout = io::stdout();

    if args.ascii_log {
        if is_au_stream(source.as_mut())? {
            display!(
                "{path} appears to be au-encoded; -l is unlikely to do anything useful here\n"
            );
            return Ok(1);
        }
        let mut out = BufWriter::new(stdout.lock());
        let total = ascii_grep(pattern, source.as_mut(), &mut out)?;
        out.flush()?;
        if pattern.count {
            println!("{total}");
        }
        return Ok(0);
    }

    if !is_au_stream(source.as_mut())? {
        display!("{path} does not appear to be an au-encoded file (gzipped or otherwise)\n");
        return Ok(1);
    }

    let total = if args.encode {
        let name = if path == "-" { "<stdin>" } else { path };
        let config = EncoderConfig::default()
            .with_metadata(format!("Encoded by au: grep output from au file {name}"));
        let mut sink = AuOutputHandler::new(BufWriter::new(stdout.lock()), config)?;
        let total = run_grep(pattern, source.as_mut(), &mut sink)?;
        sink.flush()?;
        total
    } else {
        let mut sink = JsonOutputHandler::new(BufWriter::new(stdout.lock()));
        let total = run_grep(pattern, source.as_mut(), &mut sink)?;
        sink.into_inner().flush()?;
        total
    };

    if pattern.count {
        println!("{total}");
    }
    Ok(0)
}

fn run_grep<O: ValueSink>(
    pattern: &Pattern,
    source: &mut dyn ByteSource,
    out: &mut O,
) -> Result<u64> {
    if pattern.bisect && source.is_seekable() && !pattern.incompatible_with_bisect() {
        bisect(pattern, source, out)
    } else {
        let mut dictionary = Dictionary::new(1);
        scan(pattern, &mut dictionary, source, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(argv: &[&str]) -> GrepArgs {
        let cli = crate::cli::args::Cli::parse_from(argv);
        match cli.command {
            crate::cli::args::Command::Grep(g) => g,
            _ => panic!("expected grep"),
        }
    }

    #[test]
    fn default_pattern_sets_all_parseable_types() {
        let args = parse(&["au", "grep", "42", "f.au"]);
        let p = build_pattern(&args).unwrap();
        assert!(p.str_pattern.is_some());
        assert_eq!(p.int, Some(42));
        assert_eq!(p.uint, Some(42));
        assert_eq!(p.double, Some(42.0));
        assert!(p.timestamp.is_none());
        assert!(p.atom.is_none());
    }

    #[test]
    fn ordered_key_enables_bisect() {
        let args = parse(&["au", "grep", "-o", "ts", "2024-01-01", "f.au"]);
        let p = build_pattern(&args).unwrap();
        assert!(p.bisect);
        assert!(p.requires_key_match());
        assert!(p.timestamp.is_some());
    }

    #[test]
    fn regex_pattern_detected() {
        let args = parse(&["au", "grep", "R((?i)hello)", "f.au"]);
        let p = build_pattern(&args).unwrap();
        assert!(matches!(p.str_pattern, Some(StrMatcher::Regex { .. })));
    }

    #[test]
    fn no_regex_disables_detection() {
        let args = parse(&["au", "grep", "-r", "R(xyz)", "f.au"]);
        let p = build_pattern(&args).unwrap();
        assert!(matches!(p.str_pattern, Some(StrMatcher::Literal { .. })));
    }

    #[test]
    fn regex_with_ordered_rejected() {
        let args = parse(&["au", "grep", "-o", "k", "R(x)", "f.au"]);
        assert!(build_pattern(&args).is_err());
    }

    #[test]
    fn substring_with_numeric_rejected() {
        let args = parse(&["au", "grep", "-u", "-i", "5", "f.au"]);
        assert!(build_pattern(&args).is_err());
    }

    #[test]
    fn explicit_int_flag_requires_integer() {
        let args = parse(&["au", "grep", "-i", "not-a-number", "f.au"]);
        assert!(build_pattern(&args).is_err());
    }

    #[test]
    fn context_flag_sets_both_directions() {
        let args = parse(&["au", "grep", "-C", "3", "x", "f.au"]);
        let p = build_pattern(&args).unwrap();
        assert_eq!(p.before_context, 3);
        assert_eq!(p.after_context, 3);
    }
}
