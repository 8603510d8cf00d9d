//! Command-line definitions for the `au` binary.

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "au",
    version,
    about = "Tools for au, a binary JSON-superset record stream",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Increase verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Decrease verbosity (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Decode files to JSON on stdout (au2json)
    Cat(CatArgs),
    /// Decode the tail of a file, optionally following growth
    Tail(TailArgs),
    /// Tail a gzipped file through its index
    Ztail(TailArgs),
    /// Find records matching a pattern
    Grep(GrepArgs),
    /// Grep a gzipped file through its index
    Zgrep(GrepArgs),
    /// Encode JSON input (same as json2au)
    Enc(EncArgs),
    /// Encode JSON to au
    Json2au(EncArgs),
    /// Display stream statistics
    Stats(StatsArgs),
    /// Build a gzip random-access index
    Zindex(ZindexArgs),
}

#[derive(Args)]
pub struct CatArgs {
    /// Input files; '-' or nothing reads stdin
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct TailArgs {
    /// Output appended data as the file grows
    #[arg(short = 'f', long = "follow")]
    pub follow: bool,

    /// Start this many bytes from the end of the file
    #[arg(short = 'b', long = "bytes", default_value_t = 5 * 1024)]
    pub bytes: u64,

    /// Use the gzip index at this path
    #[arg(short = 'x', long = "index")]
    pub index: Option<String>,

    /// File to tail
    pub path: String,
}

#[derive(Args)]
pub struct GrepArgs {
    /// Match the pattern only in object values with this key
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// Like -k, but values for the key are assumed roughly ordered
    #[arg(short = 'o', long = "ordered", conflicts_with = "key")]
    pub ordered: Option<String>,

    /// Match any value equal to or greater than the pattern
    #[arg(short = 'g', long = "or-greater")]
    pub or_greater: bool,

    /// Treat inputs as plain ASCII logs with leading timestamps
    #[arg(short = 'l', long = "ascii-log")]
    pub ascii_log: bool,

    /// Match the pattern against integer values
    #[arg(short = 'i', long = "integer")]
    pub integer: bool,

    /// Match the pattern against double-precision values
    #[arg(short = 'd', long = "double")]
    pub double: bool,

    /// Match the pattern against timestamps (any prefix of
    /// 2018-03-27T18:45:00.123456789)
    #[arg(short = 't', long = "timestamp")]
    pub timestamp: bool,

    /// Match the pattern only against true/false/null
    #[arg(short = 'a', long = "atom")]
    pub atom: bool,

    /// Match the pattern against string values
    #[arg(short = 's', long = "string")]
    pub string: bool,

    /// Match the pattern as a substring of string values (implies -s)
    #[arg(short = 'u', long = "substring")]
    pub substring: bool,

    /// Show only the first N matching records
    #[arg(short = 'm', long = "matches")]
    pub matches: Option<u64>,

    /// Records of context before each match
    #[arg(short = 'B', long = "before")]
    pub before: Option<u32>,

    /// Records of context after each match
    #[arg(short = 'A', long = "after")]
    pub after: Option<u32>,

    /// Equivalent to -A n -B n
    #[arg(short = 'C', long = "context")]
    pub context: Option<u32>,

    /// Print records following a match until an explicit non-match
    #[arg(short = 'F', long = "follow-context")]
    pub follow_context: bool,

    /// Print the count of matching records per file
    #[arg(short = 'c', long = "count")]
    pub count: bool,

    /// Disable regex matching even for R(...)-shaped arguments
    #[arg(short = 'r', long = "no-regex")]
    pub no_regex: bool,

    /// Output encoded records rather than JSON
    #[arg(short = 'e', long = "encode")]
    pub encode: bool,

    /// Use the gzip index at this path (zgrep only)
    #[arg(short = 'x', long = "index")]
    pub index: Option<String>,

    /// The pattern; R(...) enables regex mode unless -r is given
    pub pattern: String,

    /// Input files; '-' or nothing reads stdin
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct EncArgs {
    /// JSON input ('-' for stdin)
    #[arg(default_value = "-")]
    pub input: String,

    /// Output file ('-' for stdout)
    #[arg(default_value = "-")]
    pub output: String,

    /// Stop after this many records
    pub count: Option<u64>,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Also dump the leading dictionary entries
    #[arg(short = 'd', long = "dict")]
    pub dict: bool,

    /// Input files; '-' or nothing reads stdin
    pub paths: Vec<String>,
}

#[derive(Args)]
pub struct ZindexArgs {
    /// Write the index here instead of <realpath>.auzx
    #[arg(short = 'x', long = "index")]
    pub index: Option<String>,

    /// Gzipped file to index
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn grep_flags_parse() {
        let cli = Cli::parse_from([
            "au", "grep", "-k", "ts", "-g", "-m", "5", "-C", "2", "pattern", "a.au",
            "b.au",
        ]);
        match cli.command {
            Command::Grep(g) => {
                assert_eq!(g.key.as_deref(), Some("ts"));
                assert!(g.or_greater);
                assert_eq!(g.matches, Some(5));
                assert_eq!(g.context, Some(2));
                assert_eq!(g.pattern, "pattern");
                assert_eq!(g.paths, ["a.au", "b.au"]);
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn key_and_ordered_conflict() {
        assert!(
            Cli::try_parse_from(["au", "grep", "-k", "a", "-o", "b", "p", "f"]).is_err()
        );
    }

    #[test]
    fn tail_defaults() {
        let cli = Cli::parse_from(["au", "tail", "file.au"]);
        match cli.command {
            Command::Tail(t) => {
                assert!(!t.follow);
                assert_eq!(t.bytes, 5 * 1024);
                assert_eq!(t.path, "file.au");
            }
            _ => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn enc_defaults_to_stdio() {
        let cli = Cli::parse_from(["au", "json2au"]);
        match cli.command {
            Command::Json2au(e) => {
                assert_eq!(e.input, "-");
                assert_eq!(e.output, "-");
                assert_eq!(e.count, None);
            }
            _ => panic!("wrong subcommand"),
        }
    }
}
