//! Command-line surface: argument definitions and per-subcommand
//! drivers. The library proper knows nothing about flags or stdout.

pub mod args;
pub mod cat;
pub mod enc;
pub mod grep_cmd;
pub mod stats_cmd;
pub mod tail_cmd;
pub mod zindex_cmd;
