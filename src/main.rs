//! Binary entry point for the `au` command-line tool.

use clap::Parser;

use au::cli::args::{Cli, Command};
use au::cli::{cat, enc, grep_cmd, stats_cmd, tail_cmd, zindex_cmd};
use au::set_display_level;

fn run(cli: Cli) -> anyhow::Result<i32> {
    let level = 2i32 + i32::from(cli.verbose) - i32::from(cli.quiet);
    set_display_level(level.clamp(0, 7) as u32);

    match &cli.command {
        Command::Cat(args) => Ok(cat::run(args)),
        Command::Tail(args) => tail_cmd::run(args, false),
        Command::Ztail(args) => tail_cmd::run(args, true),
        Command::Grep(args) => grep_cmd::run(args, false),
        Command::Zgrep(args) => grep_cmd::run(args, true),
        Command::Enc(args) | Command::Json2au(args) => enc::run(args),
        Command::Stats(args) => Ok(stats_cmd::run(args)),
        Command::Zindex(args) => zindex_cmd::run(args),
    }
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("au: {e:#}");
            std::process::exit(1);
        }
    }
}
