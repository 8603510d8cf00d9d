//! `au stats` — stream statistics.

use std::io::{self, Write};

use crate::cli::args::StatsArgs;
use crate::detect::open_source;
use crate::display;
use crate::stats::collect_stats;

const DICT_DUMP_ENTRIES: usize = 25;

pub fn run(args: &StatsArgs) -> i32 {
    let paths: Vec<String> = if args.paths.is_empty() {
        vec!["-".to_owned()]
    } else {
        args.paths.clone()
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut result = 0;
    for path in &paths {
        if let Err(e) = stats_one(path, args.dict, &mut out) {
            display!("{e} while processing {path}\n");
            result = 1;
        }
    }
    result
}

fn stats_one(path: &str, dump_dict: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut source = open_source(path, None, false, false)?;
    let stats = collect_stats(source.as_mut())?;
    let name = if path == "-" { "<stdin>" } else { path };
    stats.dump(out, name)?;
    if dump_dict && !stats.final_dict.is_empty() {
        writeln!(out, "   dictionary head:")?;
        for entry in stats.final_dict.iter().take(DICT_DUMP_ENTRIES) {
            writeln!(out, "     {}", String::from_utf8_lossy(entry))?;
        }
    }
    Ok(())
}
