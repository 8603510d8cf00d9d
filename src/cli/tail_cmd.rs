//! `au tail` / `au ztail` — decode from near the end of a file.

use std::io::{self, BufWriter, Write};

use crate::cli::args::TailArgs;
use crate::detect::{is_au_stream, open_source};
use crate::dictionary::Dictionary;
use crate::display;
use crate::json::JsonOutputHandler;
use crate::source::ByteSource;
use crate::tail::TailHandler;

pub fn run(args: &TailArgs, compressed: bool) -> anyhow::Result<i32> {
    if args.path == "-" {
        display!("Tailing stdin is not supported\n");
        return Ok(1);
    }

    let mut source = open_source(
        &args.path,
        args.index.as_deref(),
        compressed,
        args.follow,
    )?;
    if !source.is_seekable() {
        display!("Cannot tail non-seekable file '{}'\n", source.name());
        return Ok(0);
    }
    if !is_au_stream(source.as_mut())? {
        display!(
            "{} does not appear to be an au-encoded file (gzipped or otherwise)\n",
            source.name()
        );
        return Ok(1);
    }

    source.tail(args.bytes)?;

    let stdout = io::stdout();
    // Follow mode must not sit on buffered output between polls.
    let out: Box<dyn Write> = if args.follow {
        Box::new(stdout.lock())
    } else {
        Box::new(BufWriter::new(stdout.lock()))
    };
    let mut dictionary = Dictionary::new(1);
    let mut sink = JsonOutputHandler::new(out);
    {
        let mut tail = TailHandler::new(&mut dictionary, source.as_mut());
        tail.parse_stream(&mut sink)?;
    }
    sink.into_inner().flush()?;
    Ok(0)
}
