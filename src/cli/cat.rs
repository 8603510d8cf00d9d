//! `au cat` — sequential decode to JSON lines.

use std::io::{self, BufWriter, Write};

use crate::cli::args::CatArgs;
use crate::detect::open_source;
use crate::dictionary::Dictionary;
use crate::display;
use crate::error::Result;
use crate::json::JsonOutputHandler;
use crate::parser::{DictRecordHandler, RecordParser};

pub fn run(args: &CatArgs) -> i32 {
    let paths: Vec<String> = if args.paths.is_empty() {
        vec!["-".to_owned()]
    } else {
        args.paths.clone()
    };

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut result = 0;
    for path in &paths {
        if let Err(e) = cat_one(path, &mut out) {
            display!("{e} while processing {path}\n");
            result = 1;
        }
    }
    if out.flush().is_err() {
        result = 1;
    }
    result
}

fn cat_one(path: &str, out: impl Write) -> Result<()> {
    let mut source = open_source(path, None, false, false)?;
    let mut dictionary = Dictionary::new(1);
    let mut sink = JsonOutputHandler::new(out);
    let mut handler = DictRecordHandler::new(&mut dictionary, &mut sink);
    RecordParser::new(source.as_mut(), &mut handler).parse_stream()
}
