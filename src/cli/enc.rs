//! `au enc` / `au json2au` — JSON to au conversion.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};

use crate::cli::args::EncArgs;
use crate::displaylevel;
use crate::encoder::EncoderConfig;
use crate::json::encode_json_stream;

pub fn run(args: &EncArgs) -> anyhow::Result<i32> {
    let input: Box<dyn Read> = if args.input == "-" {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(&args.input)?))
    };
    let output: Box<dyn Write> = if args.output == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        Box::new(BufWriter::new(File::create(&args.output)?))
    };

    let name = if args.input == "-" {
        "<stdin>"
    } else {
        args.input.as_str()
    };
    let config = EncoderConfig::default()
        .with_metadata(format!("Encoded from json file {name} by au"));
    let count = encode_json_stream(input, output, args.count, config)?;
    displaylevel!(3, "{count} records encoded\n");
    Ok(0)
}
