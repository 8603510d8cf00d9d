//! `au zindex` — build the gzip random-access index.

use crate::cli::args::ZindexArgs;
use crate::zindex::{build_index, DEFAULT_INDEX_EVERY};

pub fn run(args: &ZindexArgs) -> anyhow::Result<i32> {
    build_index(&args.path, args.index.as_deref(), DEFAULT_INDEX_EVERY)?;
    Ok(0)
}
