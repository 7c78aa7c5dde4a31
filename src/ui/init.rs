//! `hoard init`: creates a new working tree. Grounded on the teacher's
//! `ui/init.rs` (`run(repository)` one-liner over `backend::initialize`).

use anyhow::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use jiff::Timestamp;

use crate::archive;

/// Initializes the current (or given) directory as a new working tree.
#[derive(Debug, Parser)]
pub struct Args {
    /// Directory to initialize.
    #[arg(default_value = ".")]
    path: Utf8PathBuf,

    /// Name of the archive this tree backs up to.
    #[arg(long)]
    name: String,
}

pub fn run(args: Args) -> Result<()> {
    let created = archive::init(&args.path, &args.name, Timestamp::now())?;
    println!("initialized {} as archive {:?}", created.root, created.name);
    Ok(())
}
