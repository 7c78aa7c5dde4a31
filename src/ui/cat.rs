//! `hoard cat`: dumps a stored version's index in its plaintext TSV form,
//! for debugging. Grounded on the teacher's `ui/cat.rs` subcommand (the
//! debug-inspection role), generalized from its per-object-kind subcommand
//! to this project's single version-index shape.

use anyhow::{Context, Result};
use camino::Utf8Path;
use clap::Parser;

use crate::config;
use crate::ui::open_backends;
use crate::version_codec;
use crate::version_id::VersionId;

/// Prints one stored version's index.
#[derive(Debug, Parser)]
pub struct Args {
    archive: String,
    version: VersionId,
}

pub fn run(repository: &Utf8Path, args: Args) -> Result<()> {
    let config = config::resolve_user_only(&args.archive)?;
    let backends = open_backends(repository, &config)?;

    let ciphertext = backends
        .versions
        .read_version(&args.archive, &args.version)?
        .with_context(|| format!("no version {} in archive {:?}", args.version, args.archive))?;
    let (entries, _stats) =
        version_codec::decode(&ciphertext, &config.decode_command, config.timeout())?;

    let mut out = Vec::new();
    version_codec::write_plain(&mut out, &entries)?;
    print!("{}", String::from_utf8_lossy(&out));
    Ok(())
}
