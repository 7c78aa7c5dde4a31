//! `hoard versions`: lists archives and the versions stored for them.
//! Grounded on the teacher's `ui/snapshots.rs` listing shape, generalized
//! from a single repository's snapshots to this project's multi-archive
//! `VersionStore::list_archives`.

use anyhow::Result;
use camino::Utf8Path;
use clap::Parser;

use crate::config;
use crate::progress::nice_size;
use crate::ui::open_backends;

/// Lists archives (optionally filtered by a substring of their name) and
/// each one's stored versions.
#[derive(Debug, Parser)]
pub struct Args {
    /// Only list archives whose name contains this substring.
    query: Option<String>,
}

pub fn run(repository: &Utf8Path, args: Args) -> Result<()> {
    let config = config::resolve_defaults()?;
    let backends = open_backends(repository, &config)?;

    for archive in backends.versions.list_archives(args.query.as_deref())? {
        println!("{}", archive.name);
        for version in &archive.versions {
            println!("  {}  {}", version.id, nice_size(version.size));
        }
    }
    Ok(())
}
