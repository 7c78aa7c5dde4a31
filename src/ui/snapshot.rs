//! `hoard snapshot`: walks the current working tree and stores a new
//! version. Grounded on the teacher's `ui/backup.rs` (`run(repository,
//! args)` discovering the repo, then driving the upload) generalized to
//! this project's `.hoard` working-tree discovery and §4.8's orchestrator.
//!
//! `repository` (the global `--repository` flag) names the *backend* root
//! where blocks and versions are stored -- it is unrelated to the working
//! tree being snapshotted, which is always discovered by walking up from
//! the current directory the way a VCS finds its repository root.

use anyhow::{Context, Result};
use camino::Utf8Path;
use camino::Utf8PathBuf;
use clap::Parser;
use jiff::Timestamp;

use crate::archive;
use crate::config;
use crate::counters;
use crate::lock::WorkingTreeLock;
use crate::orchestrator;
use crate::progress::{self, nice_size, CurrentPath};
use crate::ui::open_backends;

/// Stores a new version of the current working tree.
#[derive(Debug, Parser)]
pub struct Args {}

pub fn run(repository: &Utf8Path, _args: Args) -> Result<()> {
    let now = Timestamp::now();
    let cwd = Utf8PathBuf::try_from(std::env::current_dir().context("couldn't get cwd")?)
        .context("cwd isn't UTF-8")?;
    let root = archive::discover(&cwd)?;
    let tree = archive::open(&root, now)?;
    let config = config::resolve(&tree.hoard_dir(), &tree.name)?;
    let backends = open_backends(repository, &config)?;

    let _lock = WorkingTreeLock::acquire(&tree.hoard_dir())
        .context("another snapshot may already be running against this working tree")?;

    let current = CurrentPath::default();
    let report = progress::report_while(&current, || {
        orchestrator::snapshot(
            &tree,
            &config,
            backends.blocks.as_ref(),
            backends.versions.as_ref(),
            now,
            &current,
        )
    })
    .context("storing new version")?;

    counters::log_counts();

    println!(
        "stored version {} ({} entries, {} blocks stored, {} reused, {})",
        report.id,
        report.entry_count,
        report.blocks_stored,
        report.blocks_reused,
        nice_size(report.version_size),
    );
    Ok(())
}
