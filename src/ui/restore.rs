//! `hoard restore`: materializes a stored version's files into a
//! destination directory. Grounded on the teacher's `ui/restore.rs`
//! (`run(repository, args)` walking a snapshot's tree and writing it out),
//! generalized from the teacher's object-store tree walk to this project's
//! flat index entries and §4.4's per-type restore rules. No ignore rules
//! apply here -- restore works purely off a version's own manifest.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use tracing::warn;

use crate::config;
use crate::entry::EntryType;
use crate::file_util::safe_write_bytes;
use crate::posix;
use crate::ui::open_backends;
use crate::version_codec;
use crate::version_id::VersionId;

/// Restores a stored version's files into a destination directory.
#[derive(Debug, Parser)]
pub struct Args {
    archive: String,
    version: VersionId,

    /// Directory to restore into; created if missing.
    #[arg(default_value = ".")]
    destination: Utf8PathBuf,
}

pub fn run(repository: &Utf8Path, args: Args) -> Result<()> {
    let config = config::resolve_user_only(&args.archive)?;
    let backends = open_backends(repository, &config)?;

    let ciphertext = backends
        .versions
        .read_version(&args.archive, &args.version)?
        .with_context(|| format!("no version {} in archive {:?}", args.version, args.archive))?;
    let (mut entries, _stats) =
        version_codec::decode(&ciphertext, &config.decode_command, config.timeout())?;

    std::fs::create_dir_all(&args.destination)
        .with_context(|| format!("couldn't create {}", args.destination))?;

    // Directories first, so files and symlinks can be written into them.
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    let (dirs, rest): (Vec<_>, Vec<_>) = entries
        .into_iter()
        .partition(|e| e.kind == EntryType::Directory);

    for entry in &dirs {
        let target = args.destination.join(&entry.path);
        std::fs::create_dir_all(&target).with_context(|| format!("couldn't create {target}"))?;
    }

    for entry in &rest {
        let target = args.destination.join(&entry.path);
        match entry.kind {
            EntryType::File => {
                let bytes = match entry.coded_id {
                    Some(coded_id) => {
                        let encoded = backends
                            .blocks
                            .get(&coded_id)?
                            .with_context(|| format!("{}: block {coded_id} is missing", entry.path))?;
                        let (decoded, _) =
                            crate::pipe::run(&config.decode_command, &encoded, config.timeout())?;
                        decoded
                    }
                    None => Vec::new(),
                };
                safe_write_bytes(&target, &bytes)
                    .with_context(|| format!("couldn't restore {target}"))?;
                posix::set_permissions(&target, entry.permissions)?;
                posix::set_modified(&target, entry.modified_at)?;
            }
            EntryType::Symlink => {
                let link_target = entry
                    .target
                    .as_ref()
                    .with_context(|| format!("{}: symlink entry missing target", entry.path))?;
                if target.exists() || target.is_symlink() {
                    std::fs::remove_file(&target).ok();
                }
                std::os::unix::fs::symlink(link_target, &target)
                    .with_context(|| format!("couldn't restore symlink {target}"))?;
                posix::set_permissions(&target, entry.permissions)?;
            }
            EntryType::Directory => unreachable!("directories restored in the earlier pass"),
            EntryType::Unknown => {
                warn!("skipping {}: unsupported file type", entry.path);
            }
        }
    }

    for entry in dirs.iter().rev() {
        let target = args.destination.join(&entry.path);
        posix::set_permissions(&target, entry.permissions)?;
        posix::set_modified(&target, entry.modified_at)?;
    }

    println!(
        "restored version {} of {:?} into {}",
        args.version, args.archive, args.destination
    );
    Ok(())
}
