//! CLI subcommands. Grounded on the teacher's `ui::*::run(repository,
//! args)` convention (`ui/backup.rs`, `ui/ls.rs`, `ui/init.rs`) and its
//! `clap::Parser`-derived per-command `Args` structs.

pub mod cat;
pub mod init;
pub mod restore;
pub mod snapshot;
pub mod versions;

use anyhow::{Context, Result};
use camino::Utf8Path;

use crate::backend::fs::{FilesystemBlockStore, FilesystemVersionStore};
use crate::backend::memory::{MemoryBlockStore, MemoryVersionStore};
use crate::backend::{BlockStore, VersionStore};
use crate::config::{BackendType, RepositoryConfig};

/// The two storage collaborators a command needs, opened per the resolved
/// configuration.
pub struct Backends {
    pub blocks: Box<dyn BlockStore>,
    pub versions: Box<dyn VersionStore>,
}

/// Opens the block/version store named by `config`. `repository_root` is
/// only consulted for the filesystem backend; a `memory` backend starts
/// fresh and empty every invocation, useful for tests and demos but not
/// for real repeated snapshots.
pub fn open_backends(repository_root: &Utf8Path, config: &RepositoryConfig) -> Result<Backends> {
    match config.backend {
        BackendType::File => {
            let data_dir = repository_root.join("data");
            let blocks = FilesystemBlockStore::open(&data_dir).context("opening block store")?;
            let versions =
                FilesystemVersionStore::open(repository_root).context("opening version store")?;
            Ok(Backends {
                blocks: Box::new(blocks),
                versions: Box::new(versions),
            })
        }
        BackendType::Memory => Ok(Backends {
            blocks: Box::new(MemoryBlockStore::default()),
            versions: Box::new(MemoryVersionStore::default()),
        }),
    }
}
