//! Persistent `path -> (size, mtime, content-id)` cache (§4.3, §6 "Tree
//! cache file format"), TSV-backed. Grounded on the teacher's read-through
//! `tree::Cache` lifecycle (load once, replace only if changed) and on
//! `src/tsv.rs` for the wire format.

use std::collections::BTreeMap;
use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::HoardError;
use crate::multihash::MultihashId;
use crate::tsv;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CacheRow {
    path: Utf8PathBuf,
    size: Option<u64>,
    modified_at: Option<Timestamp>,
    content_id: Option<MultihashId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub size: u64,
    pub modified_at: Timestamp,
    pub content_id: MultihashId,
}

/// `path -> (size, mtime, content-id)`, sorted by path on save for stable,
/// diffable output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeCache {
    entries: BTreeMap<Utf8PathBuf, CacheEntry>,
}

impl TreeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best-effort load: a missing or unreadable cache yields an empty
    /// cache rather than an error (§7 "cache I/O errors fall back to 'no
    /// cache'").
    pub fn load(path: &Utf8Path) -> Self {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::new(),
            Err(e) => {
                warn!("couldn't read tree cache {path}: {e}; starting with an empty cache");
                return Self::new();
            }
        };

        let rows: Vec<CacheRow> = match tsv::read_rows(bytes.as_slice()) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("couldn't parse tree cache {path}: {e}; starting with an empty cache");
                return Self::new();
            }
        };

        let mut entries = BTreeMap::new();
        for row in rows {
            // Entries with blank cells are dropped (§4.3).
            if let (Some(size), Some(modified_at), Some(content_id)) =
                (row.size, row.modified_at, row.content_id)
            {
                entries.insert(
                    row.path,
                    CacheEntry {
                        size,
                        modified_at,
                        content_id,
                    },
                );
            }
        }
        Self { entries }
    }

    pub fn get(&self, path: &Utf8Path) -> Option<&CacheEntry> {
        self.entries.get(path)
    }

    pub fn insert(&mut self, path: Utf8PathBuf, entry: CacheEntry) {
        self.entries.insert(path, entry);
    }

    /// Writes the cache back only if it differs from `loaded` (§4.3: "only
    /// when the freshly-built cache differs from what was loaded").
    pub fn save_if_changed(&self, path: &Utf8Path, loaded: &TreeCache) -> Result<(), HoardError> {
        if self == loaded {
            debug!("tree cache unchanged; skipping write");
            return Ok(());
        }

        let rows: Vec<CacheRow> = self
            .entries
            .iter()
            .map(|(path, entry)| CacheRow {
                path: path.clone(),
                size: Some(entry.size),
                modified_at: Some(entry.modified_at),
                content_id: Some(entry.content_id),
            })
            .collect();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        crate::file_util::safe_write(path, |w| tsv::write_rows(w, &rows))
    }
}
