//! Turns a tree walk into a deterministic, sorted index (§4.4). Grounded on
//! the teacher's `ui/backup.rs::backup_tree` (cache-consultation-then-hash
//! loop driven off a walk closure) and `fs_tree.rs::file_changed` (the
//! size/mtime cache-hit test), generalized from chunked-file hashing to
//! whole-file SHA2-256 hashing and from a content tree to a flat index.

use std::collections::HashMap;
use std::fs::File;

use camino::Utf8Path;
use tracing::debug;

use crate::cache::{CacheEntry, TreeCache};
use crate::counters::{self, Op};
use crate::entry::{EntryType, IndexEntry};
use crate::error::HoardError;
use crate::ignore::IgnoreMatcher;
use crate::multihash::{HashingReader, MultihashId};
use crate::posix::FileStat;
use crate::progress::CurrentPath;

/// Folds a sequence of prior versions' entries into a `content-id ->
/// coded-id` lookup. `versions` must be ordered oldest to newest (§4.4:
/// "duplicates from newer versions win", which falls out of later entries
/// simply overwriting earlier ones in the fold).
pub fn fold_coded_lookup<'a>(
    versions: impl IntoIterator<Item = &'a [IndexEntry]>,
) -> HashMap<MultihashId, MultihashId> {
    let mut lookup = HashMap::new();
    for version in versions {
        for entry in version {
            if let (Some(content_id), Some(coded_id)) = (entry.content_id, entry.coded_id) {
                lookup.insert(content_id, coded_id);
            }
        }
    }
    lookup
}

/// Builds a sorted index for `root`, consulting `loaded_cache` for
/// mtime/size hits and `coded_lookup` to speculatively attach a `coded-id`
/// to any entry whose `content-id` already has one in a recent version.
/// Returns the index and the rebuilt cache (callers persist it via
/// [`TreeCache::save_if_changed`] against `loaded_cache`).
pub fn build_index(
    root: &Utf8Path,
    ignore: &IgnoreMatcher,
    loaded_cache: &TreeCache,
    coded_lookup: &HashMap<MultihashId, MultihashId>,
    current: &CurrentPath,
) -> Result<(Vec<IndexEntry>, TreeCache), HoardError> {
    let mut stats = Vec::new();
    crate::walk::walk(root, ignore, &mut |stat| stats.push(stat));

    // The root itself is always produced first by the walker; the index
    // doesn't carry an entry for it.
    if !stats.is_empty() {
        stats.remove(0);
    }

    let mut entries = Vec::with_capacity(stats.len());
    let mut fresh_cache = TreeCache::new();

    for stat in stats {
        current.set(stat.path());
        let entry = stat_to_entry(root, stat, loaded_cache, coded_lookup, &mut fresh_cache)?;
        entries.push(entry);
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("indexed {} entries under {root}", entries.len());

    Ok((entries, fresh_cache))
}

fn stat_to_entry(
    root: &Utf8Path,
    stat: FileStat,
    loaded_cache: &TreeCache,
    coded_lookup: &HashMap<MultihashId, MultihashId>,
    fresh_cache: &mut TreeCache,
) -> Result<IndexEntry, HoardError> {
    let path = stat.path().to_owned();

    let (kind, size, permissions, modified_at, target) = match stat {
        FileStat::File {
            size,
            permissions,
            modified_at,
            ..
        } => (EntryType::File, Some(size), permissions, modified_at, None),
        FileStat::Directory {
            permissions,
            modified_at,
            ..
        } => (EntryType::Directory, None, permissions, modified_at, None),
        FileStat::Symlink {
            target,
            permissions,
            modified_at,
            ..
        } => (
            EntryType::Symlink,
            None,
            permissions,
            modified_at,
            Some(target),
        ),
        FileStat::Unknown { .. } => {
            return Ok(IndexEntry {
                path,
                kind: EntryType::Unknown,
                size: None,
                permissions: crate::posix::Permissions::from_mode(0),
                modified_at: jiff::Timestamp::UNIX_EPOCH,
                content_id: None,
                coded_id: None,
                target: None,
            });
        }
    };

    // Only regular files with nonzero size get a content identity (§4.4).
    let content_id = if kind == EntryType::File && size.unwrap_or(0) > 0 {
        Some(content_id_for(root, &path, size.unwrap(), modified_at, loaded_cache, fresh_cache)?)
    } else {
        None
    };

    let coded_id = content_id.and_then(|cid| coded_lookup.get(&cid).copied());

    Ok(IndexEntry {
        path,
        kind,
        size,
        permissions,
        modified_at,
        content_id,
        coded_id,
        target,
    })
}

/// Resolves the `content-id` for one file: a cache hit if `(size,
/// modified-at)` match what's cached, otherwise a fresh whole-file SHA2-256
/// hash. Either way, records the result into `fresh_cache` so it's ready to
/// replace `loaded_cache` if it ends up different.
fn content_id_for(
    root: &Utf8Path,
    relative_path: &Utf8Path,
    size: u64,
    modified_at: jiff::Timestamp,
    loaded_cache: &TreeCache,
    fresh_cache: &mut TreeCache,
) -> Result<MultihashId, HoardError> {
    if let Some(cached) = loaded_cache.get(relative_path) {
        if cached.size == size && cached.modified_at == modified_at {
            counters::bump(Op::TreeCacheHit);
            fresh_cache.insert(relative_path.to_owned(), *cached);
            return Ok(cached.content_id);
        }
    }
    counters::bump(Op::TreeCacheMiss);

    let absolute = root.join(relative_path);
    let file = File::open(&absolute)?;
    let mut reader = HashingReader::new(file);
    std::io::copy(&mut reader, &mut std::io::sink())?;
    let (content_id, _) = reader.finalize();

    fresh_cache.insert(
        relative_path.to_owned(),
        CacheEntry {
            size,
            modified_at,
            content_id,
        },
    );
    Ok(content_id)
}

#[cfg(test)]
mod test {
    use super::*;
    use camino::Utf8PathBuf;
    use jiff::Timestamp;

    fn entry(path: &str, content_id: Option<MultihashId>, coded_id: Option<MultihashId>) -> IndexEntry {
        IndexEntry {
            path: Utf8PathBuf::from(path),
            kind: EntryType::File,
            size: Some(1),
            permissions: crate::posix::Permissions::from_mode(0o644),
            modified_at: Timestamp::UNIX_EPOCH,
            content_id,
            coded_id,
            target: None,
        }
    }

    #[test]
    fn newer_versions_win_on_coded_lookup_conflicts() {
        let a = MultihashId::hash(b"a");
        let old_coded = MultihashId::hash(b"old");
        let new_coded = MultihashId::hash(b"new");

        let older = vec![entry("x", Some(a), Some(old_coded))];
        let newer = vec![entry("x", Some(a), Some(new_coded))];

        let lookup = fold_coded_lookup([older.as_slice(), newer.as_slice()]);
        assert_eq!(lookup.get(&a), Some(&new_coded));
    }

    #[test]
    fn build_index_hashes_files_and_sorts_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        std::fs::write(root.join("b.txt"), b"second").unwrap();
        std::fs::write(root.join("a.txt"), b"first").unwrap();

        let ignore = IgnoreMatcher::compile(Vec::<String>::new());
        let current = CurrentPath::default();
        let (entries, fresh) = build_index(
            root,
            &ignore,
            &TreeCache::new(),
            &HashMap::new(),
            &current,
        )
        .unwrap();

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
        assert!(entries.iter().all(|e| e.content_id.is_some()));
        assert_ne!(fresh, TreeCache::new());
    }

    #[test]
    fn build_index_reuses_cache_on_unchanged_stat() {
        let dir = tempfile::tempdir().unwrap();
        let root = camino::Utf8Path::from_path(dir.path()).unwrap();
        let file = root.join("a.txt");
        std::fs::write(&file, b"content").unwrap();

        let ignore = IgnoreMatcher::compile(Vec::<String>::new());
        let current = CurrentPath::default();
        let (first, cache) =
            build_index(root, &ignore, &TreeCache::new(), &HashMap::new(), &current).unwrap();

        let (second, _) = build_index(root, &ignore, &cache, &HashMap::new(), &current).unwrap();
        assert_eq!(first[0].content_id, second[0].content_id);
    }
}
