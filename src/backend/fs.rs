//! Filesystem-backed `BlockStore`/`VersionStore` (§6 layout):
//!
//! ```text
//! root/
//!   archive/<name>/config          (plaintext)
//!   archive/<name>/<version-id>    (encoded, gzipped TSV)
//!   data/meta.properties
//!   data/blocks/<prefix>/<id>      (content-addressed)
//! ```
//!
//! Grounded on the teacher's `FilesystemBackend` (bucket directories keyed
//! by a hex prefix, created lazily here rather than all 256 up front --
//! every id this crate produces starts with the same multihash code, so
//! pre-allocating 256 buckets the way the teacher does for its raw digests
//! would just make 255 of them permanently empty).

use std::collections::HashSet;
use std::fs;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};

use crate::backend::{ArchiveListing, ArchiveMeta, BlockStore, VersionListing, VersionMeta, VersionStore};
use crate::error::HoardError;
use crate::file_util::safe_write_bytes;
use crate::multihash::MultihashId;
use crate::version_id::VersionId;

const RESERVED_ARCHIVE_FILE: &str = "config";

pub struct FilesystemBlockStore {
    blocks_dir: Utf8PathBuf,
}

impl FilesystemBlockStore {
    pub fn open(data_dir: &Utf8Path) -> Result<Self, HoardError> {
        let blocks_dir = data_dir.join("blocks");
        fs::create_dir_all(&blocks_dir)?;
        Ok(Self { blocks_dir })
    }

    fn path_for(&self, id: &MultihashId) -> Utf8PathBuf {
        let text = id.to_string();
        let prefix = &text[..2.min(text.len())];
        self.blocks_dir.join(prefix).join(text)
    }
}

impl BlockStore for FilesystemBlockStore {
    fn get(&self, id: &MultihashId) -> Result<Option<Vec<u8>>, HoardError> {
        match fs::read(self.path_for(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_batch(&self, ids: &[MultihashId]) -> Result<HashSet<MultihashId>, HoardError> {
        Ok(ids
            .iter()
            .filter(|id| self.path_for(id).exists())
            .copied()
            .collect())
    }

    fn put(&self, reader: &mut dyn Read) -> Result<MultihashId, HoardError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let id = MultihashId::hash(&buf);
        let path = self.path_for(&id);
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            safe_write_bytes(&path, &buf)?;
        }
        Ok(id)
    }
}

pub struct FilesystemVersionStore {
    archive_dir: Utf8PathBuf,
}

impl FilesystemVersionStore {
    pub fn open(root: &Utf8Path) -> Result<Self, HoardError> {
        let archive_dir = root.join("archive");
        fs::create_dir_all(&archive_dir)?;
        Ok(Self { archive_dir })
    }

    fn version_path(&self, archive: &str, id: &VersionId) -> Utf8PathBuf {
        self.archive_dir.join(archive).join(id.as_str())
    }
}

impl VersionStore for FilesystemVersionStore {
    fn list_archives(&self, query: Option<&str>) -> Result<Vec<ArchiveListing>, HoardError> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.archive_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if query.is_some_and(|q| !name.contains(q)) {
                continue;
            }
            let versions = self.versions_in(&name)?;
            out.push(ArchiveListing { name, versions });
        }
        Ok(out)
    }

    fn get_archive(&self, name: &str) -> Result<Option<ArchiveMeta>, HoardError> {
        Ok(self
            .archive_dir
            .join(name)
            .is_dir()
            .then(|| ArchiveMeta { name: name.to_string() }))
    }

    fn stat_version(&self, archive: &str, id: &VersionId) -> Result<Option<VersionMeta>, HoardError> {
        match fs::metadata(self.version_path(archive, id)) {
            Ok(meta) => Ok(Some(VersionMeta {
                id: *id,
                size: meta.len(),
                created_at: id.instant()?,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn read_version(&self, archive: &str, id: &VersionId) -> Result<Option<Vec<u8>>, HoardError> {
        match fs::read(self.version_path(archive, id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store_version(
        &self,
        archive: &str,
        id: &VersionId,
        reader: &mut dyn Read,
    ) -> Result<VersionMeta, HoardError> {
        if id.as_str() == RESERVED_ARCHIVE_FILE {
            return Err(HoardError::ReservedName(id.as_str().to_string()));
        }
        let dir = self.archive_dir.join(archive);
        fs::create_dir_all(&dir)?;

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let size = buf.len() as u64;
        safe_write_bytes(&self.version_path(archive, id), &buf)?;

        Ok(VersionMeta {
            id: *id,
            size,
            created_at: id.instant()?,
        })
    }

    fn remove_version(&self, archive: &str, id: &VersionId) -> Result<bool, HoardError> {
        match fs::remove_file(self.version_path(archive, id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl FilesystemVersionStore {
    fn versions_in(&self, archive: &str) -> Result<Vec<VersionListing>, HoardError> {
        let dir = self.archive_dir.join(archive);
        let mut out = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == RESERVED_ARCHIVE_FILE {
                continue;
            }
            let Ok(id) = name.parse::<VersionId>() else {
                continue;
            };
            let size = entry.metadata()?.len();
            let created_at = id.instant()?;
            out.push(VersionListing { id, size, created_at });
        }
        out.sort_by_key(|v| v.id);
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use jiff::Timestamp;

    #[test]
    fn block_put_get_and_batch() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = Utf8Path::from_path(dir.path()).unwrap();
        let store = FilesystemBlockStore::open(data_dir).unwrap();

        let id = store.put(&mut b"payload".as_slice()).unwrap();
        assert_eq!(store.get(&id).unwrap(), Some(b"payload".to_vec()));

        let absent = MultihashId::hash(b"nope");
        let found = store.get_batch(&[id, absent]).unwrap();
        assert!(found.contains(&id));
        assert!(!found.contains(&absent));
    }

    #[test]
    fn version_store_roundtrip_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let store = FilesystemVersionStore::open(root).unwrap();

        let id = VersionId::generate(Timestamp::UNIX_EPOCH);
        store.store_version("mytree", &id, &mut b"abc".as_slice()).unwrap();

        let stat = store.stat_version("mytree", &id).unwrap().unwrap();
        assert_eq!(stat.size, 3);

        let listing = store.list_archives(None).unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].versions.len(), 1);

        assert!(store.remove_version("mytree", &id).unwrap());
        assert!(store.stat_version("mytree", &id).unwrap().is_none());
    }

    #[test]
    fn config_name_is_reserved_and_excluded_from_listing() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let store = FilesystemVersionStore::open(root).unwrap();
        fs::create_dir_all(root.join("archive/mytree")).unwrap();
        fs::write(root.join("archive/mytree/config"), b"type=file\n").unwrap();

        let listing = store.list_archives(None).unwrap();
        assert_eq!(listing[0].versions.len(), 0);
    }
}
