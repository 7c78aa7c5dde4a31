//! In-memory `BlockStore`/`VersionStore`, for tests. Grounded on the
//! teacher's `MemoryBackend` (a `HashMap<String, Vec<u8>>` standing in for
//! a real backend).

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::Mutex;

use jiff::Timestamp;

use crate::backend::{ArchiveListing, ArchiveMeta, BlockStore, VersionListing, VersionMeta, VersionStore};
use crate::error::HoardError;
use crate::multihash::MultihashId;
use crate::version_id::VersionId;

#[derive(Default)]
pub struct MemoryBlockStore {
    blocks: Mutex<HashMap<MultihashId, Vec<u8>>>,
}

impl BlockStore for MemoryBlockStore {
    fn get(&self, id: &MultihashId) -> Result<Option<Vec<u8>>, HoardError> {
        Ok(self.blocks.lock().unwrap().get(id).cloned())
    }

    fn get_batch(&self, ids: &[MultihashId]) -> Result<HashSet<MultihashId>, HoardError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(ids.iter().filter(|id| blocks.contains_key(*id)).copied().collect())
    }

    fn put(&self, reader: &mut dyn Read) -> Result<MultihashId, HoardError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let id = MultihashId::hash(&buf);
        self.blocks.lock().unwrap().insert(id, buf);
        Ok(id)
    }
}

#[derive(Default)]
pub struct MemoryVersionStore {
    archives: Mutex<HashMap<String, HashMap<VersionId, (Vec<u8>, Timestamp)>>>,
}

impl VersionStore for MemoryVersionStore {
    fn list_archives(&self, query: Option<&str>) -> Result<Vec<ArchiveListing>, HoardError> {
        let archives = self.archives.lock().unwrap();
        Ok(archives
            .iter()
            .filter(|(name, _)| query.map_or(true, |q| name.contains(q)))
            .map(|(name, versions)| ArchiveListing {
                name: name.clone(),
                versions: versions
                    .iter()
                    .map(|(id, (bytes, created_at))| VersionListing {
                        id: *id,
                        size: bytes.len() as u64,
                        created_at: *created_at,
                    })
                    .collect(),
            })
            .collect())
    }

    fn get_archive(&self, name: &str) -> Result<Option<ArchiveMeta>, HoardError> {
        Ok(self
            .archives
            .lock()
            .unwrap()
            .contains_key(name)
            .then(|| ArchiveMeta { name: name.to_string() }))
    }

    fn stat_version(&self, archive: &str, id: &VersionId) -> Result<Option<VersionMeta>, HoardError> {
        Ok(self.archives.lock().unwrap().get(archive).and_then(|versions| {
            versions.get(id).map(|(bytes, created_at)| VersionMeta {
                id: *id,
                size: bytes.len() as u64,
                created_at: *created_at,
            })
        }))
    }

    fn read_version(&self, archive: &str, id: &VersionId) -> Result<Option<Vec<u8>>, HoardError> {
        Ok(self
            .archives
            .lock()
            .unwrap()
            .get(archive)
            .and_then(|versions| versions.get(id).map(|(bytes, _)| bytes.clone())))
    }

    fn store_version(
        &self,
        archive: &str,
        id: &VersionId,
        reader: &mut dyn Read,
    ) -> Result<VersionMeta, HoardError> {
        if id.as_str() == "config" {
            return Err(HoardError::ReservedName(id.as_str().to_string()));
        }
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        let created_at = id.instant()?;
        let size = buf.len() as u64;
        self.archives
            .lock()
            .unwrap()
            .entry(archive.to_string())
            .or_default()
            .insert(*id, (buf, created_at));
        Ok(VersionMeta { id: *id, size, created_at })
    }

    fn remove_version(&self, archive: &str, id: &VersionId) -> Result<bool, HoardError> {
        Ok(self
            .archives
            .lock()
            .unwrap()
            .get_mut(archive)
            .map(|versions| versions.remove(id).is_some())
            .unwrap_or(false))
    }
}
