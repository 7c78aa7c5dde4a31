//! The two storage collaborators the core consumes (§6): a content-
//! addressed `BlockStore` and a per-archive `VersionStore`. Grounded on the
//! teacher's single `Backend` trait (one `read`/`write`/`list` surface
//! implemented per storage kind), split into two traits here because
//! blocks and versions are addressed differently -- by content hash versus
//! by archive name + version id -- and only the version side needs listing
//! and per-archive metadata.

use std::io::Read;

use jiff::Timestamp;

use crate::error::HoardError;
use crate::multihash::MultihashId;
use crate::version_id::VersionId;

pub mod fs;
pub mod memory;

/// Content-addressed block storage. Implementations assign the id
/// themselves by hashing what's put; callers never choose it.
pub trait BlockStore {
    /// Reads the full contents of `id`, or `None` if absent.
    fn get(&self, id: &MultihashId) -> Result<Option<Vec<u8>>, HoardError>;

    /// Existence query: which of `ids` does the store already have?
    /// A failed query should be treated by the caller as "none present"
    /// (§7's recovery policy), not propagated as a hard error where
    /// avoidable -- but the trait itself still reports what happened.
    fn get_batch(&self, ids: &[MultihashId]) -> Result<std::collections::HashSet<MultihashId>, HoardError>;

    /// Stores `reader`'s bytes and returns the content address assigned to
    /// them. Storing the same bytes twice returns the same id.
    fn put(&self, reader: &mut dyn Read) -> Result<MultihashId, HoardError>;
}

#[derive(Debug, Clone)]
pub struct VersionListing {
    pub id: VersionId,
    pub size: u64,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct ArchiveListing {
    pub name: String,
    pub versions: Vec<VersionListing>,
}

#[derive(Debug, Clone)]
pub struct ArchiveMeta {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct VersionMeta {
    pub id: VersionId,
    pub size: u64,
    pub created_at: Timestamp,
}

/// Per-archive named version storage.
pub trait VersionStore {
    /// Lists archives (optionally filtered by a substring of their name)
    /// along with each of their versions.
    fn list_archives(&self, query: Option<&str>) -> Result<Vec<ArchiveListing>, HoardError>;

    fn get_archive(&self, name: &str) -> Result<Option<ArchiveMeta>, HoardError>;

    fn stat_version(&self, archive: &str, id: &VersionId) -> Result<Option<VersionMeta>, HoardError>;

    /// Reads the encoded, gzipped bytes of a stored version, or `None` if
    /// it doesn't exist.
    fn read_version(&self, archive: &str, id: &VersionId) -> Result<Option<Vec<u8>>, HoardError>;

    /// Stores the encoded, gzipped bytes of a version under `id`. Fails
    /// with `ReservedName` if `id`'s text is `"config"`.
    fn store_version(
        &self,
        archive: &str,
        id: &VersionId,
        reader: &mut dyn Read,
    ) -> Result<VersionMeta, HoardError>;

    fn remove_version(&self, archive: &str, id: &VersionId) -> Result<bool, HoardError>;
}
