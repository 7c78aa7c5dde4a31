//! The index entry record (§3 "Index entry") and its `type` tag, shared by
//! the indexer, version codec, and tree cache.

use camino::Utf8PathBuf;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::HoardError;
use crate::multihash::MultihashId;
use crate::posix::Permissions;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Unknown,
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryType::File => "file",
            EntryType::Directory => "directory",
            EntryType::Symlink => "symlink",
            EntryType::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

/// One row of an index: required `path`/`type`/`permissions`/`modified-at`,
/// optional `size`/`target`/`content-id`/`coded-id` depending on `kind`.
///
/// Column order matches §4.5 exactly: `path, type, size, permissions,
/// modified-at, content-id, coded-id, target`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub path: Utf8PathBuf,
    #[serde(rename = "type")]
    pub kind: EntryType,
    pub size: Option<u64>,
    pub permissions: Permissions,
    pub modified_at: Timestamp,
    pub content_id: Option<MultihashId>,
    pub coded_id: Option<MultihashId>,
    pub target: Option<Utf8PathBuf>,
}

impl IndexEntry {
    /// Validates the required-by-type invariants from §3 before a write;
    /// corresponds to the `InvalidIndex` error kind in §7.
    pub fn validate(&self) -> Result<(), HoardError> {
        match self.kind {
            EntryType::File => {
                if self.size.is_none() {
                    return Err(HoardError::InvalidIndex(format!(
                        "{}: file entry missing size",
                        self.path
                    )));
                }
            }
            EntryType::Symlink => {
                if self.target.is_none() {
                    return Err(HoardError::InvalidIndex(format!(
                        "{}: symlink entry missing target",
                        self.path
                    )));
                }
            }
            EntryType::Directory | EntryType::Unknown => {}
        }
        if self.content_id.is_none() && self.coded_id.is_some() {
            return Err(HoardError::InvalidIndex(format!(
                "{}: coded-id present without content-id",
                self.path
            )));
        }
        Ok(())
    }
}

impl serde::Serialize for Permissions {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Permissions {
    fn deserialize<D>(deserializer: D) -> Result<Permissions, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|e| serde::de::Error::custom(format!("bad permissions {s:?}: {e}")))
    }
}

impl serde::Serialize for MultihashId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for MultihashId {
    fn deserialize<D>(deserializer: D) -> Result<MultihashId, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|e| serde::de::Error::custom(format!("bad multihash {s:?}: {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn file_without_size_is_invalid() {
        let e = IndexEntry {
            path: "a".into(),
            kind: EntryType::File,
            size: None,
            permissions: Permissions::from_mode(0o644),
            modified_at: Timestamp::UNIX_EPOCH,
            content_id: None,
            coded_id: None,
            target: None,
        };
        assert!(e.validate().is_err());
    }

    #[test]
    fn coded_id_without_content_id_is_invalid() {
        let e = IndexEntry {
            path: "a".into(),
            kind: EntryType::Directory,
            size: None,
            permissions: Permissions::from_mode(0o755),
            modified_at: Timestamp::UNIX_EPOCH,
            content_id: None,
            coded_id: Some(MultihashId::hash(b"x")),
            target: None,
        };
        assert!(e.validate().is_err());
    }
}
