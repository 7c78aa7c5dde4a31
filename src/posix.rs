//! POSIX permission bitmask, symlink-aware stat, and the file-stat tagged
//! variant (§3 "File stat") that everything downstream of the walker
//! operates on.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;

/// A 9-bit POSIX permission mask, OWNER_READ as the high bit, matching
/// `st_mode & 0o777`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Permissions(u16);

impl Permissions {
    pub fn from_mode(mode: u32) -> Self {
        Self((mode & 0o777) as u16)
    }

    pub fn bits(self) -> u16 {
        self.0
    }
}

impl std::fmt::Display for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

impl std::str::FromStr for Permissions {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u16::from_str_radix(s, 8)?))
    }
}

/// One entry produced by the tree walker: `File | Directory | Symlink |
/// Unknown`, each carrying the fields the distilled spec names for it.
#[derive(Debug, Clone)]
pub enum FileStat {
    File {
        path: Utf8PathBuf,
        size: u64,
        permissions: Permissions,
        modified_at: Timestamp,
    },
    Directory {
        path: Utf8PathBuf,
        permissions: Permissions,
        modified_at: Timestamp,
    },
    Symlink {
        path: Utf8PathBuf,
        target: Utf8PathBuf,
        permissions: Permissions,
        modified_at: Timestamp,
    },
    Unknown {
        path: Utf8PathBuf,
    },
}

impl FileStat {
    pub fn path(&self) -> &Utf8Path {
        match self {
            FileStat::File { path, .. } => path,
            FileStat::Directory { path, .. } => path,
            FileStat::Symlink { path, .. } => path,
            FileStat::Unknown { path } => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FileStat::Directory { .. })
    }

    pub fn is_regular_file(&self) -> bool {
        matches!(self, FileStat::File { .. })
    }

    pub fn size(&self) -> Option<u64> {
        match self {
            FileStat::File { size, .. } => Some(*size),
            _ => None,
        }
    }

    pub fn modified_at(&self) -> Option<Timestamp> {
        match self {
            FileStat::File { modified_at, .. } => Some(*modified_at),
            FileStat::Directory { modified_at, .. } => Some(*modified_at),
            FileStat::Symlink { modified_at, .. } => Some(*modified_at),
            FileStat::Unknown { .. } => None,
        }
    }
}

/// Stat `absolute_path` without following symlinks and express it relative
/// to `root` (§3: "`path` is recorded *relative* to the working root").
///
/// Never descends into a symlink's target even when that target is itself
/// a directory -- that decision belongs to the walker, but the distinction
/// between "symlink" and "directory" has to survive the stat step for the
/// walker to make it.
pub fn stat_relative(root: &Utf8Path, absolute_path: &Utf8Path) -> Result<FileStat> {
    let relative = absolute_path
        .strip_prefix(root)
        .unwrap_or(absolute_path)
        .to_path_buf();

    let meta = fs::symlink_metadata(absolute_path)
        .with_context(|| format!("couldn't stat {absolute_path}"))?;

    let modified_at = meta
        .modified()
        .ok()
        .and_then(|t| Timestamp::try_from(t).ok());

    let file_type = meta.file_type();
    if file_type.is_symlink() {
        let target = fs::read_link(absolute_path)
            .with_context(|| format!("couldn't read symlink {absolute_path}"))?;
        let target = Utf8PathBuf::try_from(target)
            .with_context(|| format!("symlink target of {absolute_path} isn't UTF-8"))?;
        Ok(FileStat::Symlink {
            path: relative,
            target,
            permissions: Permissions::from_mode(meta.permissions().mode()),
            modified_at: modified_at.unwrap_or(Timestamp::UNIX_EPOCH),
        })
    } else if file_type.is_dir() {
        Ok(FileStat::Directory {
            path: relative,
            permissions: Permissions::from_mode(meta.permissions().mode()),
            modified_at: modified_at.unwrap_or(Timestamp::UNIX_EPOCH),
        })
    } else if file_type.is_file() {
        Ok(FileStat::File {
            path: relative,
            size: meta.size(),
            permissions: Permissions::from_mode(meta.permissions().mode()),
            modified_at: modified_at.unwrap_or(Timestamp::UNIX_EPOCH),
        })
    } else {
        Ok(FileStat::Unknown { path: relative })
    }
}

/// Canonicalize a path the way archive roots are required to be
/// (§3 "Archive": "`root` is absolute and canonical").
pub fn canonicalize(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let canon = fs::canonicalize(path).with_context(|| format!("couldn't canonicalize {path}"))?;
    Utf8PathBuf::try_from(canon).with_context(|| format!("{path} canonicalizes to non-UTF-8"))
}

/// Restores a path's POSIX permission bits, for restore.
pub fn set_permissions(path: &Utf8Path, permissions: Permissions) -> Result<()> {
    let mode = fs::Permissions::from_mode(permissions.bits() as u32);
    fs::set_permissions(path, mode).with_context(|| format!("couldn't set permissions on {path}"))
}

/// Restores a path's modification time without following symlinks -- the
/// syscall `rustix`'s `fs` feature is pulled in for.
pub fn set_modified(path: &Utf8Path, modified_at: Timestamp) -> Result<()> {
    let ts = rustix::fs::Timespec {
        tv_sec: modified_at.as_second(),
        tv_nsec: modified_at.subsec_nanosecond() as i64,
    };
    let times = rustix::fs::Timestamps {
        last_access: ts,
        last_modification: ts,
    };
    rustix::fs::utimensat(
        rustix::fs::CWD,
        path.as_std_path(),
        &times,
        rustix::fs::AtFlags::SYMLINK_NOFOLLOW,
    )
    .with_context(|| format!("couldn't set mtime on {path}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn permissions_roundtrip() {
        let p = Permissions::from_mode(0o644);
        assert_eq!(p.to_string(), "644");
        assert_eq!("644".parse::<Permissions>().unwrap(), p);
    }

    #[test]
    fn stat_regular_file() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let file = root.join("hello.txt");
        std::fs::write(&file, b"hi\n").unwrap();

        let stat = stat_relative(root, &file).unwrap();
        assert!(stat.is_regular_file());
        assert_eq!(stat.size(), Some(3));
        assert_eq!(stat.path(), Utf8Path::new("hello.txt"));
    }

    #[test]
    fn stat_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let sub = root.join("sub");
        std::fs::create_dir(&sub).unwrap();

        let stat = stat_relative(root, &sub).unwrap();
        assert!(stat.is_directory());
    }

    #[test]
    fn set_permissions_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let file = root.join("hello.txt");
        std::fs::write(&file, b"hi\n").unwrap();

        set_permissions(&file, Permissions::from_mode(0o600)).unwrap();
        let stat = stat_relative(root, &file).unwrap();
        assert_eq!(stat.path(), Utf8Path::new("hello.txt"));
        if let FileStat::File { permissions, .. } = stat {
            assert_eq!(permissions.bits(), 0o600);
        } else {
            panic!("expected a file stat");
        }
    }

    #[test]
    fn set_modified_roundtrips_to_second_precision() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let file = root.join("hello.txt");
        std::fs::write(&file, b"hi\n").unwrap();

        let when = Timestamp::UNIX_EPOCH
            .checked_add(jiff::Span::new().days(1))
            .unwrap();
        set_modified(&file, when).unwrap();

        let stat = stat_relative(root, &file).unwrap();
        assert_eq!(stat.modified_at(), Some(when));
    }
}
