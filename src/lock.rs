//! Advisory exclusive locking for a working tree's `.hoard/lock` file
//! (§5 "Shared resources": only one snapshot per working tree may run at a
//! time; a held lock fails fast rather than blocking forever). Grounded on
//! the file-locking example's `flock`-based exclusive-lock pattern,
//! rebuilt on `rustix::fs::flock` since `rustix` (fs feature) is already
//! on the dependency stack for POSIX syscalls elsewhere in this crate.

use std::fs::{File, OpenOptions};

use camino::Utf8Path;
use rustix::fs::{flock, FlockOperation};

use crate::error::HoardError;

/// Holds an exclusive, non-blocking `flock` on a working tree's lock file
/// for as long as it's alive. Released automatically on drop.
pub struct WorkingTreeLock {
    file: File,
    path: String,
}

impl WorkingTreeLock {
    /// Acquires the exclusive lock for `hoard_dir`'s `lock` file, creating
    /// it if necessary. Fails immediately, rather than blocking, if another
    /// process already holds it.
    pub fn acquire(hoard_dir: &Utf8Path) -> Result<Self, HoardError> {
        let path = hoard_dir.join("lock");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path.as_std_path())?;

        flock(&file, FlockOperation::NonBlockingLockExclusive)
            .map_err(|_| HoardError::Locked(path.to_string()))?;

        Ok(Self {
            file,
            path: path.to_string(),
        })
    }
}

impl Drop for WorkingTreeLock {
    fn drop(&mut self) {
        let _ = flock(&self.file, FlockOperation::Unlock);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let first = WorkingTreeLock::acquire(root).unwrap();
        let second = WorkingTreeLock::acquire(root);
        assert!(second.is_err());
        drop(first);

        WorkingTreeLock::acquire(root).unwrap();
    }
}
