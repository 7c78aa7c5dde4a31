//! The `Archive` value object (§3) and `.hoard` control-directory
//! discovery. New; the teacher has no "working tree control directory"
//! concept (its repository *is* the backend root), but this follows the
//! teacher's `backend::open()` factory-function idiom for construction.

use camino::{Utf8Path, Utf8PathBuf};
use jiff::Timestamp;

use crate::error::HoardError;

pub const CONTROL_DIR: &str = ".hoard";

/// A loaded working tree: its canonical root, the name of the archive it
/// backs up to, its ignore rules, and the `.hoard` control directory's
/// subpaths.
#[derive(Debug, Clone)]
pub struct Archive {
    pub name: String,
    pub root: Utf8PathBuf,
    pub created_at: Timestamp,
    pub ignore: Vec<String>,
}

impl Archive {
    pub fn hoard_dir(&self) -> Utf8PathBuf {
        self.root.join(CONTROL_DIR)
    }

    pub fn ignore_file(&self) -> Utf8PathBuf {
        self.hoard_dir().join("ignore")
    }

    pub fn versions_dir(&self) -> Utf8PathBuf {
        self.hoard_dir().join("versions")
    }

    pub fn cache_path(&self) -> Utf8PathBuf {
        self.hoard_dir().join("cache").join("tree")
    }

    /// Compiles this archive's ignore rules (plus the implicit `.hoard`
    /// rule) into a matcher.
    pub fn ignore_matcher(&self) -> crate::ignore::IgnoreMatcher {
        crate::ignore::IgnoreMatcher::compile(self.ignore.iter().cloned())
    }
}

/// Initializes a new working tree at `root`: creates `.hoard/` and its
/// `versions/`/`cache/` subdirectories and an empty `ignore` file, and
/// records `name` as the archive this tree backs up to.
pub fn init(root: &Utf8Path, name: &str, now: Timestamp) -> Result<Archive, HoardError> {
    let root = crate::posix::canonicalize(root).map_err(|e| HoardError::IoError(to_io_error(e)))?;
    let hoard_dir = root.join(CONTROL_DIR);
    if hoard_dir.exists() {
        return Err(HoardError::InvalidIndex(format!(
            "{hoard_dir} already exists"
        )));
    }

    std::fs::create_dir(&hoard_dir)?;
    std::fs::create_dir(hoard_dir.join("versions"))?;
    std::fs::create_dir(hoard_dir.join("cache"))?;
    std::fs::write(hoard_dir.join("ignore"), b"")?;
    crate::file_util::safe_write_bytes(&hoard_dir.join("config"), format!("archive = {name}\n").as_bytes())?;

    Ok(Archive {
        name: name.to_string(),
        root,
        created_at: now,
        ignore: Vec::new(),
    })
}

/// Opens an already-initialized working tree at `root`.
pub fn open(root: &Utf8Path, now: Timestamp) -> Result<Archive, HoardError> {
    let root = crate::posix::canonicalize(root).map_err(|e| HoardError::IoError(to_io_error(e)))?;
    let hoard_dir = root.join(CONTROL_DIR);

    let name = read_archive_name(&hoard_dir)?;

    let ignore_text = std::fs::read_to_string(hoard_dir.join("ignore")).unwrap_or_default();
    let ignore = crate::ignore::parse_rules(&ignore_text);

    Ok(Archive {
        name,
        root,
        created_at: now,
        ignore,
    })
}

/// Walks upward from `start` looking for a `.hoard` directory, the way a
/// version-control tool discovers its repository root.
pub fn discover(start: &Utf8Path) -> Result<Utf8PathBuf, HoardError> {
    let mut dir = crate::posix::canonicalize(start).map_err(|e| HoardError::IoError(to_io_error(e)))?;
    loop {
        if dir.join(CONTROL_DIR).is_dir() {
            return Ok(dir);
        }
        match dir.parent() {
            Some(parent) => dir = parent.to_owned(),
            None => {
                return Err(HoardError::InvalidIndex(format!(
                    "no {CONTROL_DIR} directory found above {start}"
                )));
            }
        }
    }
}

fn to_io_error(e: anyhow::Error) -> std::io::Error {
    std::io::Error::other(e)
}

/// Reads the `archive = <name>` line out of `.hoard/config`'s raw text,
/// ahead of the section-wrapping [`crate::config::resolve`] applies to the
/// rest of that same file -- the name has to be known before a section name
/// can even be formed.
fn read_archive_name(hoard_dir: &Utf8Path) -> Result<String, HoardError> {
    let text = std::fs::read_to_string(hoard_dir.join("config"))?;
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("archive") {
            if let Some(value) = rest.trim_start().strip_prefix('=') {
                return Ok(value.trim().to_string());
            }
        }
    }
    Err(HoardError::InvalidIndex(format!(
        "{hoard_dir}/config is missing its 'archive' key"
    )))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn init_then_open_roundtrips_name_and_ignore() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();

        let created = init(root, "mytree", Timestamp::UNIX_EPOCH).unwrap();
        assert_eq!(created.name, "mytree");

        std::fs::write(created.ignore_file(), "*.log\n# comment\n").unwrap();
        let opened = open(root, Timestamp::UNIX_EPOCH).unwrap();
        assert_eq!(opened.name, "mytree");
        assert_eq!(opened.ignore, vec!["*.log".to_string()]);
    }

    #[test]
    fn discover_walks_up_to_the_control_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        init(root, "mytree", Timestamp::UNIX_EPOCH).unwrap();

        let nested = root.join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let found = discover(&nested).unwrap();
        assert_eq!(found, root.canonicalize_utf8().unwrap());
    }

    #[test]
    fn discover_fails_without_a_control_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        assert!(discover(root).is_err());
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        init(root, "mytree", Timestamp::UNIX_EPOCH).unwrap();
        assert!(init(root, "mytree", Timestamp::UNIX_EPOCH).is_err());
    }
}
