//! Small filesystem helpers: atomic tempfile+rename writes and magic-byte
//! checks. Grounded on the teacher's `safe_copy_to_file`/`move_opened`
//! (write to `<name>.part`, sync, rename into place) generalized from
//! "copy a `Read` into a file" to "hand a closure a `Write` sink", since
//! every writer here (TSV, gzip) wants to stream rather than be handed a
//! finished buffer.

use std::fs::{self, File};
use std::io::{self, Write};

use camino::Utf8Path;

use crate::error::HoardError;

/// Calls `write` with a `Write` sink backed by `path.part`, then syncs and
/// renames into `path`. Guarantees `path` never contains a partial file:
/// a crash mid-write leaves `path.part` behind but `path` untouched.
pub fn safe_write<F, E>(path: &Utf8Path, write: F) -> Result<(), HoardError>
where
    F: FnOnce(&mut File) -> Result<(), E>,
    HoardError: From<E>,
{
    let part = camino::Utf8PathBuf::from(format!("{path}.part"));

    let mut fh = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&part)?;

    write(&mut fh).map_err(HoardError::from)?;
    fh.sync_all()?;
    drop(fh);

    fs::rename(&part, path)?;
    Ok(())
}

/// Checks for the given magic bytes at the start of a reader, returning
/// [`HoardError::UnsupportedFormat`] on mismatch. Tags are expected to look
/// like `namespace/version\n`; the error carries just the `version` token
/// (the part after the last `/`, newline trimmed), not the whole line, so
/// callers can match on it directly.
pub fn check_magic<R: io::Read>(r: &mut R, expected: &[u8]) -> Result<(), HoardError> {
    let mut buf = vec![0u8; expected.len()];
    r.read_exact(&mut buf)?;
    if buf != expected {
        let got = String::from_utf8_lossy(&buf);
        let token = got.rsplit('/').next().unwrap_or(&got).trim_end_matches('\n');
        return Err(HoardError::UnsupportedFormat(token.to_owned()));
    }
    Ok(())
}

/// Writes `bytes` through [`safe_write`] directly, for callers that
/// already have a finished buffer rather than a streaming writer.
pub fn safe_write_bytes(path: &Utf8Path, bytes: &[u8]) -> Result<(), HoardError> {
    safe_write(path, |fh| -> io::Result<()> { fh.write_all(bytes) })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8Path::from_path(dir.path()).unwrap().join("out.txt");

        safe_write_bytes(&path, b"hello").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello");
        assert!(!camino::Utf8Path::new(&format!("{path}.part")).exists());
    }

    #[test]
    fn magic_mismatch_is_unsupported_format() {
        let data = b"hoard.data.version/v2\n";
        let res = check_magic(&mut data.as_slice(), b"hoard.data.version/v1\n");
        match res {
            Err(HoardError::UnsupportedFormat(tag)) => assert_eq!(tag, "v2"),
            other => panic!("expected UnsupportedFormat(\"v2\"), got {other:?}"),
        }
    }
}
