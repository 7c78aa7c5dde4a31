//! Serializes and parses version files (§4.5, §4.7 wire form): a format-tag
//! line, a TSV header, and TSV rows, gzip-compressed and then piped through
//! an external encoder/decoder program. Grounded on the teacher's
//! `backend/filter.rs` layering (an encode/decode command wrapping a plain
//! backend) composed with `tsv.rs` and `pipe.rs`.

use std::io::{Read, Write};
use std::time::Duration;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::entry::IndexEntry;
use crate::error::HoardError;
use crate::file_util::check_magic;
use crate::pipe::PipeStats;

pub const FORMAT_TAG: &[u8] = b"hoard.data.version/v1\n";

/// Serializes `entries` to the plaintext wire form: format tag, TSV header,
/// TSV rows sorted by path. Does not gzip or encode; callers compose that
/// separately (§4.8 writes this form straight to the working tree, and
/// gzips/encodes it only for the repository copy).
pub fn write_plain<W: Write>(writer: &mut W, entries: &[IndexEntry]) -> Result<(), HoardError> {
    for entry in entries {
        entry.validate()?;
    }
    writer.write_all(FORMAT_TAG)?;
    crate::tsv::write_rows(writer, entries)?;
    Ok(())
}

/// Parses the plaintext wire form produced by [`write_plain`].
pub fn read_plain<R: Read>(reader: &mut R) -> Result<Vec<IndexEntry>, HoardError> {
    check_magic(reader, FORMAT_TAG)?;
    let entries: Vec<IndexEntry> = crate::tsv::read_rows(reader)?;
    for entry in &entries {
        entry.validate()?;
    }
    Ok(entries)
}

/// Serializes `entries`, gzips the result, and pipes it through `encode_argv`
/// (§4.7), returning the encoded bytes and the pipe's stats.
pub fn encode(
    entries: &[IndexEntry],
    encode_argv: &[String],
    timeout: Duration,
) -> Result<(Vec<u8>, PipeStats), HoardError> {
    let mut plain = Vec::new();
    write_plain(&mut plain, entries)?;

    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(&plain)?;
    let gzipped = gz.finish()?;

    crate::pipe::run(encode_argv, &gzipped, timeout)
}

/// Reverses [`encode`]: pipes `ciphertext` through `decode_argv`, gunzips,
/// then parses the TSV body. The gzip reader is constructed only once
/// `consume` is invoked by `run_with_stdout`, which is already after the
/// decoder process has started -- satisfying §4.7's stream-construction-
/// ordering rule without any extra bookkeeping here.
pub fn decode(
    ciphertext: &[u8],
    decode_argv: &[String],
    timeout: Duration,
) -> Result<(Vec<IndexEntry>, PipeStats), HoardError> {
    crate::pipe::run_with_stdout(decode_argv, ciphertext, timeout, |stdout| {
        let mut gunzipped = Vec::new();
        GzDecoder::new(stdout).read_to_end(&mut gunzipped)?;
        Ok(gunzipped)
    })
    .and_then(|(gunzipped, stats)| {
        let entries = read_plain(&mut gunzipped.as_slice())?;
        Ok((entries, stats))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entry::EntryType;
    use camino::Utf8PathBuf;
    use jiff::Timestamp;

    fn sample_entries() -> Vec<IndexEntry> {
        vec![IndexEntry {
            path: Utf8PathBuf::from("a/b.txt"),
            kind: EntryType::File,
            size: Some(5),
            permissions: crate::posix::Permissions::from_mode(0o644),
            modified_at: Timestamp::UNIX_EPOCH,
            content_id: None,
            coded_id: None,
            target: None,
        }]
    }

    #[test]
    fn plain_round_trip() {
        let entries = sample_entries();
        let mut buf = Vec::new();
        write_plain(&mut buf, &entries).unwrap();
        assert!(buf.starts_with(FORMAT_TAG));

        let parsed = read_plain(&mut buf.as_slice()).unwrap();
        assert_eq!(parsed.len(), entries.len());
        assert_eq!(parsed[0].path, entries[0].path);
    }

    #[test]
    fn unknown_format_tag_is_rejected() {
        let bad = b"hoard.data.version/v9\npath\tkind\n";
        let res = read_plain(&mut bad.as_slice());
        match res {
            Err(HoardError::UnsupportedFormat(tag)) => assert_eq!(tag, "v9"),
            other => panic!("expected UnsupportedFormat(\"v9\"), got {other:?}"),
        }
    }

    #[test]
    fn encode_decode_round_trip_via_cat() {
        let entries = sample_entries();
        let argv = vec!["cat".to_string()];
        let (ciphertext, stats) = encode(&entries, &argv, Duration::from_secs(5)).unwrap();
        assert!(stats.success);

        let (decoded, _stats) = decode(&ciphertext, &argv, Duration::from_secs(5)).unwrap();
        assert_eq!(decoded.len(), entries.len());
        assert_eq!(decoded[0].path, entries[0].path);
    }
}
