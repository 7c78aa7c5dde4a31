//! Typed tabular line format: a header row of column names, then one TSV
//! row per record, with per-column encode/decode handled by each field's
//! own `Display`/`FromStr` (wired through `serde` so the `csv` crate can
//! drive it). Blank cells denote absent (`Option::None`) values, which is
//! the `csv` crate's native behavior for `Option<T>` fields.

use std::io::{Read, Write};

use serde::{Serialize, de::DeserializeOwned};

use crate::error::HoardError;

/// Write `rows` as a TSV header + body to `writer`. Does not flush; callers
/// compose this with whatever wraps the writer next (gzip, a hashing
/// writer, a file).
pub fn write_rows<T: Serialize, W: Write>(writer: W, rows: &[T]) -> Result<(), HoardError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| HoardError::InvalidIndex(e.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read a TSV header + body from `reader` into `Vec<T>`.
pub fn read_rows<T: DeserializeOwned, R: Read>(reader: R) -> Result<Vec<T>, HoardError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(reader);
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        let row: T = result.map_err(|e| HoardError::MalformedRow(e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        path: String,
        size: Option<u64>,
        note: Option<String>,
    }

    #[test]
    fn round_trip() {
        let rows = vec![
            Row {
                path: "a".into(),
                size: Some(3),
                note: None,
            },
            Row {
                path: "b".into(),
                size: None,
                note: Some("hi".into()),
            },
        ];

        let mut buf = Vec::new();
        write_rows(&mut buf, &rows).unwrap();
        let parsed: Vec<Row> = read_rows(buf.as_slice()).unwrap();
        assert_eq!(parsed, rows);
    }

    #[test]
    fn malformed_row_errors() {
        let bad = b"path\tsize\nonly-one-column\n";
        let res: Result<Vec<Row>, _> = read_rows(bad.as_slice());
        assert!(res.is_err());
    }
}
