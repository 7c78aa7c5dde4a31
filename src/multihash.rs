//! Content identities: self-describing hashes (algorithm code + length +
//! digest bytes) used for both `content-id` (plaintext) and `coded-id`
//! (encoded/encrypted bytes).

use std::fmt;
use std::io::{self, Read, Write};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use sha2::{Digest, Sha256, digest::Output};

use crate::error::HoardError;

/// Multihash code for SHA2-256, matching the multihash spec's registered
/// value so IDs produced here are recognizable to other multihash-aware
/// tools.
const SHA2_256_CODE: u8 = 0x12;
const SHA2_256_LEN: u8 = 32;

/// A multihash: `code, length, digest`. The only algorithm produced by this
/// crate is SHA2-256, but the on-wire/text form always carries code and
/// length so a reader doesn't need to assume it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MultihashId {
    code: u8,
    digest: Output<Sha256>,
}

impl MultihashId {
    /// Hashes `bytes` with SHA2-256 into a multihash.
    pub fn hash(bytes: &[u8]) -> Self {
        Self {
            code: SHA2_256_CODE,
            digest: Sha256::digest(bytes),
        }
    }

    fn from_digest(digest: Output<Sha256>) -> Self {
        Self {
            code: SHA2_256_CODE,
            digest,
        }
    }

    /// Raw bytes: code, length, digest.
    fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.digest.len());
        out.push(self.code);
        out.push(self.digest.len() as u8);
        out.extend_from_slice(&self.digest);
        out
    }
}

impl fmt::Debug for MultihashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MultihashId({})", self)
    }
}

impl fmt::Display for MultihashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", HEXLOWER.encode(&self.to_bytes()))
    }
}

impl FromStr for MultihashId {
    type Err = HoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = HEXLOWER
            .decode(s.as_bytes())
            .map_err(|e| HoardError::MalformedRow(format!("invalid multihash hex {s:?}: {e}")))?;

        if bytes.len() < 2 {
            return Err(HoardError::MalformedRow(format!(
                "multihash {s:?} too short"
            )));
        }
        let code = bytes[0];
        let len = bytes[1] as usize;
        if code != SHA2_256_CODE || len != SHA2_256_LEN as usize || bytes.len() != 2 + len {
            return Err(HoardError::MalformedRow(format!(
                "multihash {s:?} is not a recognized sha2-256 multihash"
            )));
        }
        Ok(MultihashId::from_digest(*Output::<Sha256>::from_slice(
            &bytes[2..],
        )))
    }
}

/// A `Read` wrapper that hashes every byte read through it.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    pub fn finalize(self) -> (MultihashId, R) {
        (MultihashId::from_digest(self.hasher.finalize()), self.inner)
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.hasher.update(&buf[..count]);
        Ok(count)
    }
}

/// A `Write` wrapper that hashes every byte written through it.
pub struct HashingWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    pub fn finalize(self) -> (MultihashId, W) {
        (MultihashId::from_digest(self.hasher.finalize()), self.inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const HELLO: &[u8] = b"hi\n";
    // sha2-256("hi\n")
    const EXPECTED: &[u8] =
        &hex_literal::hex!("c80e8c055a9b7b7da0995e72077e920d1df67b40aeb33f708b0b5e9c5ae4527");

    #[test]
    fn smoke() {
        let id = MultihashId::hash(HELLO);
        assert_eq!(id.digest.as_slice(), EXPECTED);
        assert_eq!(id.code, SHA2_256_CODE);
    }

    #[test]
    fn display_roundtrip() {
        let id = MultihashId::hash(HELLO);
        let text = id.to_string();
        let parsed: MultihashId = text.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn reader_and_writer() -> io::Result<()> {
        let mut r = HashingReader::new(HELLO);
        io::copy(&mut r, &mut io::sink())?;
        assert_eq!(r.finalize().0.digest.as_slice(), EXPECTED);

        let mut w = HashingWriter::new(io::sink());
        w.write_all(HELLO)?;
        assert_eq!(w.finalize().0.digest.as_slice(), EXPECTED);
        Ok(())
    }

    #[test]
    fn rejects_malformed() {
        assert!("not-hex".parse::<MultihashId>().is_err());
        assert!("12".parse::<MultihashId>().is_err());
    }
}
