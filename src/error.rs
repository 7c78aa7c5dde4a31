//! Collaborator-level error kinds for the snapshot engine.
//!
//! Application code works in `anyhow::Result` and attaches context as it
//! crosses layers; these variants carry the structured data a caller might
//! want to match on (exit codes, the offending row, etc).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HoardError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("subprocess failed: {0}")]
    SubprocessError(#[from] SubprocessError),

    #[error("unsupported version format tag {0:?}")]
    UnsupportedFormat(String),

    #[error("malformed TSV row: {0}")]
    MalformedRow(String),

    #[error("invalid index: {0}")]
    InvalidIndex(String),

    #[error("{0:?} is a reserved name")]
    ReservedName(String),

    #[error("block store error: {0}")]
    BlockStoreError(String),

    #[error("version store error: {0}")]
    VersionStoreError(String),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}: another snapshot is already running against this working tree")]
    Locked(String),
}

/// Detail carried by [`HoardError::SubprocessError`].
#[derive(Error, Debug)]
#[error("{command}: {}", self.describe())]
pub struct SubprocessError {
    pub command: String,
    pub exit: Option<i32>,
    pub timed_out: bool,
    pub stderr: String,
}

impl SubprocessError {
    fn describe(&self) -> String {
        if self.timed_out {
            "timed out".to_string()
        } else {
            match self.exit {
                Some(code) => format!("exited with status {code}"),
                None => "terminated by signal".to_string(),
            }
        }
    }
}
