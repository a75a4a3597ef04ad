use std::path::PathBuf;

use thiserror::Error;

pub type CryptResult<T> = Result<T, CryptError>;

/// Failures of a single file or string operation.
///
/// None of these are fatal for a batch: the driver records them per file
/// and moves on.
#[derive(Debug, Error)]
pub enum CryptError {
    /// Missing or unusable path, or identical source and destination
    #[error("{0}")]
    Input(String),

    /// Read or write failure; any partial output has been removed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The header's verification tag does not match the session key
    #[error("wrong password for {}, or not a valid file", path.display())]
    KeyMismatch { path: PathBuf },

    /// The recomputed content checksum differs from the stored one
    #[error("checksum mismatch for {what}: it may have been corrupted{}", if *kept { " (output kept)" } else { "" })]
    Integrity { what: String, kept: bool },

    /// Not a well-formed container or encrypted string
    #[error("{0} is not a valid encrypted payload")]
    Format(String),

    /// Buffer reservation failed
    #[error("unable to allocate {0} bytes")]
    Allocation(usize),

    /// Block processing was handed a buffer that is not a whole number of blocks
    #[error("buffer length {0} is not a multiple of the 8-byte block size")]
    BlockLength(usize),
}

impl CryptError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
