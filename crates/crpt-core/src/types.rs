use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which way a batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// Final state of one file in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Output written and (for decryption) checksum verified
    Done,
    /// Output exists and overwriting is disabled
    Skipped,
    /// Decrypted, but the content checksum did not match; output kept on request
    CorruptKept,
    /// Operation failed; no output left behind
    Failed,
}

/// Result record for one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub status: FileStatus,
    pub bytes: u64,
    /// Human-readable failure reason
    pub error: Option<String>,
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    pub total_bytes: u64,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.count(|s| matches!(s, FileStatus::Done | FileStatus::CorruptKept))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| *s == FileStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| *s == FileStatus::Skipped)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&FileStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}
