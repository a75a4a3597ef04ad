use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{CrptError, CrptResult};

/// Top-level configuration (loaded from crpt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrptConfig {
    pub log: LogConfig,
    pub batch: BatchConfig,
    pub cipher: CipherConfig,
}

impl CrptConfig {
    /// Load from a TOML file, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> CrptResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {} (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| CrptError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> CrptResult<Self> {
        toml::from_str(content).map_err(|e| CrptError::Config(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Files processed concurrently (0 = cpu_count)
    pub workers: usize,
    /// Descend into subdirectories when a directory is given
    pub recursive: bool,
    /// Replace encrypted output names with a one-way digest of the source path
    pub hide_names: bool,
    /// Delete each source file after it was processed successfully
    pub delete_source: bool,
    /// Overwrite existing output files instead of skipping them
    pub overwrite: bool,
    /// Keep decrypted output whose content checksum does not match
    pub keep_corrupt: bool,
    /// Glob patterns (matched on entry names) to exclude from listing
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CipherConfig {
    /// Buffers at least this large are enciphered on the rayon pool
    pub parallel_threshold_bytes: usize,
    /// Read/write buffer size in KiB for file streaming
    pub io_buffer_kib: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            recursive: false,
            hide_names: false,
            delete_source: false,
            overwrite: false,
            keep_corrupt: false,
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            parallel_threshold_bytes: 64 * 1024,
            io_buffer_kib: 256,
        }
    }
}

impl BatchConfig {
    /// Effective worker count (resolves 0 to the available parallelism)
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
