//! Batch engine: runs each listed file through the container on a bounded
//! set of blocking workers.
//!
//! The listing runs on its own blocking thread and feeds a bounded queue, so
//! directory I/O never stalls the runtime. Per-file failures are recorded in
//! the report and never stop the batch.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crpt_core::config::CrptConfig;
use crpt_core::types::{BatchReport, Direction, FileOutcome, FileStatus};
use crpt_crypto::{
    decrypt_file_with, encrypt_file_with, CipherContext, CorruptionPolicy, CryptError,
    StreamOptions,
};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{BatchError, BatchResult};
use crate::naming;

/// Listed files buffered ahead of the workers
const LISTING_QUEUE: usize = 64;

/// Progress callback, invoked once per finished file
pub type ProgressFn = Box<dyn Fn(&FileOutcome) + Send + Sync>;

/// How a batch treats each file
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub direction: Direction,
    /// Name encrypted outputs after a one-way digest of the source path
    pub hide_names: bool,
    /// Remove the source once its output is complete and verified
    pub delete_source: bool,
    /// Replace existing outputs instead of skipping the file
    pub overwrite: bool,
    pub corruption: CorruptionPolicy,
    /// Files in flight at once
    pub workers: usize,
    pub stream: StreamOptions,
}

impl BatchOptions {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            hide_names: false,
            delete_source: false,
            overwrite: false,
            corruption: CorruptionPolicy::Discard,
            workers: 1,
            stream: StreamOptions::default(),
        }
    }

    pub fn from_config(direction: Direction, config: &CrptConfig) -> Self {
        Self {
            direction,
            hide_names: config.batch.hide_names,
            delete_source: config.batch.delete_source,
            overwrite: config.batch.overwrite,
            corruption: if config.batch.keep_corrupt {
                CorruptionPolicy::Keep
            } else {
                CorruptionPolicy::Discard
            },
            workers: config.batch.effective_workers(),
            stream: StreamOptions {
                buffer_size: config.cipher.io_buffer_kib.saturating_mul(1024),
                parallel_threshold: config.cipher.parallel_threshold_bytes,
            },
        }
    }
}

/// Process every file yielded by `files`.
///
/// `files` is consumed on a blocking thread. Outcomes are reported in input
/// order. Listing errors become failed outcomes; only a broken worker pool
/// aborts the run.
pub async fn run_batch<I>(
    ctx: Arc<CipherContext>,
    files: I,
    options: &BatchOptions,
    progress: Option<&ProgressFn>,
) -> BatchResult<BatchReport>
where
    I: IntoIterator<Item = BatchResult<(PathBuf, u64)>>,
    I::IntoIter: Send + 'static,
{
    let started = Instant::now();
    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));
    let mut tasks = JoinSet::new();
    let mut finished: Vec<(usize, FileOutcome)> = Vec::new();

    let (tx, mut rx) = mpsc::channel(LISTING_QUEUE);
    let files = files.into_iter();
    let listing = tokio::task::spawn_blocking(move || {
        for item in files {
            if tx.blocking_send(item).is_err() {
                break;
            }
        }
    });

    let mut next_index = 0usize;
    while let Some(item) = rx.recv().await {
        let index = next_index;
        next_index += 1;
        let source = match item {
            Ok((path, _)) => path,
            Err(e) => {
                warn!("listing: {e}");
                record(progress, &mut finished, index, listing_failure(e));
                continue;
            }
        };

        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        let ctx = Arc::clone(&ctx);
        let opts = options.clone();
        tasks.spawn_blocking(move || {
            let outcome = process_file(&ctx, &source, &opts);
            drop(permit);
            (index, outcome)
        });

        while let Some(joined) = tasks.try_join_next() {
            let (index, outcome) = joined?;
            record(progress, &mut finished, index, outcome);
        }
    }

    listing.await?;

    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) = joined?;
        record(progress, &mut finished, index, outcome);
    }

    finished.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<FileOutcome> = finished.into_iter().map(|(_, o)| o).collect();
    let total_bytes = outcomes
        .iter()
        .filter(|o| matches!(o.status, FileStatus::Done | FileStatus::CorruptKept))
        .map(|o| o.bytes)
        .sum();

    let report = BatchReport {
        outcomes,
        total_bytes,
        elapsed: started.elapsed(),
    };
    info!(
        processed = report.processed(),
        failed = report.failed(),
        skipped = report.skipped(),
        bytes = report.total_bytes,
        "batch finished"
    );
    Ok(report)
}

/// Run one file through the container in the configured direction.
pub fn process_file(ctx: &CipherContext, source: &Path, options: &BatchOptions) -> FileOutcome {
    let output = match options.direction {
        Direction::Encrypt => Ok(naming::encrypted_output(source, options.hide_names)),
        Direction::Decrypt => naming::decrypted_output(ctx, source),
    };
    let output = match output {
        Ok(path) => path,
        Err(e) => {
            warn!(source = %source.display(), "{e}");
            return outcome(source, None, FileStatus::Failed, 0, Some(e.to_string()));
        }
    };

    if !options.overwrite && output.exists() {
        debug!(source = %source.display(), output = %output.display(), "skip: output exists");
        return outcome(source, Some(output), FileStatus::Skipped, 0, None);
    }

    let result = match options.direction {
        Direction::Encrypt => encrypt_file_with(ctx, source, &output, &options.stream),
        Direction::Decrypt => {
            decrypt_file_with(ctx, source, &output, options.corruption, &options.stream)
        }
    };

    match result {
        Ok(bytes) => {
            if options.delete_source {
                if let Err(e) = std::fs::remove_file(source) {
                    warn!(source = %source.display(), "unable to delete source: {e}");
                }
            }
            outcome(source, Some(output), FileStatus::Done, bytes, None)
        }
        Err(e @ CryptError::Integrity { kept: true, .. }) => {
            let bytes = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
            outcome(source, Some(output), FileStatus::CorruptKept, bytes, Some(e.to_string()))
        }
        Err(e) => {
            warn!(source = %source.display(), "{e}");
            outcome(source, None, FileStatus::Failed, 0, Some(e.to_string()))
        }
    }
}

fn record(
    progress: Option<&ProgressFn>,
    finished: &mut Vec<(usize, FileOutcome)>,
    index: usize,
    outcome: FileOutcome,
) {
    if let Some(cb) = progress {
        cb(&outcome);
    }
    finished.push((index, outcome));
}

fn outcome(
    source: &Path,
    output: Option<PathBuf>,
    status: FileStatus,
    bytes: u64,
    error: Option<String>,
) -> FileOutcome {
    FileOutcome {
        source: source.to_path_buf(),
        output,
        status,
        bytes,
        error,
    }
}

fn listing_failure(e: BatchError) -> FileOutcome {
    let source = match &e {
        BatchError::Walk { path, .. } => path.clone(),
        _ => PathBuf::new(),
    };
    outcome(&source, None, FileStatus::Failed, 0, Some(e.to_string()))
}
