//! Append-only dead-letter log for batches the classifier could not handle.
//!
//! One CSV row per failed batch. The row carries the full batch as JSON so a
//! later `retry` run can rebuild it without the original input file.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use painpoint_common::{Batch, FailedBatch, PainpointError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

/// Where failed batches go. Recording never fails the run.
pub trait DeadLetterSink: Send + Sync {
    fn record(&self, failed: &FailedBatch);

    /// Records that could not be persisted. Those batches are only in the logs.
    fn write_failures(&self) -> u32 {
        0
    }
}

/// Stable fingerprint of a batch's membership.
pub fn batch_digest(batch: &Batch) -> String {
    let mut hasher = Sha256::new();
    for id in batch.comment_ids() {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DeadLetterRow {
    batch_index: usize,
    digest: String,
    comment_ids: String,
    error: String,
    failed_at: DateTime<Utc>,
    batch_json: String,
}

impl DeadLetterRow {
    fn from_failed(failed: &FailedBatch) -> Result<Self, serde_json::Error> {
        Ok(Self {
            batch_index: failed.batch.index,
            digest: batch_digest(&failed.batch),
            comment_ids: failed.batch.comment_ids().join(";"),
            error: failed.error.clone(),
            failed_at: failed.failed_at,
            batch_json: serde_json::to_string(&failed.batch)?,
        })
    }
}

pub struct CsvDeadLetter {
    path: PathBuf,
    lock: Mutex<()>,
    write_failures: AtomicU32,
}

impl CsvDeadLetter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            write_failures: AtomicU32::new(0),
        }
    }

    fn append(&self, row: &DeadLetterRow) -> anyhow::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }
}

impl DeadLetterSink for CsvDeadLetter {
    fn record(&self, failed: &FailedBatch) {
        let outcome = DeadLetterRow::from_failed(failed)
            .map_err(anyhow::Error::from)
            .and_then(|row| self.append(&row));

        match outcome {
            Ok(()) => info!(
                batch = failed.batch.index,
                comments = failed.batch.len(),
                path = %self.path.display(),
                "Batch dead-lettered"
            ),
            Err(e) => {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
                error!(
                    batch = failed.batch.index,
                    comment_ids = %failed.batch.comment_ids().join(";"),
                    reason = %failed.error,
                    error = %e,
                    "Failed to write dead-letter record"
                );
            }
        }
    }

    fn write_failures(&self) -> u32 {
        self.write_failures.load(Ordering::Relaxed)
    }
}

/// Read back every batch recorded in a dead-letter file. A missing file means
/// nothing has failed yet.
pub fn load_failed_batches(path: &Path) -> Result<Vec<FailedBatch>, PainpointError> {
    if !path.exists() {
        info!(path = %path.display(), "No dead-letter file, nothing to load");
        return Ok(Vec::new());
    }

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| PainpointError::Input(format!("{}: {e}", path.display())))?;

    let mut batches = Vec::new();
    for (line, row) in reader.deserialize::<DeadLetterRow>().enumerate() {
        let row = row.map_err(|e| {
            PainpointError::Input(format!("{} record {}: {e}", path.display(), line + 1))
        })?;
        let batch: Batch = serde_json::from_str(&row.batch_json).map_err(|e| {
            PainpointError::Input(format!(
                "{} record {}: bad batch_json: {e}",
                path.display(),
                line + 1
            ))
        })?;
        if batch_digest(&batch) != row.digest {
            warn!(
                batch = row.batch_index,
                "Dead-letter digest does not match its batch contents"
            );
        }
        batches.push(FailedBatch {
            batch,
            error: row.error,
            failed_at: row.failed_at,
        });
    }

    Ok(batches)
}
