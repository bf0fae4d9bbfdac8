//! One ingestion run, end to end
//!
//! [`IngestionService`] wires a fresh pump, accumulator and counter set to an
//! input stream for each call. Uploaded temp files are removed exactly once
//! whichever way the run ends, including when the calling future is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{debug, error, info, warn};

use crate::config::IngestConfig;
use crate::pump::{PumpError, PumpOutcome, RunCounters, StreamError, StreamPump};
use crate::sink::BatchSink;
use crate::store::RecordStore;

/// A file received by the transport layer and spooled to disk
///
/// Owns the spooled file: it is deleted when the upload is ingested or
/// dropped.
#[derive(Debug)]
pub struct UploadedFile {
    temp: TempUpload,
    pub size: u64,
    pub original_name: String,
}

impl UploadedFile {
    pub fn new(temp: TempUpload, size: u64, original_name: impl Into<String>) -> Self {
        Self {
            temp,
            size,
            original_name: original_name.into(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// Successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub records_processed: u64,
    pub lines_processed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCause {
    Stream,
    Insert,
}

/// Failed run, with the counters gathered before the failure
///
/// `records_processed` only says which batches were acknowledged by the
/// store; it is diagnostic, not a durability promise.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct IngestFailure {
    #[source]
    pub error: PumpError,
    pub records_processed: u64,
    pub lines_processed: u64,
}

impl IngestFailure {
    fn new(error: PumpError, counters: RunCounters) -> Self {
        Self {
            error,
            records_processed: counters.records_inserted,
            lines_processed: counters.lines_seen,
        }
    }

    pub fn cause(&self) -> FailureCause {
        match self.error {
            PumpError::Stream(_) => FailureCause::Stream,
            PumpError::Insert(_) => FailureCause::Insert,
        }
    }
}

impl PumpOutcome {
    pub fn into_result(self) -> Result<IngestReport, IngestFailure> {
        match self.error {
            None => Ok(IngestReport {
                records_processed: self.counters.records_inserted,
                lines_processed: self.counters.lines_seen,
            }),
            Some(error) => Err(IngestFailure::new(error, self.counters)),
        }
    }
}

/// Owns a temporary file and deletes it once
///
/// [`TempUpload::release`] removes the file asynchronously; if the guard is
/// dropped without being released (early return, cancelled future, panic)
/// the file is removed synchronously in `Drop`.
#[derive(Debug)]
pub struct TempUpload {
    path: PathBuf,
    armed: bool,
}

impl TempUpload {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn release(mut self) {
        self.armed = false;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Temporary upload removed"),
            Err(e) => log_removal_error(&self.path, &e),
        }
    }
}

impl Drop for TempUpload {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Temporary upload removed on drop"),
            Err(e) => log_removal_error(&self.path, &e),
        }
    }
}

fn log_removal_error(path: &Path, err: &std::io::Error) {
    if err.kind() == std::io::ErrorKind::NotFound {
        debug!(path = %path.display(), "Temporary upload already gone");
    } else {
        warn!(path = %path.display(), error = %err, "Failed to remove temporary upload");
    }
}

/// Runs ingestions against one store
#[derive(Clone)]
pub struct IngestionService {
    sink: BatchSink,
    config: IngestConfig,
}

impl IngestionService {
    pub fn new(store: Arc<dyn RecordStore>, config: IngestConfig) -> Self {
        Self {
            sink: BatchSink::new(store),
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        self.sink.store()
    }

    /// Ingest a spooled upload and delete its temp file
    #[tracing::instrument(skip(self, upload), fields(file = %upload.original_name, size = upload.size))]
    pub async fn ingest_upload(&self, upload: UploadedFile) -> Result<IngestReport, IngestFailure> {
        let temp = upload.temp;
        info!("Processing uploaded file");

        let result = match tokio::fs::File::open(temp.path()).await {
            Ok(file) => self.ingest_reader(file).await,
            Err(source) => {
                let error = StreamError::Open {
                    path: temp.path().display().to_string(),
                    source,
                };
                error!(error = %error, "Could not open uploaded file");
                Err(IngestFailure::new(error.into(), RunCounters::default()))
            },
        };

        temp.release().await;
        result
    }

    /// Ingest any CSV byte stream
    pub async fn ingest_reader<R>(&self, input: R) -> Result<IngestReport, IngestFailure>
    where
        R: AsyncRead + Unpin + Send,
    {
        let started = Instant::now();
        let outcome = StreamPump::new(input, &self.sink, &self.config).run().await;
        let elapsed = started.elapsed();
        let counters = outcome.counters;

        match outcome.into_result() {
            Ok(report) => {
                let secs = elapsed.as_secs_f64();
                let rows_per_sec = if secs > 0.0 {
                    counters.lines_seen as f64 / secs
                } else {
                    0.0
                };
                info!(
                    lines = report.lines_processed,
                    records = report.records_processed,
                    duplicates = counters.duplicates_absorbed,
                    flushes = counters.flushes,
                    elapsed_ms = elapsed.as_millis() as u64,
                    rows_per_sec = rows_per_sec.round() as u64,
                    "Ingestion completed"
                );
                Ok(report)
            },
            Err(failure) => {
                error!(
                    cause = ?failure.cause(),
                    error = %failure.error,
                    lines = failure.lines_processed,
                    records = failure.records_processed,
                    "Ingestion failed"
                );
                Err(failure)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_camel_case() {
        let report = IngestReport {
            records_processed: 2,
            lines_processed: 3,
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["recordsProcessed"], 2);
        assert_eq!(json["linesProcessed"], 3);
    }

    #[test]
    fn test_temp_upload_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.csv");
        std::fs::write(&path, "id\n1\n").unwrap();

        drop(TempUpload::new(&path));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_release_of_missing_file_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        TempUpload::new(dir.path().join("never-written.csv"))
            .release()
            .await;
    }
}
