use roster_ingest::{IngestFailure, IngestionService, UploadedFile};
use serde::{Deserialize, Serialize};

use crate::features::records::spool::SpoolError;

/// Ingest one spooled CSV upload
#[derive(Debug)]
pub struct UploadRecordsCommand {
    pub upload: Option<UploadedFile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecordsResponse {
    pub message: String,
    pub records_processed: u64,
    pub lines_processed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadRecordsError {
    #[error("A CSV file is required in the 'file' field")]
    FileRequired,
    #[error("Upload exceeds the limit of {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },
    #[error("Malformed upload: {0}")]
    Malformed(String),
    #[error("Failed to store upload: {0}")]
    Spool(#[source] std::io::Error),
    #[error("Failed to process file: {0}")]
    Ingestion(#[from] IngestFailure),
}

impl From<SpoolError> for UploadRecordsError {
    fn from(err: SpoolError) -> Self {
        match err {
            SpoolError::TooLarge { max_bytes } => Self::TooLarge { max_bytes },
            SpoolError::Multipart(e) => Self::Malformed(e.body_text()),
            SpoolError::Io(e) => Self::Spool(e),
        }
    }
}

#[tracing::instrument(skip(service, command))]
pub async fn handle(
    service: &IngestionService,
    command: UploadRecordsCommand,
) -> Result<UploadRecordsResponse, UploadRecordsError> {
    let upload = command.upload.ok_or(UploadRecordsError::FileRequired)?;

    let report = service.ingest_upload(upload).await?;

    Ok(UploadRecordsResponse {
        message: "File processed successfully".to_string(),
        records_processed: report.records_processed,
        lines_processed: report.lines_processed,
    })
}
