//! Streams a multipart field to a temp file
//!
//! The file is owned by a [`TempUpload`] from the moment it is named, so a
//! rejected or interrupted upload never leaves it behind.

use axum::extract::multipart::{Field, MultipartError};
use roster_ingest::{TempUpload, UploadedFile};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::UploadConfig;

#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("upload exceeds the limit of {max_bytes} bytes")]
    TooLarge { max_bytes: u64 },

    #[error("failed to read multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("failed to write upload to disk: {0}")]
    Io(#[from] std::io::Error),
}

/// Write `field` to `<dir>/<uuid>.csv`, enforcing `max_bytes`
#[tracing::instrument(skip_all, fields(dir = %config.dir.display()))]
pub async fn spool_field(
    mut field: Field<'_>,
    config: &UploadConfig,
) -> Result<UploadedFile, SpoolError> {
    let original_name = field.file_name().unwrap_or("upload.csv").to_string();

    tokio::fs::create_dir_all(&config.dir).await?;
    let temp = TempUpload::new(config.dir.join(format!("{}.csv", Uuid::new_v4())));
    let mut file = tokio::fs::File::create(temp.path()).await?;

    let mut size = 0u64;
    while let Some(chunk) = field.chunk().await? {
        size += chunk.len() as u64;
        if size > config.max_bytes {
            tracing::warn!(max_bytes = config.max_bytes, "Upload rejected: too large");
            return Err(SpoolError::TooLarge {
                max_bytes: config.max_bytes,
            });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    tracing::info!(
        file = %original_name,
        size_mb = %format_args!("{:.2}", size as f64 / (1024.0 * 1024.0)),
        "Upload received"
    );

    Ok(UploadedFile::new(temp, size, original_name))
}
