use axum::{
    extract::{multipart::MultipartRejection, Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::{
    commands::{upload, UploadRecordsCommand, UploadRecordsError},
    queries::{list, ListRecordsError, ListRecordsQuery},
    spool::{spool_field, SpoolError},
};
use crate::api::response::{ApiResponse, ErrorResponse};
use crate::error::AppError;
use crate::features::FeatureState;

/// Multipart field carrying the CSV file
const FILE_FIELD: &str = "file";

pub fn records_routes() -> Router<FeatureState> {
    Router::new()
        .route("/", get(list_records))
        .route("/upload", post(upload_records))
}

#[tracing::instrument(skip(state, multipart))]
async fn upload_records(
    State(state): State<FeatureState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, RecordsApiError> {
    let mut multipart =
        multipart.map_err(|e| UploadRecordsError::Malformed(e.body_text()))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadRecordsError::from(SpoolError::from(e)))?
    {
        // Later file fields and other form fields are ignored
        if upload.is_none() && field.name() == Some(FILE_FIELD) {
            upload = Some(spool_field(field, &state.upload).await?);
        }
    }

    if upload.is_none() {
        tracing::warn!("Upload request without a file field");
    }

    let response = upload::handle(&state.ingestion, UploadRecordsCommand { upload }).await?;

    tracing::info!(
        records = response.records_processed,
        lines = response.lines_processed,
        "File processed via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state))]
async fn list_records(
    State(state): State<FeatureState>,
    Query(query): Query<ListRecordsQuery>,
) -> Result<Response, RecordsApiError> {
    let response = list::handle(state.ingestion.store().as_ref(), query).await?;

    let meta = json!({
        "limit": response.limit,
        "count": response.items.len(),
    });

    Ok(ApiResponse::success_with_meta(response.items, meta).into_response())
}

#[derive(Debug, thiserror::Error)]
enum RecordsApiError {
    #[error(transparent)]
    Upload(#[from] UploadRecordsError),
    #[error(transparent)]
    List(#[from] ListRecordsError),
}

impl From<SpoolError> for RecordsApiError {
    fn from(err: SpoolError) -> Self {
        Self::Upload(err.into())
    }
}

impl IntoResponse for RecordsApiError {
    fn into_response(self) -> Response {
        match self {
            RecordsApiError::Upload(
                UploadRecordsError::FileRequired | UploadRecordsError::Malformed(_),
            )
            | RecordsApiError::List(ListRecordsError::InvalidLimit) => {
                AppError::Validation(self.to_string()).into_response()
            },
            RecordsApiError::Upload(UploadRecordsError::TooLarge { .. }) => {
                let error = ErrorResponse::new("PAYLOAD_TOO_LARGE", self.to_string());
                (StatusCode::PAYLOAD_TOO_LARGE, Json(error)).into_response()
            },
            RecordsApiError::Upload(UploadRecordsError::Spool(ref e)) => {
                tracing::error!(error = %e, "Failed to spool upload");
                let error = ErrorResponse::new("INTERNAL_ERROR", "Failed to store the upload");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
            RecordsApiError::Upload(UploadRecordsError::Ingestion(ref failure)) => {
                let error = ErrorResponse::with_details(
                    "INGESTION_FAILED",
                    "Error processing the file",
                    json!({
                        "cause": failure.cause(),
                        "message": failure.to_string(),
                        "recordsProcessed": failure.records_processed,
                        "linesProcessed": failure.lines_processed,
                    }),
                );
                (StatusCode::INTERNAL_SERVER_ERROR, Json(error)).into_response()
            },
            RecordsApiError::List(ListRecordsError::Store(e)) => AppError::from(e).into_response(),
        }
    }
}
