//! Feature modules implementing the Roster API
//!
//! Each feature is a vertical slice:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions

pub mod records;

use axum::Router;
use roster_ingest::IngestionService;

use crate::config::UploadConfig;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Runs one ingestion per uploaded file
    pub ingestion: IngestionService,
    /// Spool directory and size limit for multipart uploads
    pub upload: UploadConfig,
}

/// Creates the API router with all feature routes mounted
///
/// - `/records` - CSV upload and record listing
pub fn router(state: FeatureState) -> Router<()> {
    Router::new().nest("/records", records::records_routes().with_state(state))
}
