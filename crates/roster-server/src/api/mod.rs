pub mod response;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use roster_ingest::{IngestionService, RecordStore};
use serde_json::json;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::features::{self, FeatureState};
use crate::middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
}

/// Build the application router with all routes and middleware
pub fn create_router(store: Arc<dyn RecordStore>, config: &Config) -> Router {
    let feature_state = FeatureState {
        ingestion: IngestionService::new(store.clone(), config.ingest.clone()),
        upload: config.upload.clone(),
    };

    // Multipart bodies are streamed to disk; the size cap is enforced while spooling
    let body_limit = usize::try_from(config.upload.max_bytes)
        .map(|max| max.saturating_add(64 * 1024))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .with_state(AppState { store })
        .nest("/api/v1", features::router(feature_state))
        // Apply layers from innermost to outermost
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Roster Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Store health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "disconnected"
                })),
            )
                .into_response()
        },
    }
}
