//! Roster Server Library
//!
//! HTTP front end for CSV record ingestion.
//!
//! # Overview
//!
//! - **Upload**: `POST /api/v1/records/upload` streams the multipart `file`
//!   field to a temp file and runs one ingestion over it
//! - **Listing**: `GET /api/v1/records?limit=N` returns the newest records
//! - **Health**: `GET /health` pings the record store
//!
//! Ingestion itself lives in `roster-ingest`; this crate owns transport,
//! configuration, database setup and middleware.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use roster_ingest::PgRecordStore;
//! use roster_server::{api, config::Config, db};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     db::run_migrations(&pool).await?;
//!     let app = api::create_router(Arc::new(PgRecordStore::new(pool)), &config);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;

pub use error::AppError;
