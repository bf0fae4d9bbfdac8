//! Roster Ingest Library
//!
//! Streams a CSV file of person records into a record store in fixed-size
//! batches, with bounded memory and tolerance for duplicate ids.
//!
//! # Pipeline
//!
//! - [`coerce`]: raw row → [`Record`], total and lossy
//! - [`batch`]: fixed-size accumulation
//! - [`sink`]: bulk insert, absorbing uniqueness conflicts
//! - [`pump`]: the streaming state machine driving the above
//! - [`service`]: one run per upload, temp file cleanup and reporting
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use roster_ingest::{IngestConfig, IngestionService, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = IngestionService::new(Arc::new(MemoryStore::new()), IngestConfig::default());
//!     let file = tokio::fs::File::open("people.csv").await?;
//!     let report = service.ingest_reader(file).await?;
//!     println!("{} records from {} lines", report.records_processed, report.lines_processed);
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod coerce;
pub mod config;
pub mod pump;
pub mod record;
pub mod service;
pub mod sink;
pub mod store;

pub use batch::{Batch, BatchAccumulator, DEFAULT_BATCH_SIZE};
pub use config::IngestConfig;
pub use pump::{PumpError, PumpOutcome, PumpState, RunCounters, StreamError, StreamPump};
pub use record::Record;
pub use service::{
    FailureCause, IngestFailure, IngestReport, IngestionService, TempUpload, UploadedFile,
};
pub use sink::{BatchSink, InsertError, SinkReport};
pub use store::{MemoryStore, RecordStore, StoreError};

#[cfg(feature = "database")]
pub use store::PgRecordStore;
