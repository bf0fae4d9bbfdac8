//! Record store abstraction
//!
//! The pipeline only needs two things from a store: an unordered bulk insert
//! that reports uniqueness conflicts separately from real failures, and a way
//! to read back the newest records.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::Record;

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::PgRecordStore;

/// Failure kinds reported by a [`RecordStore`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Some records were rejected by a uniqueness constraint; the rest were
    /// inserted.
    #[error("{conflicts} record(s) rejected as duplicates, {inserted} inserted")]
    Conflict { inserted: u64, conflicts: u64 },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out: {0}")]
    Timeout(String),

    #[error("store rejected the request: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Persistent record storage
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert every record independently of its siblings
    ///
    /// Returns the number inserted. When any record hits a uniqueness
    /// constraint the call returns [`StoreError::Conflict`] carrying both
    /// counts; the non-conflicting records are still persisted.
    async fn bulk_insert(&self, records: &[Record]) -> Result<u64, StoreError>;

    /// Most recently inserted records first
    async fn list_recent(&self, limit: usize) -> Result<Vec<Record>, StoreError>;

    /// Connectivity check
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
