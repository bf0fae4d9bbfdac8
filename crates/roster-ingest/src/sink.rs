//! Batch insertion with duplicate tolerance

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error};

use crate::batch::Batch;
use crate::store::{RecordStore, StoreError};

/// A bulk insert failed for a reason other than duplicate keys
#[derive(Debug, Clone, Error)]
#[error("bulk insert of {batch_len} records failed: {source}")]
pub struct InsertError {
    pub batch_len: usize,
    #[source]
    pub source: StoreError,
}

/// Outcome of one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub inserted: u64,
    pub conflicts: u64,
}

/// Hands batches to the store, absorbing uniqueness conflicts
#[derive(Clone)]
pub struct BatchSink {
    store: Arc<dyn RecordStore>,
}

impl BatchSink {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Insert `batch`; empty batches never reach the store
    pub async fn insert(&self, batch: Batch) -> Result<SinkReport, InsertError> {
        if batch.is_empty() {
            return Ok(SinkReport::default());
        }

        match self.store.bulk_insert(batch.records()).await {
            Ok(inserted) => Ok(SinkReport {
                inserted,
                conflicts: 0,
            }),
            Err(StoreError::Conflict {
                inserted,
                conflicts,
            }) => {
                debug!(inserted, conflicts, "Duplicate records skipped");
                Ok(SinkReport {
                    inserted,
                    conflicts,
                })
            },
            Err(source) => {
                error!(batch_len = batch.len(), error = %source, "Bulk insert failed");
                Err(InsertError {
                    batch_len: batch.len(),
                    source,
                })
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::store::MemoryStore;

    fn batch(ids: &[i64]) -> Batch {
        ids.iter()
            .map(|&id| Record {
                id,
                ..Record::default()
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn test_clean_insert() {
        let sink = BatchSink::new(Arc::new(MemoryStore::new()));
        let report = sink.insert(batch(&[1, 2, 3])).await.unwrap();
        assert_eq!(report, SinkReport { inserted: 3, conflicts: 0 });
    }

    #[tokio::test]
    async fn test_duplicates_absorbed() {
        let store = Arc::new(MemoryStore::new());
        let sink = BatchSink::new(store.clone());
        sink.insert(batch(&[1, 2])).await.unwrap();

        let report = sink.insert(batch(&[2, 3])).await.unwrap();
        assert_eq!(report, SinkReport { inserted: 1, conflicts: 1 });
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let sink = BatchSink::new(store.clone());

        let report = sink.insert(Batch::default()).await.unwrap();
        assert_eq!(report, SinkReport::default());
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_insert_error() {
        let sink = BatchSink::new(Arc::new(MemoryStore::failing_after(0)));
        let err = sink.insert(batch(&[1, 2])).await.unwrap_err();
        assert_eq!(err.batch_len, 2);
        assert!(matches!(err.source, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_store_timeout_is_insert_error() {
        let store = Arc::new(MemoryStore::timing_out_after(1));
        let sink = BatchSink::new(store.clone());
        sink.insert(batch(&[1])).await.unwrap();

        let err = sink.insert(batch(&[2, 3])).await.unwrap_err();
        assert_eq!(err.batch_len, 2);
        assert!(matches!(err.source, StoreError::Timeout(_)));
        assert_eq!(store.len(), 1);
    }
}
