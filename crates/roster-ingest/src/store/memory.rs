//! In-process store
//!
//! Enforces uniqueness on `id` and rejects NUL characters in text like the
//! PostgreSQL schema. Used for dry runs and tests; failures can be injected
//! after a number of successful inserts.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{RecordStore, StoreError};
use crate::record::Record;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<Record>,
    ids: HashSet<i64>,
    insert_calls: usize,
    batch_sizes: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_after: Option<(usize, StoreError)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `bulk_insert` after the first `calls` successful ones fails with
    /// [`StoreError::Unavailable`]
    pub fn failing_after(calls: usize) -> Self {
        Self::failing_with(
            calls,
            StoreError::Unavailable("connection refused by memory store".to_string()),
        )
    }

    /// Every `bulk_insert` after the first `calls` successful ones fails with
    /// [`StoreError::Timeout`]
    pub fn timing_out_after(calls: usize) -> Self {
        Self::failing_with(
            calls,
            StoreError::Timeout("statement timeout in memory store".to_string()),
        )
    }

    fn failing_with(calls: usize, error: StoreError) -> Self {
        Self {
            inner: Mutex::default(),
            fail_after: Some((calls, error)),
        }
    }

    /// Seed records directly, bypassing call accounting
    pub fn seed(&self, records: impl IntoIterator<Item = Record>) {
        let mut inner = self.lock();
        for record in records {
            if inner.ids.insert(record.id) {
                inner.records.push(record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> Vec<Record> {
        self.lock().records.clone()
    }

    /// Number of `bulk_insert` calls received, including failed ones
    pub fn insert_calls(&self) -> usize {
        self.lock().insert_calls
    }

    /// Size of every batch passed to `bulk_insert`, in call order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn bulk_insert(&self, records: &[Record]) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.insert_calls += 1;
        inner.batch_sizes.push(records.len());

        if let Some((limit, error)) = &self.fail_after {
            if inner.insert_calls > *limit {
                return Err(error.clone());
            }
        }

        // The whole statement fails, as in PostgreSQL
        if records.iter().any(has_nul) {
            return Err(StoreError::Rejected(
                "invalid byte sequence for encoding \"UTF8\": 0x00".to_string(),
            ));
        }

        let mut inserted = 0u64;
        let mut conflicts = 0u64;
        for record in records {
            if inner.ids.insert(record.id) {
                inner.records.push(record.clone());
                inserted += 1;
            } else {
                conflicts += 1;
            }
        }

        if conflicts > 0 {
            Err(StoreError::Conflict {
                inserted,
                conflicts,
            })
        } else {
            Ok(inserted)
        }
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<Record>, StoreError> {
        let inner = self.lock();
        Ok(inner.records.iter().rev().take(limit).cloned().collect())
    }
}

fn has_nul(record: &Record) -> bool {
    [
        &record.firstname,
        &record.lastname,
        &record.email,
        &record.email2,
        &record.profession,
    ]
    .iter()
    .any(|field| field.contains('\0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64) -> Record {
        Record {
            id,
            ..Record::default()
        }
    }

    #[tokio::test]
    async fn test_conflicts_do_not_block_siblings() {
        let store = MemoryStore::new();
        store.seed([record(2)]);

        let err = store
            .bulk_insert(&[record(1), record(2), record(3)])
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StoreError::Conflict {
                inserted: 2,
                conflicts: 1
            }
        );
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_list_recent_is_newest_first() {
        let store = MemoryStore::new();
        store.bulk_insert(&[record(1), record(2), record(3)]).await.unwrap();

        let ids: Vec<i64> = store
            .list_recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::failing_after(1);
        assert_eq!(store.bulk_insert(&[record(1)]).await.unwrap(), 1);

        let err = store.bulk_insert(&[record(2)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.insert_calls(), 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_injection() {
        let store = MemoryStore::timing_out_after(0);
        let err = store.bulk_insert(&[record(1)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_nul_text_rejects_whole_batch() {
        let store = MemoryStore::new();
        let bad = Record {
            id: 2,
            firstname: "Bo\0b".to_string(),
            ..Record::default()
        };

        let err = store.bulk_insert(&[record(1), bad, record(3)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(store.is_empty());
    }
}
