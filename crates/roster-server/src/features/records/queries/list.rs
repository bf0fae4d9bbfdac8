use roster_ingest::{Record, RecordStore, StoreError};
use serde::{Deserialize, Serialize};

/// Default number of records returned by a listing
pub const DEFAULT_LIST_LIMIT: i64 = 10;

/// Largest accepted `limit`
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRecordsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecordsResponse {
    pub items: Vec<Record>,
    pub limit: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ListRecordsError {
    #[error("Limit must be between 1 and 100")]
    InvalidLimit,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ListRecordsQuery {
    pub fn validate(&self) -> Result<(), ListRecordsError> {
        if let Some(limit) = self.limit {
            if !(1..=MAX_LIST_LIMIT).contains(&limit) {
                return Err(ListRecordsError::InvalidLimit);
            }
        }
        Ok(())
    }

    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }
}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: &dyn RecordStore,
    query: ListRecordsQuery,
) -> Result<ListRecordsResponse, ListRecordsError> {
    query.validate()?;

    let limit = query.limit();
    let items = store.list_recent(limit as usize).await?;

    Ok(ListRecordsResponse { items, limit })
}
