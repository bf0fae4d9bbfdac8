//! PostgreSQL record store
//!
//! Bulk inserts use a single multi-row `INSERT ... ON CONFLICT DO NOTHING`,
//! so a duplicate `id` never aborts its siblings; the number of skipped rows
//! is recovered from `rows_affected`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;

use super::{RecordStore, StoreError};
use crate::record::Record;

/// Postgres `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl StoreError {
    /// Classify a sqlx error for a statement covering `batch_len` records
    pub fn from_sqlx(err: sqlx::Error, batch_len: usize) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                StoreError::Timeout("timed out acquiring a database connection".to_string())
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                // The whole statement was rolled back.
                StoreError::Conflict {
                    inserted: 0,
                    conflicts: batch_len as u64,
                }
            },
            sqlx::Error::Database(ref db_err) if db_err.code().as_deref() == Some(QUERY_CANCELED) => {
                StoreError::Timeout(err.to_string())
            },
            other => StoreError::Rejected(other.to_string()),
        }
    }
}

/// `LIMIT` is a signed bigint; anything larger means "no limit"
fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn bulk_insert(&self, records: &[Record]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO records (id, firstname, lastname, email, email2, profession) ",
        );

        query_builder.push_values(records.iter(), |mut b, record| {
            b.push_bind(record.id)
                .push_bind(record.firstname.as_str())
                .push_bind(record.lastname.as_str())
                .push_bind(record.email.as_str())
                .push_bind(record.email2.as_str())
                .push_bind(record.profession.as_str());
        });

        query_builder.push(" ON CONFLICT DO NOTHING");

        let result = query_builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::from_sqlx(e, records.len()))?;

        let inserted = result.rows_affected();
        let conflicts = (records.len() as u64).saturating_sub(inserted);
        debug!(inserted, conflicts, "Bulk insert executed");

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
        sqlx::query_as::<_, Record>(
            r#"
            SELECT id, firstname, lastname, email, email2, profession
            FROM records
            ORDER BY seq DESC
            LIMIT $1
            "#,
        )
        .bind(limit_param(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, 0))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_sqlx(e, 0))
    }
}
