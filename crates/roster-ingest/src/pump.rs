//! Streaming CSV → batch → insert driver
//!
//! A [`StreamPump`] owns one run. It pulls a row from the CSV reader, coerces
//! it, buffers it, and when the buffer fills it awaits the insert before it
//! polls the reader again. Because the reader is pull-based, not polling it is
//! what pauses the producer: at most one batch is ever in flight and the
//! buffered rows never exceed `batch_size`.
//!
//! ```text
//!            row / not full
//!           ┌──────────────┐
//!           ▼              │
//!        Running ──────────┘
//!         │   ▲ full             insert ok
//!         │   └──────────── PausedForFlush
//!         │  end of stream        │ insert error
//!         ▼                       ▼
//!    DrainingFinal ──────────► Failed ◄── stream error (any state)
//!         │ insert ok
//!         ▼
//!        Done
//! ```

use std::borrow::Cow;
use std::collections::HashMap;

use csv_async::{AsyncReader, AsyncReaderBuilder, ByteRecord};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::batch::BatchAccumulator;
use crate::coerce::{coerce, RawRow};
use crate::config::IngestConfig;
use crate::record::RECORD_FIELDS;
use crate::sink::{BatchSink, InsertError};

/// The input could not be read as CSV
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read CSV input: {0}")]
    Read(#[from] csv_async::Error),
}

/// Why a run ended in [`PumpState::Failed`]
#[derive(Debug, Error)]
pub enum PumpError {
    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error(transparent)]
    Insert(#[from] InsertError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PumpState {
    Running,
    PausedForFlush,
    DrainingFinal,
    Done,
    Failed,
}

impl PumpState {
    pub fn is_terminal(self) -> bool {
        matches!(self, PumpState::Done | PumpState::Failed)
    }
}

/// Per-run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    /// Every parsed row, whatever happened to it afterwards
    pub lines_seen: u64,
    /// Rows persisted, excluding duplicate conflicts
    pub records_inserted: u64,
    pub duplicates_absorbed: u64,
    /// Non-empty batches handed to the sink
    pub flushes: u64,
}

/// Terminal result of a run
#[derive(Debug)]
pub struct PumpOutcome {
    pub state: PumpState,
    pub counters: RunCounters,
    pub error: Option<PumpError>,
}

/// Header name → column position; the first occurrence of a name wins.
#[derive(Debug, Default)]
struct HeaderIndex(HashMap<String, usize>);

impl HeaderIndex {
    fn from_record(headers: &ByteRecord) -> Self {
        let mut index = HashMap::with_capacity(headers.len());
        for (pos, raw) in headers.iter().enumerate() {
            let name = String::from_utf8_lossy(raw);
            let name = name.trim_start_matches('\u{feff}').to_string();
            index.entry(name).or_insert(pos);
        }
        Self(index)
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        RECORD_FIELDS
            .iter()
            .copied()
            .filter(|field| !self.0.contains_key(*field))
            .collect()
    }
}

/// One CSV row viewed through its header
struct CsvRow<'a> {
    headers: &'a HeaderIndex,
    values: &'a ByteRecord,
}

impl RawRow for CsvRow<'_> {
    fn get(&self, field: &str) -> Option<Cow<'_, str>> {
        let pos = *self.headers.0.get(field)?;
        self.values.get(pos).map(String::from_utf8_lossy)
    }
}

pub struct StreamPump<'s, R> {
    reader: AsyncReader<R>,
    sink: &'s BatchSink,
    accumulator: BatchAccumulator,
    counters: RunCounters,
    state: PumpState,
    progress_interval: u64,
}

impl<'s, R> StreamPump<'s, R>
where
    R: AsyncRead + Unpin + Send,
{
    pub fn new(input: R, sink: &'s BatchSink, config: &IngestConfig) -> Self {
        let reader = AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .create_reader(input);

        Self {
            reader,
            sink,
            accumulator: BatchAccumulator::new(config.batch_size),
            counters: RunCounters::default(),
            state: PumpState::Running,
            progress_interval: config.progress_interval,
        }
    }

    pub fn state(&self) -> PumpState {
        self.state
    }

    /// Drive the run to a terminal state
    pub async fn run(mut self) -> PumpOutcome {
        let result = self.pump().await;

        let error = match result {
            Ok(()) => {
                self.transition(PumpState::Done);
                None
            },
            Err(e) => {
                self.transition(PumpState::Failed);
                Some(e)
            },
        };

        PumpOutcome {
            state: self.state,
            counters: self.counters,
            error,
        }
    }

    async fn pump(&mut self) -> Result<(), PumpError> {
        let headers = HeaderIndex::from_record(
            self.reader.byte_headers().await.map_err(StreamError::from)?,
        );
        let missing = headers.missing_fields();
        if !missing.is_empty() {
            warn!(?missing, "CSV header lacks record columns; they will use defaults");
        }

        let mut row = ByteRecord::new();

        while self
            .reader
            .read_byte_record(&mut row)
            .await
            .map_err(StreamError::from)?
        {
            self.counters.lines_seen += 1;
            if self.progress_interval > 0 && self.counters.lines_seen % self.progress_interval == 0
            {
                info!(
                    lines = self.counters.lines_seen,
                    inserted = self.counters.records_inserted,
                    "Ingestion progress"
                );
            }

            let record = coerce(&CsvRow {
                headers: &headers,
                values: &row,
            });

            if self.accumulator.add(record) {
                self.transition(PumpState::PausedForFlush);
                self.flush().await?;
                self.transition(PumpState::Running);
            }
        }

        self.transition(PumpState::DrainingFinal);
        self.flush().await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), InsertError> {
        let batch = self.accumulator.drain();
        if batch.is_empty() {
            return Ok(());
        }

        let batch_len = batch.len();
        let report = self.sink.insert(batch).await?;

        self.counters.flushes += 1;
        self.counters.records_inserted += report.inserted;
        self.counters.duplicates_absorbed += report.conflicts;

        debug!(
            flush = self.counters.flushes,
            batch_len,
            inserted = report.inserted,
            duplicates = report.conflicts,
            lines = self.counters.lines_seen,
            "Batch flushed"
        );
        Ok(())
    }

    fn transition(&mut self, next: PumpState) {
        debug_assert!(!self.state.is_terminal(), "transition out of terminal state");
        debug!(from = ?self.state, to = ?next, "Pump state change");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn csv(rows: usize) -> String {
        let mut out = String::from("id,firstname,lastname,email,email2,profession\n");
        for i in 1..=rows {
            out.push_str(&format!("{i},First{i},Last{i},u{i}@example.com,,Engineer\n"));
        }
        out
    }

    async fn run(input: &str, batch_size: usize, store: Arc<MemoryStore>) -> PumpOutcome {
        let sink = BatchSink::new(store);
        let config = IngestConfig::default().with_batch_size(batch_size);
        StreamPump::new(input.as_bytes(), &sink, &config).run().await
    }

    #[tokio::test]
    async fn test_counts_rows_and_inserts() {
        let store = Arc::new(MemoryStore::new());
        let outcome = run(&csv(7), 3, store.clone()).await;

        assert_eq!(outcome.state, PumpState::Done);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.counters.lines_seen, 7);
        assert_eq!(outcome.counters.records_inserted, 7);
        assert_eq!(outcome.counters.flushes, 3);
        assert_eq!(store.batch_sizes(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_header_only_input() {
        let store = Arc::new(MemoryStore::new());
        let outcome = run(&csv(0), 3, store.clone()).await;

        assert_eq!(outcome.state, PumpState::Done);
        assert_eq!(outcome.counters, RunCounters::default());
        assert_eq!(store.insert_calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let store = Arc::new(MemoryStore::new());
        let outcome = run("", 3, store.clone()).await;

        assert_eq!(outcome.state, PumpState::Done);
        assert_eq!(outcome.counters.lines_seen, 0);
    }

    #[tokio::test]
    async fn test_columns_matched_by_header_name() {
        let store = Arc::new(MemoryStore::new());
        let input = "\u{feff}profession,id,nickname\nPilot,9,Ace\n";
        let outcome = run(input, 10, store.clone()).await;

        assert_eq!(outcome.state, PumpState::Done);
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, 9);
        assert_eq!(records[0].profession, "Pilot");
        assert_eq!(records[0].firstname, "");
    }

    #[test]
    fn test_header_index_reports_missing_fields() {
        let mut headers = ByteRecord::new();
        headers.push_field(b"\xef\xbb\xbfid");
        headers.push_field(b"email");
        headers.push_field(b"email");

        let index = HeaderIndex::from_record(&headers);
        assert_eq!(index.0.get("id"), Some(&0));
        assert_eq!(index.0.get("email"), Some(&1));
        assert_eq!(
            index.missing_fields(),
            vec!["firstname", "lastname", "email2", "profession"]
        );
    }

    #[tokio::test]
    async fn test_ragged_rows_are_accepted() {
        let store = Arc::new(MemoryStore::new());
        let input = "id,firstname,lastname\n1,Ann\n2,Bob,Builder,extra\n";
        let outcome = run(input, 10, store.clone()).await;

        assert_eq!(outcome.state, PumpState::Done);
        assert_eq!(outcome.counters.lines_seen, 2);
        assert_eq!(store.records()[0].lastname, "");
        assert_eq!(store.records()[1].lastname, "Builder");
    }

    #[tokio::test]
    async fn test_insert_failure_stops_reading() {
        let store = Arc::new(MemoryStore::failing_after(1));
        let outcome = run(&csv(10), 2, store.clone()).await;

        assert_eq!(outcome.state, PumpState::Failed);
        assert!(matches!(outcome.error, Some(PumpError::Insert(_))));
        assert_eq!(outcome.counters.lines_seen, 4);
        assert_eq!(outcome.counters.records_inserted, 2);
        assert_eq!(store.insert_calls(), 2);
    }

    #[test]
    fn test_terminal_states() {
        assert!(PumpState::Done.is_terminal());
        assert!(PumpState::Failed.is_terminal());
        assert!(!PumpState::PausedForFlush.is_terminal());
    }
}
