//! Batch accumulation

use crate::record::Record;

/// Default number of records per bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// An ordered group of records handed to the sink as a unit
///
/// Once built a batch can only be read.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Batch(Vec<Record>);

impl Batch {
    pub fn records(&self) -> &[Record] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Record>> for Batch {
    fn from(records: Vec<Record>) -> Self {
        Self(records)
    }
}

/// Buffers records until `batch_size` is reached
#[derive(Debug)]
pub struct BatchAccumulator {
    buffer: Vec<Record>,
    batch_size: usize,
}

impl BatchAccumulator {
    /// `batch_size` of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            buffer: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Append a record; returns `true` once the buffer is full
    pub fn add(&mut self, record: Record) -> bool {
        self.buffer.push(record);
        self.is_full()
    }

    /// Take the buffered records and start a fresh buffer
    pub fn drain(&mut self) -> Batch {
        Batch(std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(self.batch_size),
        ))
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.batch_size
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

impl Default for BatchAccumulator {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}
