//! FIFO queue of records awaiting delivery.

use std::collections::VecDeque;

use crate::log_record::LogRecord;

/// Append-at-tail, drain-from-head queue.
///
/// There is no capacity ceiling; growth is only unbounded while delivery is
/// permanently blocked.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    records: VecDeque<LogRecord>,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: LogRecord) {
        self.records.push_back(record);
    }

    /// Remove up to `max` records from the head, oldest first.
    pub fn drain_chunk(&mut self, max: usize) -> Vec<LogRecord> {
        let take = max.min(self.records.len());
        self.records.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
