//! Per-run collection of derived topic records.

use crate::types::TopicRecord;

/// Collects records for one run until they are flushed to a sink.
#[derive(Debug, Default)]
pub struct TopicAccumulator {
    records: Vec<TopicRecord>,
}

impl TopicAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: TopicRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = TopicRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[TopicRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand over every record and leave the accumulator empty.
    pub fn drain(&mut self) -> Vec<TopicRecord> {
        std::mem::take(&mut self.records)
    }
}
