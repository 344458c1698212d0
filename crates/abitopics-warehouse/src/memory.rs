//! In-memory sink.
//!
//! Keeps the merged table in a map keyed by `(topic, topic_length,
//! data_length)`. Useful for tests and dry runs that don't need persistence.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use abitopics_core::{MergeReport, RejectedRow, SinkError, TopicRecord, TopicSink};

use crate::validate_record;

type NaturalKey = (String, u32, u32);

/// In-memory topic table.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<NaturalKey, TopicRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current table contents, ordered by natural key.
    pub fn rows(&self) -> Vec<TopicRecord> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn key_of(record: &TopicRecord) -> NaturalKey {
    let (topic, topic_length, data_length) = record.natural_key();
    (topic.as_hex().to_string(), topic_length, data_length)
}

#[async_trait]
impl TopicSink for MemorySink {
    async fn merge(&self, records: &[TopicRecord]) -> Result<MergeReport, SinkError> {
        let mut report = MergeReport::default();

        // stage: later duplicates win, like the SQL backends
        let mut staged: BTreeMap<NaturalKey, TopicRecord> = BTreeMap::new();
        for (index, record) in records.iter().enumerate() {
            match validate_record(record) {
                Ok(()) => {
                    staged.insert(key_of(record), record.clone());
                }
                Err(reason) => report.rejected.push(RejectedRow {
                    index,
                    topic: record.topic.to_string(),
                    reason,
                }),
            }
        }
        report.staged = staged.len();

        let mut rows = self.rows.lock().unwrap();
        for (key, record) in staged {
            if rows.insert(key, record).is_some() {
                report.updated += 1;
            } else {
                report.inserted += 1;
            }
        }

        tracing::debug!(
            staged = report.staged,
            inserted = report.inserted,
            updated = report.updated,
            rejected = report.rejected.len(),
            "memory merge complete"
        );
        Ok(report)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abitopics_core::TopicHash;

    fn record(topic_byte: u8, name: &str, source: &str) -> TopicRecord {
        TopicRecord {
            topic: TopicHash::from_digest([topic_byte; 32]),
            source_contract: source.into(),
            name: name.into(),
            abi_json: format!("{{\"name\":\"{name}\"}}"),
            topic_length: 2,
            data_length: 66,
        }
    }

    #[tokio::test]
    async fn merge_inserts_then_updates() {
        let sink = MemorySink::new();
        let first = sink.merge(&[record(1, "A", "0xaa"), record(2, "B", "0xaa")]).await.unwrap();
        assert_eq!((first.inserted, first.updated), (2, 0));

        let second = sink.merge(&[record(1, "A2", "0xbb")]).await.unwrap();
        assert_eq!((second.inserted, second.updated), (0, 1));

        let rows = sink.rows();
        assert_eq!(rows.len(), 2);
        let a = rows.iter().find(|r| r.topic == TopicHash::from_digest([1; 32])).unwrap();
        assert_eq!(a.name, "A2");
        assert_eq!(a.source_contract, "0xbb");
    }

    #[tokio::test]
    async fn merging_twice_is_idempotent() {
        let sink = MemorySink::new();
        let batch = [record(1, "A", "0xaa"), record(2, "B", "0xaa")];
        sink.merge(&batch).await.unwrap();
        let before = sink.rows();
        sink.merge(&batch).await.unwrap();
        assert_eq!(sink.rows(), before);
    }

    #[tokio::test]
    async fn same_topic_with_other_lengths_is_a_separate_row() {
        let sink = MemorySink::new();
        let mut wider = record(1, "A", "0xaa");
        wider.data_length = 130;
        sink.merge(&[record(1, "A", "0xaa"), wider]).await.unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn invalid_rows_are_reported_and_the_rest_merged() {
        let sink = MemorySink::new();
        let mut bad = record(2, "B", "0xaa");
        bad.data_length = 3;
        let report = sink.merge(&[record(1, "A", "0xaa"), bad]).await.unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.rejected[0].index, 1);
        assert_eq!(sink.len(), 1);
    }
}
