//! The `TopicSink` trait and the report a merge produces.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::SinkError;
use crate::types::TopicRecord;

/// A record the sink refused to stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// Position in the batch passed to `merge`.
    pub index: usize,
    pub topic: String,
    pub reason: String,
}

/// Result of merging one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Rows that made it into the staging area.
    pub staged: usize,
    /// Staged rows that did not match an existing key.
    pub inserted: usize,
    /// Staged rows that overwrote an existing key.
    pub updated: usize,
    pub rejected: Vec<RejectedRow>,
}

impl MergeReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

/// Destination for derived topic records.
///
/// `merge` upserts on `(topic, topic_length, data_length)`: matching rows get
/// `source_contract`, `name` and `abi` overwritten, others are inserted. The
/// batch becomes visible atomically. Callers must not retry a failed merge.
#[async_trait]
pub trait TopicSink: Send + Sync {
    async fn merge(&self, records: &[TopicRecord]) -> Result<MergeReport, SinkError>;

    /// Backend name for logs, e.g. `"sqlite"`.
    fn backend(&self) -> &'static str;
}
