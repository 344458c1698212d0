//! abitopics-warehouse: durable sinks for derived topic records.
//!
//! Backends:
//! - [`memory`]: in-memory (tests, dry runs)
//! - [`sqlite`]: SQLite via `sqlx` (default feature)
//! - [`postgres`]: PostgreSQL via `sqlx` (feature `postgres`)
//!
//! Every backend implements [`TopicSink`]: rows are staged in a
//! connection-scoped temporary table and upserted into the permanent table on
//! `(topic, topic_length, data_length)` inside one transaction.

pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use serde::{Deserialize, Serialize};

use abitopics_core::{SinkError, TopicRecord, TopicSink};

pub use memory::MemorySink;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSink;

#[cfg(feature = "postgres")]
pub use postgres::PostgresSink;

/// Default permanent table name.
pub const DEFAULT_TABLE: &str = "topic_abis";

/// Name of the per-merge staging table.
pub(crate) const STAGING_TABLE: &str = "abitopics_staging";

/// Where merged records go.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// `sqlite:<path>`, `postgres://…` or `memory:`.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_url() -> String { "sqlite:./topic_abis.db".into() }
fn default_table() -> String { DEFAULT_TABLE.into() }

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            table: default_table(),
        }
    }
}

/// Open the sink matching `url`'s scheme and make sure `table` exists.
pub async fn open_sink(url: &str, table: &str) -> Result<Box<dyn TopicSink>, SinkError> {
    validate_table_name(table)?;

    if url == "memory:" || url.starts_with("memory://") {
        return Ok(Box::new(MemorySink::new()));
    }

    #[cfg(feature = "sqlite")]
    if url.starts_with("sqlite:") {
        return Ok(Box::new(SqliteSink::open(url, table).await?));
    }

    #[cfg(feature = "postgres")]
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        return Ok(Box::new(PostgresSink::connect(url, table).await?));
    }

    Err(SinkError::UnsupportedUrl {
        url: redact_url(url),
    })
}

/// Accepts `name` or `schema.name`, each part `[A-Za-z_][A-Za-z0-9_]*`.
pub fn validate_table_name(name: &str) -> Result<(), SinkError> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(SinkError::InvalidTable {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Row-level checks, mirrored by the staging table's CHECK constraints.
pub fn validate_record(record: &TopicRecord) -> Result<(), String> {
    let topic = record.topic.as_hex();
    if topic.len() != 66 || !topic.starts_with("0x") {
        return Err(format!("topic is not 0x + 64 hex digits: {topic}"));
    }
    if record.name.is_empty() {
        return Err("event name is empty".into());
    }
    if record.topic_length < 1 {
        return Err("topic_length must be at least 1".into());
    }
    if record.data_length < 2 || (record.data_length - 2) % 64 != 0 {
        return Err(format!("data_length {} is not 2 + 64·n", record.data_length));
    }
    Ok(())
}

/// Staging failures that reject one row. Anything else aborts the merge.
#[cfg(any(feature = "sqlite", feature = "postgres"))]
pub(crate) fn is_row_rejection(kind: sqlx::error::ErrorKind) -> bool {
    use sqlx::error::ErrorKind;
    matches!(kind, ErrorKind::CheckViolation | ErrorKind::NotNullViolation)
}

/// Strip credentials before a URL reaches an error message.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
