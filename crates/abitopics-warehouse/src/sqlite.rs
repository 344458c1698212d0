//! SQLite sink.
//!
//! Each merge runs in one transaction on one pooled connection: a `TEMP`
//! staging table is created, rows are staged one at a time (CHECK failures are
//! collected, not fatal), the staging table is upserted into the permanent
//! table and dropped, then the transaction commits. Temp tables are private to
//! the connection, so a crashed merge leaves nothing behind.
//!
//! # Usage
//! ```rust,no_run
//! use abitopics_warehouse::sqlite::SqliteSink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let sink = SqliteSink::open("./topic_abis.db", "topic_abis").await?;
//!
//! // In-memory (tests / dry runs)
//! let sink = SqliteSink::in_memory("topic_abis").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use abitopics_core::{MergeReport, RejectedRow, SinkError, TopicHash, TopicRecord, TopicSink};

use crate::{is_row_rejection, validate_table_name, STAGING_TABLE};

fn db_err(e: sqlx::Error) -> SinkError {
    SinkError::Database(e.to_string())
}

/// SQLite-backed topic table.
pub struct SqliteSink {
    pool: SqlitePool,
    table: String,
}

impl SqliteSink {
    /// Open (or create) a SQLite database at `path` and ensure `table` exists.
    ///
    /// The path may be a plain file path (`"./topic_abis.db"`) or a full
    /// SQLite URL (`"sqlite:./topic_abis.db?mode=rwc"`).
    pub async fn open(path: &str, table: &str) -> Result<Self, SinkError> {
        validate_table_name(table)?;
        if path.ends_with(":memory:") {
            return Self::in_memory(table).await;
        }
        let url = if path.starts_with("sqlite:") {
            if path.contains('?') {
                path.to_string()
            } else {
                format!("{path}?mode=rwc")
            }
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(db_err)?;

        let sink = Self {
            pool,
            table: table.to_string(),
        };
        sink.init_schema(true).await?;
        info!(table, "sqlite warehouse ready");
        Ok(sink)
    }

    /// Open an in-memory SQLite database.
    ///
    /// A single long-lived connection backs the pool, so every merge sees the
    /// same database. All data is lost when the sink is dropped.
    pub async fn in_memory(table: &str) -> Result<Self, SinkError> {
        validate_table_name(table)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let sink = Self {
            pool,
            table: table.to_string(),
        };
        sink.init_schema(false).await?;
        Ok(sink)
    }

    /// Create the permanent table.
    async fn init_schema(&self, wal: bool) -> Result<(), SinkError> {
        if wal {
            sqlx::query("PRAGMA journal_mode=WAL;")
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
        }

        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                topic           TEXT    NOT NULL,
                source_contract TEXT    NOT NULL,
                name            TEXT    NOT NULL,
                abi             TEXT    NOT NULL,
                topic_length    INTEGER NOT NULL,
                data_length     INTEGER NOT NULL,
                PRIMARY KEY (topic, topic_length, data_length)
            );",
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Current table contents, ordered by natural key.
    pub async fn rows(&self) -> Result<Vec<TopicRecord>, SinkError> {
        let rows = sqlx::query(&format!(
            "SELECT topic, source_contract, name, abi, topic_length, data_length
             FROM {} ORDER BY topic, topic_length, data_length",
            self.table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let topic: String = row.get("topic");
            let topic = TopicHash::parse(&topic).ok_or_else(|| {
                SinkError::Database(format!("stored topic is not a 32-byte hash: {topic}"))
            })?;
            records.push(TopicRecord {
                topic,
                source_contract: row.get("source_contract"),
                name: row.get("name"),
                abi_json: row.get("abi"),
                topic_length: row.get::<i64, _>("topic_length") as u32,
                data_length: row.get::<i64, _>("data_length") as u32,
            });
        }
        Ok(records)
    }

    /// Number of rows in the permanent table.
    pub async fn row_count(&self) -> Result<u64, SinkError> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

#[async_trait]
impl TopicSink for SqliteSink {
    async fn merge(&self, records: &[TopicRecord]) -> Result<MergeReport, SinkError> {
        let mut report = MergeReport::default();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(&format!("DROP TABLE IF EXISTS temp.{STAGING_TABLE}"))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query(&format!(
            "CREATE TEMP TABLE {STAGING_TABLE} (
                topic           TEXT    NOT NULL CHECK (length(topic) = 66 AND substr(topic, 1, 2) = '0x'),
                source_contract TEXT    NOT NULL,
                name            TEXT    NOT NULL CHECK (length(name) > 0),
                abi             TEXT    NOT NULL,
                topic_length    INTEGER NOT NULL CHECK (topic_length >= 1),
                data_length     INTEGER NOT NULL CHECK (data_length >= 2 AND (data_length - 2) % 64 = 0),
                PRIMARY KEY (topic, topic_length, data_length)
            );"
        ))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for (index, record) in records.iter().enumerate() {
            let staged = sqlx::query(&format!(
                "INSERT INTO temp.{STAGING_TABLE}
                 (topic, source_contract, name, abi, topic_length, data_length)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT (topic, topic_length, data_length) DO UPDATE SET
                    source_contract = excluded.source_contract,
                    name            = excluded.name,
                    abi             = excluded.abi"
            ))
            .bind(record.topic.as_hex())
            .bind(&record.source_contract)
            .bind(&record.name)
            .bind(&record.abi_json)
            .bind(record.topic_length as i64)
            .bind(record.data_length as i64)
            .execute(&mut *tx)
            .await;

            match staged {
                Ok(_) => {}
                // constraint failures abort the statement only
                Err(sqlx::Error::Database(e)) if is_row_rejection(e.kind()) => {
                    warn!(index, topic = %record.topic, error = %e, "row rejected by staging table");
                    report.rejected.push(RejectedRow {
                        index,
                        topic: record.topic.to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(db_err(e)),
            }
        }

        let staged: i64 = sqlx::query(&format!("SELECT COUNT(*) AS cnt FROM temp.{STAGING_TABLE}"))
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?
            .get("cnt");

        let updated: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS cnt FROM temp.{STAGING_TABLE} s
             WHERE EXISTS (
                SELECT 1 FROM {table} t
                WHERE t.topic = s.topic
                  AND t.topic_length = s.topic_length
                  AND t.data_length = s.data_length
             )",
            table = self.table
        ))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?
        .get("cnt");

        // `WHERE true` keeps SQLite from reading ON CONFLICT as a join clause
        sqlx::query(&format!(
            "INSERT INTO {table}
             (topic, source_contract, name, abi, topic_length, data_length)
             SELECT topic, source_contract, name, abi, topic_length, data_length
             FROM temp.{STAGING_TABLE} WHERE true
             ON CONFLICT (topic, topic_length, data_length) DO UPDATE SET
                source_contract = excluded.source_contract,
                name            = excluded.name,
                abi             = excluded.abi",
            table = self.table
        ))
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(&format!("DROP TABLE temp.{STAGING_TABLE}"))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        report.staged = staged as usize;
        report.updated = updated as usize;
        report.inserted = report.staged - report.updated;

        debug!(
            table = %self.table,
            staged = report.staged,
            inserted = report.inserted,
            updated = report.updated,
            rejected = report.rejected.len(),
            "sqlite merge complete"
        );
        Ok(report)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
