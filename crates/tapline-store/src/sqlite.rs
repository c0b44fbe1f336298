// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! SQLite history sink backed by sqlx.
//!
//! One `measurements` table holds every point: UTC epoch milliseconds
//! as INTEGER, the node id as TEXT, and the value as the canonical
//! tagged JSON of [`TagValue`]. The `(node_id, ts DESC)` index serves
//! both the range scan and the last-N query.
//!
//! The pool runs WAL journal mode with NORMAL synchronous, the same
//! durability/concurrency point the rest of the system assumes: a
//! flush that returned `Ok` survives process restart.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::{debug, info, warn};

use tapline_core::convert::from_epoch_millis;
use tapline_core::error::{StoreError, StoreResult};
use tapline_core::types::TagValue;

use crate::sink::{HistoryPoint, HistorySink};

/// Maximum connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Pool acquire timeout.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Measurements table.
const MEASUREMENTS_TABLE_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS measurements (
    ts      INTEGER NOT NULL,
    node_id TEXT    NOT NULL,
    value   TEXT    NOT NULL
);
"#;

/// Covering index for per-node time scans, newest first.
const MEASUREMENTS_INDEX_DDL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_measurements_node_ts
    ON measurements (node_id, ts DESC);
"#;

/// SQLite-backed [`HistorySink`].
#[derive(Clone)]
pub struct SqliteHistorySink {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteHistorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteHistorySink").finish_non_exhaustive()
    }
}

impl SqliteHistorySink {
    /// Connects to a SQLite database.
    ///
    /// `url` is an sqlx SQLite URL such as `sqlite://data/history.db`.
    /// The database file is created when missing; WAL journal mode and
    /// NORMAL synchronous are applied to every connection.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| StoreError::connection_failed(format!("invalid url '{}': {}", url, e)))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connection_failed(e.to_string()))?;

        info!(url, "sqlite history sink connected");
        Ok(Self { pool })
    }

    /// Opens an in-memory database, schema applied.
    ///
    /// The pool is pinned to a single connection that never expires;
    /// an in-memory database lives and dies with its connection.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::connection_failed(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::connection_failed(e.to_string()))?;

        let sink = Self { pool };
        sink.ensure_schema().await?;
        Ok(sink)
    }

    /// Returns `true` once the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    fn decode_row(node_id: &str, ts: i64, text: &str) -> StoreResult<HistoryPoint> {
        let when = from_epoch_millis(ts)?;
        let value = match serde_json::from_str::<TagValue>(text) {
            Ok(value) => value,
            Err(e) => {
                // Rows written by other tools still read back.
                warn!(node_id, ts, error = %e, "unparseable stored value, returning raw text");
                TagValue::Str(text.to_string())
            }
        };
        Ok(HistoryPoint::new(node_id, when, value))
    }
}

#[async_trait]
impl HistorySink for SqliteHistorySink {
    async fn ensure_schema(&self) -> StoreResult<()> {
        sqlx::query(MEASUREMENTS_TABLE_DDL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::schema_failed(e.to_string()))?;
        sqlx::query(MEASUREMENTS_INDEX_DDL)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::schema_failed(e.to_string()))?;
        debug!("measurements schema ready");
        Ok(())
    }

    async fn insert_batch(&self, points: &[HistoryPoint]) -> StoreResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::write_failure(e.to_string()))?;

        for point in points {
            let value_text = serde_json::to_string(&point.value)
                .map_err(|e| StoreError::write_failure(e.to_string()))?;
            sqlx::query("INSERT INTO measurements (ts, node_id, value) VALUES (?1, ?2, ?3)")
                .bind(point.epoch_millis())
                .bind(&point.node_id)
                .bind(value_text)
                .execute(&mut *tx)
                .await
                .map_err(|e| StoreError::write_failure(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::write_failure(e.to_string()))?;
        Ok(())
    }

    async fn query_range(
        &self,
        node_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Option<Duration>,
    ) -> StoreResult<Vec<HistoryPoint>> {
        let start_ms = start.timestamp_millis();
        let end_ms = end.timestamp_millis();

        let rows: Vec<(i64, String)> = match bucket {
            // SQLite keeps the bare `value` column from the row that
            // produced MAX(ts), which is exactly newest-per-bucket.
            Some(width) if width.as_millis() > 0 => sqlx::query_as(
                r#"
                SELECT MAX(ts) AS ts, value
                FROM measurements
                WHERE node_id = ?1 AND ts >= ?2 AND ts <= ?3
                GROUP BY ts / ?4
                ORDER BY ts ASC
                "#,
            )
            .bind(node_id)
            .bind(start_ms)
            .bind(end_ms)
            .bind(width.as_millis() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::query_failed(e.to_string()))?,
            _ => sqlx::query_as(
                r#"
                SELECT ts, value
                FROM measurements
                WHERE node_id = ?1 AND ts >= ?2 AND ts <= ?3
                ORDER BY ts ASC
                "#,
            )
            .bind(node_id)
            .bind(start_ms)
            .bind(end_ms)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::query_failed(e.to_string()))?,
        };

        rows.into_iter()
            .map(|(ts, text)| Self::decode_row(node_id, ts, &text))
            .collect()
    }

    async fn query_last_n(&self, node_id: &str, n: u32) -> StoreResult<Vec<HistoryPoint>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT ts, value
            FROM measurements
            WHERE node_id = ?1
            ORDER BY ts DESC
            LIMIT ?2
            "#,
        )
        .bind(node_id)
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::query_failed(e.to_string()))?;

        rows.into_iter()
            .map(|(ts, text)| Self::decode_row(node_id, ts, &text))
            .collect()
    }

    fn name(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn point(node: &str, secs: i64, value: TagValue) -> HistoryPoint {
        HistoryPoint::new(node, at(secs), value)
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let sink = SqliteHistorySink::in_memory().await.unwrap();
        sink.ensure_schema().await.unwrap();
        sink.ensure_schema().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_query_round_trip() {
        let sink = SqliteHistorySink::in_memory().await.unwrap();
        sink.insert_batch(&[
            point("n1", 10, TagValue::Int(1)),
            point("n1", 20, TagValue::Float(2.5)),
            point("n1", 30, TagValue::Str("run".to_string())),
            point("n1", 40, TagValue::Bool(true)),
            point("n1", 50, TagValue::Null),
            point("n2", 25, TagValue::Int(99)),
        ])
        .await
        .unwrap();

        let rows = sink.query_range("n1", at(0), at(60), None).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].value, TagValue::Int(1));
        assert_eq!(rows[1].value, TagValue::Float(2.5));
        assert_eq!(rows[2].value, TagValue::Str("run".to_string()));
        assert_eq!(rows[3].value, TagValue::Bool(true));
        assert_eq!(rows[4].value, TagValue::Null);
        assert_eq!(rows[0].ts, at(10));
    }

    #[tokio::test]
    async fn test_range_bounds_are_inclusive() {
        let sink = SqliteHistorySink::in_memory().await.unwrap();
        sink.insert_batch(&[
            point("n1", 10, TagValue::Int(1)),
            point("n1", 20, TagValue::Int(2)),
            point("n1", 30, TagValue::Int(3)),
        ])
        .await
        .unwrap();

        let rows = sink.query_range("n1", at(10), at(20), None).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn test_bucketed_query_keeps_newest_per_bucket() {
        let sink = SqliteHistorySink::in_memory().await.unwrap();
        sink.insert_batch(&[
            point("n1", 5, TagValue::Int(1)),
            point("n1", 50, TagValue::Int(2)),
            point("n1", 70, TagValue::Int(3)),
            point("n1", 130, TagValue::Int(4)),
        ])
        .await
        .unwrap();

        let rows = sink
            .query_range("n1", at(0), at(200), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].value, TagValue::Int(2));
        assert_eq!(rows[0].ts, at(50));
        assert_eq!(rows[1].value, TagValue::Int(3));
        assert_eq!(rows[2].value, TagValue::Int(4));
    }

    #[tokio::test]
    async fn test_last_n_newest_first() {
        let sink = SqliteHistorySink::in_memory().await.unwrap();
        sink.insert_batch(&[
            point("n1", 10, TagValue::Int(1)),
            point("n1", 30, TagValue::Int(3)),
            point("n1", 20, TagValue::Int(2)),
        ])
        .await
        .unwrap();

        let rows = sink.query_last_n("n1", 2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value, TagValue::Int(3));
        assert_eq!(rows[1].value, TagValue::Int(2));

        let all = sink.query_last_n("n1", 10).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_node_returns_empty() {
        let sink = SqliteHistorySink::in_memory().await.unwrap();
        sink.insert_batch(&[point("n1", 10, TagValue::Int(1))])
            .await
            .unwrap();

        assert!(sink
            .query_range("missing", at(0), at(60), None)
            .await
            .unwrap()
            .is_empty());
        assert!(sink.query_last_n("missing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let sink = SqliteHistorySink::in_memory().await.unwrap();
        sink.insert_batch(&[]).await.unwrap();
        assert!(sink.query_last_n("n1", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_backed_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/history.db", dir.path().display());

        {
            let sink = SqliteHistorySink::connect(&url).await.unwrap();
            sink.ensure_schema().await.unwrap();
            sink.insert_batch(&[point("n1", 10, TagValue::Int(7))])
                .await
                .unwrap();
            sink.close().await;
            assert!(sink.is_closed());
        }

        let sink = SqliteHistorySink::connect(&url).await.unwrap();
        let rows = sink.query_last_n("n1", 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, TagValue::Int(7));
    }
}
