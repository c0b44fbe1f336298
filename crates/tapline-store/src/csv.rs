// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Append-only CSV sink.
//!
//! Writes `ts,node_id,value` rows with the header emitted once when
//! the file is empty. This sink is an export surface, not a database:
//! both query operations return [`StoreError::Unsupported`] and the
//! caller decides how to surface that.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use tapline_core::error::{StoreError, StoreResult};

use crate::sink::{HistoryPoint, HistorySink};

const HEADER: &str = "ts,node_id,value";

/// Quotes a CSV field when it contains a delimiter, quote, or newline.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// CSV-file [`HistorySink`].
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    // One writer at a time; keeps header detection and row appends
    // from interleaving.
    io_lock: Mutex<()>,
}

impl CsvSink {
    /// Creates a sink writing to `path`. Nothing is touched until the
    /// first schema or insert call.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    /// Returns the output path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, body: &str) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| StoreError::write_failure(format!("open {}: {}", self.path.display(), e)))?;

        let len = file
            .metadata()
            .await
            .map_err(|e| StoreError::write_failure(e.to_string()))?
            .len();

        let mut out = String::new();
        if len == 0 {
            out.push_str(HEADER);
            out.push('\n');
        }
        out.push_str(body);

        file.write_all(out.as_bytes())
            .await
            .map_err(|e| StoreError::write_failure(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| StoreError::write_failure(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl HistorySink for CsvSink {
    async fn ensure_schema(&self) -> StoreResult<()> {
        let _guard = self.io_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::schema_failed(format!("create {}: {}", parent.display(), e)))?;
            }
        }
        self.append("").await.map_err(|e| match e {
            StoreError::WriteFailure { message } => StoreError::SchemaFailed { message },
            other => other,
        })?;
        debug!(path = %self.path.display(), "csv sink ready");
        Ok(())
    }

    async fn insert_batch(&self, points: &[HistoryPoint]) -> StoreResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut body = String::with_capacity(points.len() * 48);
        for point in points {
            let value_text = serde_json::to_string(&point.value)
                .map_err(|e| StoreError::write_failure(e.to_string()))?;
            body.push_str(&point.ts.to_rfc3339_opts(SecondsFormat::Millis, true));
            body.push(',');
            body.push_str(&csv_escape(&point.node_id));
            body.push(',');
            body.push_str(&csv_escape(&value_text));
            body.push('\n');
        }

        let _guard = self.io_lock.lock().await;
        self.append(&body).await
    }

    async fn query_range(
        &self,
        _node_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _bucket: Option<Duration>,
    ) -> StoreResult<Vec<HistoryPoint>> {
        Err(StoreError::unsupported("csv", "query_range"))
    }

    async fn query_last_n(&self, _node_id: &str, _n: u32) -> StoreResult<Vec<HistoryPoint>> {
        Err(StoreError::unsupported("csv", "query_last_n"))
    }

    fn name(&self) -> &str {
        "csv"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tapline_core::types::TagValue;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[tokio::test]
    async fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let sink = CsvSink::new(&path);

        sink.ensure_schema().await.unwrap();
        sink.insert_batch(&[HistoryPoint::new("n1", at(10), TagValue::Int(1))])
            .await
            .unwrap();
        sink.insert_batch(&[HistoryPoint::new("n1", at(20), TagValue::Int(2))])
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let headers = text.lines().filter(|l| *l == HEADER).count();
        assert_eq!(headers, 1);
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().starts_with("1970-01-01T00:00:10.000Z,n1,"));
    }

    #[tokio::test]
    async fn test_insert_without_schema_call_still_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let sink = CsvSink::new(&path);

        sink.insert_batch(&[HistoryPoint::new("n1", at(10), TagValue::Bool(true))])
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(HEADER));
    }

    #[tokio::test]
    async fn test_fields_are_escaped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let sink = CsvSink::new(&path);

        sink.insert_batch(&[HistoryPoint::new(
            "n,1",
            at(10),
            TagValue::Str("say \"hi\", twice".to_string()),
        )])
        .await
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert!(row.contains("\"n,1\""));
        // The JSON value text holds quotes and a comma, so the whole
        // field is quoted with doubled quotes inside.
        assert!(row.contains("\"\""));
    }

    #[tokio::test]
    async fn test_schema_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/export.csv");
        let sink = CsvSink::new(&path);

        sink.ensure_schema().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_queries_are_unsupported() {
        let sink = CsvSink::new("unused.csv");

        let err = sink.query_range("n1", at(0), at(10), None).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported { .. }));
        assert_eq!(err.error_type(), "unsupported");

        let err = sink.query_last_n("n1", 5).await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported { .. }));
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("a\"b"), "\"a\"\"b\"");
        assert_eq!(csv_escape("line\nbreak"), "\"line\nbreak\"");
    }
}
