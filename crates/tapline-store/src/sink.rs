// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! History sink contract and the in-memory reference sink.
//!
//! A sink persists batches of [`HistoryPoint`]s and answers range and
//! last-N queries. Not every sink can query: append-only sinks return
//! [`StoreError::Unsupported`] for the read operations and the callers
//! surface that as-is.
//!
//! # Bucketing
//!
//! `query_range` with a bucket width groups rows by
//! `epoch_millis / bucket_millis` and keeps the newest row of each
//! bucket, returned in ascending time order. This is the downsampling
//! contract every queryable sink implements.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use tapline_core::error::{StoreError, StoreResult};
use tapline_core::types::{ChangeRecord, TagValue};

// =============================================================================
// HistoryPoint
// =============================================================================

/// One stored measurement: a node, a UTC timestamp, and a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// Node identifier the value belongs to.
    pub node_id: String,
    /// Measurement timestamp.
    pub ts: DateTime<Utc>,
    /// Measured value.
    pub value: TagValue,
}

impl HistoryPoint {
    /// Creates a point.
    pub fn new(node_id: impl Into<String>, ts: DateTime<Utc>, value: TagValue) -> Self {
        Self {
            node_id: node_id.into(),
            ts,
            value,
        }
    }

    /// Builds a point from a change record, using the record's best
    /// available timestamp (source, then server, then observed).
    pub fn from_record(record: &ChangeRecord) -> Self {
        Self {
            node_id: record.node_id.clone(),
            ts: record.best_time(),
            value: record.value.clone(),
        }
    }

    /// Timestamp as UTC epoch milliseconds, the storage resolution.
    #[inline]
    pub fn epoch_millis(&self) -> i64 {
        self.ts.timestamp_millis()
    }
}

// =============================================================================
// HistorySink
// =============================================================================

/// Persistence contract for measurement history.
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Creates tables, files, or directories the sink needs. Called
    /// once before the first insert; must be idempotent.
    async fn ensure_schema(&self) -> StoreResult<()>;

    /// Persists a batch atomically where the backend allows it. An
    /// empty batch is a no-op.
    async fn insert_batch(&self, points: &[HistoryPoint]) -> StoreResult<()>;

    /// Returns points for `node_id` in `[start, end]`, ascending by
    /// time. With a bucket width, only the newest point per bucket.
    async fn query_range(
        &self,
        node_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Option<Duration>,
    ) -> StoreResult<Vec<HistoryPoint>>;

    /// Returns the `n` most recent points for `node_id`, newest first.
    async fn query_last_n(&self, node_id: &str, n: u32) -> StoreResult<Vec<HistoryPoint>>;

    /// Sink name used in logs and error messages.
    fn name(&self) -> &str;

    /// Releases backend resources. Default does nothing.
    async fn close(&self) {}
}

/// Keeps the newest point per time bucket, ascending by time.
///
/// Shared by sinks that filter in process. `bucket_millis` of zero
/// falls back to no bucketing.
pub(crate) fn bucket_newest(points: Vec<HistoryPoint>, bucket_millis: i64) -> Vec<HistoryPoint> {
    if bucket_millis <= 0 {
        return points;
    }
    let mut newest: std::collections::BTreeMap<i64, HistoryPoint> = std::collections::BTreeMap::new();
    for point in points {
        let key = point.epoch_millis() / bucket_millis;
        match newest.get(&key) {
            Some(existing) if existing.ts > point.ts => {}
            _ => {
                newest.insert(key, point);
            }
        }
    }
    newest.into_values().collect()
}

// =============================================================================
// MemorySink
// =============================================================================

/// In-memory sink for tests and demos.
///
/// Fully queryable, with switches to make schema setup or inserts
/// fail so retry and drop paths can be exercised.
#[derive(Debug, Default)]
pub struct MemorySink {
    points: RwLock<Vec<HistoryPoint>>,
    fail_inserts: AtomicBool,
    fail_schema: AtomicBool,
    insert_batches: AtomicU64,
    inserted_points: AtomicU64,
}

impl MemorySink {
    /// Creates an empty sink that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink whose inserts fail until told otherwise.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.fail_inserts.store(true, Ordering::SeqCst);
        sink
    }

    /// Switches insert failure on or off.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Switches schema failure on or off.
    pub fn set_fail_schema(&self, fail: bool) {
        self.fail_schema.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of successful batches.
    pub fn insert_batches(&self) -> u64 {
        self.insert_batches.load(Ordering::SeqCst)
    }

    /// Returns the number of points stored over the sink's lifetime.
    pub fn inserted_points(&self) -> u64 {
        self.inserted_points.load(Ordering::SeqCst)
    }

    /// Returns the current number of stored points.
    pub fn len(&self) -> usize {
        self.points.read().len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.points.read().is_empty()
    }

    /// Returns a copy of everything stored, insertion order.
    pub fn points(&self) -> Vec<HistoryPoint> {
        self.points.read().clone()
    }
}

#[async_trait]
impl HistorySink for MemorySink {
    async fn ensure_schema(&self) -> StoreResult<()> {
        if self.fail_schema.load(Ordering::SeqCst) {
            return Err(StoreError::schema_failed("memory sink schema failure"));
        }
        Ok(())
    }

    async fn insert_batch(&self, points: &[HistoryPoint]) -> StoreResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::write_failure("memory sink insert failure"));
        }
        if points.is_empty() {
            return Ok(());
        }
        self.points.write().extend_from_slice(points);
        self.insert_batches.fetch_add(1, Ordering::SeqCst);
        self.inserted_points
            .fetch_add(points.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    async fn query_range(
        &self,
        node_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Option<Duration>,
    ) -> StoreResult<Vec<HistoryPoint>> {
        let mut matched: Vec<HistoryPoint> = self
            .points
            .read()
            .iter()
            .filter(|p| p.node_id == node_id && p.ts >= start && p.ts <= end)
            .cloned()
            .collect();
        matched.sort_by_key(|p| p.ts);

        match bucket {
            Some(width) => Ok(bucket_newest(matched, width.as_millis() as i64)),
            None => Ok(matched),
        }
    }

    async fn query_last_n(&self, node_id: &str, n: u32) -> StoreResult<Vec<HistoryPoint>> {
        let mut matched: Vec<HistoryPoint> = self
            .points
            .read()
            .iter()
            .filter(|p| p.node_id == node_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.ts.cmp(&a.ts));
        matched.truncate(n as usize);
        Ok(matched)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// =============================================================================
// Tests
// =============================================================================
