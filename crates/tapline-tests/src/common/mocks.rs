// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Mocks
//!
//! Listener, sink, and generator doubles for integration testing.
//! Transport faults are injected through `SimTransport` itself; the
//! doubles here cover the other seams: change listeners that record or
//! fail, a sink that fails a configurable number of writes, and a
//! deterministic value generator.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use tapline_client::ChangeListener;
use tapline_core::error::{StoreError, StoreResult, SubscriptionError, SubscriptionResult};
use tapline_core::types::{ChangeRecord, TagValue};
use tapline_store::{HistoryPoint, HistorySink, MemorySink};

// =============================================================================
// Event Recorder
// =============================================================================

/// Records events of any cloneable type for later inspection.
pub struct EventRecorder<T> {
    events: Mutex<Vec<T>>,
}

impl<T> Default for EventRecorder<T> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone + Send> EventRecorder<T> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one event.
    pub fn record(&self, event: T) {
        self.events.lock().push(event);
    }

    /// Returns a copy of all recorded events.
    pub fn events(&self) -> Vec<T> {
        self.events.lock().clone()
    }

    /// Returns the number of recorded events.
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Waits until at least `count` events arrive or `timeout` passes.
    pub async fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count() >= count
    }
}

// =============================================================================
// Recording Listener
// =============================================================================

/// Change listener that records every delivered record.
pub struct RecordingListener {
    name: String,
    recorder: EventRecorder<ChangeRecord>,
}

impl Default for RecordingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingListener {
    /// Creates a listener named `recording`.
    pub fn new() -> Self {
        Self::named("recording")
    }

    /// Creates a listener with a custom name for dispatch logs.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recorder: EventRecorder::new(),
        }
    }

    /// Returns a copy of all delivered records.
    pub fn records(&self) -> Vec<ChangeRecord> {
        self.recorder.events()
    }

    /// Returns the number of delivered records.
    pub fn count(&self) -> usize {
        self.recorder.count()
    }

    /// Clears the delivered records.
    pub fn clear(&self) {
        self.recorder.clear();
    }

    /// Waits until at least `count` records arrive or `timeout` passes.
    pub async fn wait_for_count(&self, count: usize, timeout: Duration) -> bool {
        self.recorder.wait_for_count(count, timeout).await
    }
}

#[async_trait]
impl ChangeListener for RecordingListener {
    async fn on_change(&self, record: &ChangeRecord) -> SubscriptionResult<()> {
        self.recorder.record(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// =============================================================================
// Failing Listener
// =============================================================================

/// Change listener that fails on every invocation.
#[derive(Default)]
pub struct FailingListener {
    invocations: AtomicUsize,
}

impl FailingListener {
    /// Creates the listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many times the listener was invoked.
    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeListener for FailingListener {
    async fn on_change(&self, _record: &ChangeRecord) -> SubscriptionResult<()> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        Err(SubscriptionError::dispatch_failed(
            "injected listener failure",
        ))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// =============================================================================
// Flaky Sink
// =============================================================================

/// Sink whose first `fail_first` insert attempts fail, then delegates
/// to an inner [`MemorySink`]. Exercises the flush retry budget.
pub struct FlakySink {
    inner: MemorySink,
    fail_first: u64,
    attempts: AtomicU64,
}

impl FlakySink {
    /// Creates a sink failing the first `fail_first` insert attempts.
    pub fn new(fail_first: u64) -> Self {
        Self {
            inner: MemorySink::new(),
            fail_first,
            attempts: AtomicU64::new(0),
        }
    }

    /// Returns the number of insert attempts so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Returns the inner memory sink for assertions.
    pub fn inner(&self) -> &MemorySink {
        &self.inner
    }
}

#[async_trait]
impl HistorySink for FlakySink {
    async fn ensure_schema(&self) -> StoreResult<()> {
        self.inner.ensure_schema().await
    }

    async fn insert_batch(&self, points: &[HistoryPoint]) -> StoreResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.fail_first {
            return Err(StoreError::write_failure(format!(
                "injected failure on attempt {}",
                attempt
            )));
        }
        self.inner.insert_batch(points).await
    }

    async fn query_range(
        &self,
        node_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Option<Duration>,
    ) -> StoreResult<Vec<HistoryPoint>> {
        self.inner.query_range(node_id, start, end, bucket).await
    }

    async fn query_last_n(&self, node_id: &str, n: u32) -> StoreResult<Vec<HistoryPoint>> {
        self.inner.query_last_n(node_id, n).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

// =============================================================================
// Value Sequencer
// =============================================================================

/// Deterministic value generator for injected changes.
///
/// Produces a sine wave around a base value so generated series look
/// like real instrument data while staying reproducible.
pub struct ValueSequencer {
    counter: AtomicU64,
    base: f64,
    amplitude: f64,
}

impl Default for ValueSequencer {
    fn default() -> Self {
        Self::with(20.0, 5.0)
    }
}

impl ValueSequencer {
    /// Creates a sequencer around 20.0 with amplitude 5.0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sequencer with a custom base and amplitude.
    pub fn with(base: f64, amplitude: f64) -> Self {
        Self {
            counter: AtomicU64::new(0),
            base,
            amplitude,
        }
    }

    /// Returns the next raw float in the series.
    pub fn next_float(&self) -> f64 {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        self.base + self.amplitude * ((n as f64) * 0.5).sin()
    }

    /// Returns the next value as a float tag value.
    pub fn next_value(&self) -> TagValue {
        TagValue::Float(self.next_float())
    }

    /// Returns the next value as an integer tag value.
    pub fn next_int(&self) -> TagValue {
        TagValue::Int(self.counter.fetch_add(1, Ordering::SeqCst) as i64)
    }

    /// Returns a batch of sequential float values.
    pub fn batch(&self, count: usize) -> Vec<TagValue> {
        (0..count).map(|_| self.next_value()).collect()
    }

    /// Returns the number of values emitted so far.
    pub fn emitted(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
