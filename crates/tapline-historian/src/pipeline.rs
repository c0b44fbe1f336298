// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Collection pipeline with periodic flushing and reconnect recovery.
//!
//! The [`HistorianPipeline`] ties the client stack to a history sink:
//! it opens a session, subscribes to the requested nodes with a
//! listener that appends into the [`RecordBuffer`], and runs one flush
//! worker that periodically drains the buffer into the sink.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       HistorianPipeline                          │
//! │                                                                  │
//! │  SubscriptionSet ──► RecordBuffer ──► Flush worker ──► HistorySink │
//! │   (buffer listener)   (lock + O(1) len)  (1s tick,      (sqlite/  │
//! │                                           drain + retry)  csv/…)  │
//! │            ▲                                  │                   │
//! │            └── rebuilt on SessionEvent::Reconnected               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lifecycle: `Stopped → Starting → Running → Stopping → Stopped`.
//! `start` on a running pipeline restarts it cleanly, which is the
//! intended way to apply a changed node set. `stop` joins the worker
//! with a bounded timeout, closes the session, and performs one final
//! flush so records collected since the last tick survive a clean stop.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tapline_historian::{HistorianConfig, HistorianPipeline};
//!
//! let pipeline = Arc::new(HistorianPipeline::new(session, sink, HistorianConfig::default()));
//! pipeline.start(&node_ids, 1000).await?;
//! // ... collect for a while ...
//! pipeline.stop().await;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tapline_client::client::{
    ChangeListener, SessionEvent, SessionManager, SubscriptionDispatcher, SubscriptionSet,
};
use tapline_core::error::{
    HistorianError, HistorianResult, SubscriptionError, SubscriptionResult, TaplineResult,
};
use tapline_core::retry::RetryPolicy;
use tapline_core::types::ChangeRecord;
use tapline_store::{HistoryPoint, HistorySink};

use crate::buffer::RecordBuffer;

// =============================================================================
// HistorianConfig
// =============================================================================

fn default_flush_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_retry() -> RetryPolicy {
    // One initial attempt plus two retries before a batch is dropped.
    RetryPolicy::new().with_max_attempts(3)
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Behavioral settings for the collection pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorianConfig {
    /// Cadence of the periodic flush worker.
    #[serde(
        with = "tapline_core::serde_duration_millis",
        default = "default_flush_interval"
    )]
    pub flush_interval: Duration,

    /// Attempt budget and backoff for failed sink writes. Once the
    /// budget is spent the batch is dropped and counted.
    #[serde(default = "default_retry")]
    pub retry: RetryPolicy,

    /// Bound on waiting for the flush worker to exit during stop.
    #[serde(
        with = "tapline_core::serde_duration_millis",
        default = "default_stop_timeout"
    )]
    pub stop_timeout: Duration,
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
            retry: default_retry(),
            stop_timeout: default_stop_timeout(),
        }
    }
}

impl HistorianConfig {
    /// Creates a config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a config with short intervals for tests.
    pub fn for_testing() -> Self {
        Self {
            flush_interval: Duration::from_millis(25),
            retry: RetryPolicy::for_testing(),
            stop_timeout: Duration::from_millis(250),
        }
    }

    /// Sets the flush cadence.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the sink write retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

// =============================================================================
// HistorianState
// =============================================================================

/// Lifecycle state of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistorianState {
    /// No collection is running.
    #[default]
    Stopped,

    /// `start` is bringing the session and subscription up.
    Starting,

    /// Records are being collected and flushed.
    Running,

    /// `stop` is tearing the run down.
    Stopping,
}

impl fmt::Display for HistorianState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistorianState::Stopped => write!(f, "Stopped"),
            HistorianState::Starting => write!(f, "Starting"),
            HistorianState::Running => write!(f, "Running"),
            HistorianState::Stopping => write!(f, "Stopping"),
        }
    }
}

// =============================================================================
// PipelineStats
// =============================================================================

/// Atomic counters for pipeline activity.
#[derive(Debug, Default)]
pub struct PipelineStats {
    records_buffered: AtomicU64,
    records_flushed: AtomicU64,
    flush_cycles: AtomicU64,
    flush_errors: AtomicU64,
    batches_dropped: AtomicU64,
    records_dropped: AtomicU64,
    resubscriptions: AtomicU64,
}

impl PipelineStats {
    fn record_buffered(&self) {
        self.records_buffered.fetch_add(1, Ordering::Relaxed);
    }

    fn record_flushed(&self, records: u64) {
        self.records_flushed.fetch_add(records, Ordering::Relaxed);
    }

    fn record_flush_cycle(&self) {
        self.flush_cycles.fetch_add(1, Ordering::Relaxed);
    }

    fn record_flush_error(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_batch_dropped(&self, records: u64) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
        self.records_dropped.fetch_add(records, Ordering::Relaxed);
    }

    fn record_resubscription(&self) {
        self.resubscriptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of records appended to the buffer.
    pub fn records_buffered(&self) -> u64 {
        self.records_buffered.load(Ordering::Relaxed)
    }

    /// Returns the number of records persisted to the sink.
    pub fn records_flushed(&self) -> u64 {
        self.records_flushed.load(Ordering::Relaxed)
    }

    /// Returns the number of flush cycles that carried records.
    pub fn flush_cycles(&self) -> u64 {
        self.flush_cycles.load(Ordering::Relaxed)
    }

    /// Returns the number of failed sink write attempts, retries
    /// included.
    pub fn flush_errors(&self) -> u64 {
        self.flush_errors.load(Ordering::Relaxed)
    }

    /// Returns the number of batches abandoned after the retry budget.
    pub fn batches_dropped(&self) -> u64 {
        self.batches_dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of records lost in dropped batches.
    pub fn records_dropped(&self) -> u64 {
        self.records_dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of subscription rebuilds after reconnects.
    pub fn resubscriptions(&self) -> u64 {
        self.resubscriptions.load(Ordering::Relaxed)
    }

    /// Takes a serializable snapshot.
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            records_buffered: self.records_buffered(),
            records_flushed: self.records_flushed(),
            flush_cycles: self.flush_cycles(),
            flush_errors: self.flush_errors(),
            batches_dropped: self.batches_dropped(),
            records_dropped: self.records_dropped(),
            resubscriptions: self.resubscriptions(),
        }
    }
}

/// Point-in-time view of [`PipelineStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatsSnapshot {
    /// Records appended to the buffer.
    pub records_buffered: u64,
    /// Records persisted to the sink.
    pub records_flushed: u64,
    /// Flush cycles that carried records.
    pub flush_cycles: u64,
    /// Failed sink write attempts, retries included.
    pub flush_errors: u64,
    /// Batches abandoned after the retry budget.
    pub batches_dropped: u64,
    /// Records lost in dropped batches.
    pub records_dropped: u64,
    /// Subscription rebuilds after reconnects.
    pub resubscriptions: u64,
}

/// Serializable pipeline status for the presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorianStatus {
    /// Current lifecycle state.
    pub state: String,
    /// Name of the sink records flush into.
    pub sink: String,
    /// Node ids the live subscription was requested for.
    pub watched_nodes: Vec<String>,
    /// Records currently waiting in the buffer.
    pub buffered: usize,
    /// Activity counters.
    pub stats: PipelineStatsSnapshot,
}

// =============================================================================
// Buffer Listener
// =============================================================================

/// Listener that appends every delivered record into the buffer.
struct BufferListener {
    buffer: Arc<RecordBuffer>,
    stats: Arc<PipelineStats>,
}

#[async_trait]
impl ChangeListener for BufferListener {
    async fn on_change(&self, record: &ChangeRecord) -> SubscriptionResult<()> {
        self.buffer.append(record.clone());
        self.stats.record_buffered();
        Ok(())
    }

    fn name(&self) -> &str {
        "historian"
    }
}

// =============================================================================
// HistorianPipeline
// =============================================================================

struct WorkerHandle {
    task: JoinHandle<()>,
    stop: Arc<Notify>,
}

/// Drives collection from a session into a history sink.
///
/// # Thread Safety
///
/// All methods take `&self`; the pipeline is meant to be shared as
/// `Arc<HistorianPipeline>`. `start` and `stop` serialize on an
/// internal lifecycle lock, so concurrent calls cannot leak a worker
/// or double-flush a batch.
pub struct HistorianPipeline {
    session: Arc<SessionManager>,
    dispatcher: SubscriptionDispatcher,
    sink: Arc<dyn HistorySink>,
    config: HistorianConfig,
    buffer: Arc<RecordBuffer>,
    state: RwLock<HistorianState>,
    subscription: Mutex<Option<SubscriptionSet>>,
    worker: Mutex<Option<WorkerHandle>>,
    /// Serializes start/stop; never held across await points that need
    /// the worker to make progress.
    lifecycle: Mutex<()>,
    stats: Arc<PipelineStats>,
}

impl HistorianPipeline {
    /// Creates a pipeline over an existing session and sink.
    ///
    /// Nothing is started; the pipeline is `Stopped` until
    /// [`HistorianPipeline::start`] is called.
    pub fn new(
        session: Arc<SessionManager>,
        sink: Arc<dyn HistorySink>,
        config: HistorianConfig,
    ) -> Self {
        let dispatcher = SubscriptionDispatcher::new(Arc::clone(&session));
        Self {
            session,
            dispatcher,
            sink,
            config,
            buffer: Arc::new(RecordBuffer::new()),
            state: RwLock::new(HistorianState::Stopped),
            subscription: Mutex::new(None),
            worker: Mutex::new(None),
            lifecycle: Mutex::new(()),
            stats: Arc::new(PipelineStats::default()),
        }
    }

    /// Returns the session the pipeline collects through.
    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Returns the sink records flush into.
    pub fn sink(&self) -> &Arc<dyn HistorySink> {
        &self.sink
    }

    /// Returns the activity counters.
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Returns the number of records currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> HistorianState {
        *self.state.read().await
    }

    /// Returns `true` while the pipeline is collecting.
    pub async fn is_running(&self) -> bool {
        self.state().await == HistorianState::Running
    }

    /// Returns a serializable status view.
    pub async fn status(&self) -> HistorianStatus {
        let watched_nodes = {
            let slot = self.subscription.lock().await;
            slot.as_ref()
                .map(|set| set.requested_nodes().to_vec())
                .unwrap_or_default()
        };
        HistorianStatus {
            state: self.state().await.to_string(),
            sink: self.sink.name().to_string(),
            watched_nodes,
            buffered: self.buffer.len(),
            stats: self.stats.snapshot(),
        }
    }

    /// Starts collecting the given nodes.
    ///
    /// A running pipeline is stopped first; restarting with a changed
    /// node list is the intended way to apply tag-set changes. The
    /// sink schema is ensured, the session connected, and the
    /// subscription created before the flush worker comes up. An
    /// interval of zero is rejected before anything is touched.
    pub async fn start(
        self: &Arc<Self>,
        node_ids: &[String],
        interval_ms: u64,
    ) -> TaplineResult<()> {
        if interval_ms == 0 {
            return Err(SubscriptionError::invalid_interval(interval_ms).into());
        }

        let _lifecycle = self.lifecycle.lock().await;
        self.stop_inner().await;

        *self.state.write().await = HistorianState::Starting;
        info!(
            endpoint = self.session.endpoint(),
            nodes = node_ids.len(),
            interval_ms,
            "historian pipeline starting"
        );

        if let Err(e) = self.sink.ensure_schema().await {
            *self.state.write().await = HistorianState::Stopped;
            return Err(HistorianError::sink_unavailable(e.to_string()).into());
        }

        if let Err(e) = self.session.connect().await {
            *self.state.write().await = HistorianState::Stopped;
            return Err(HistorianError::session_failed(e.to_string()).into());
        }

        // Subscribe before creating the set so a reconnect racing the
        // startup is still observed by the worker.
        let events = self.session.subscribe_events();

        let listener = Arc::new(BufferListener {
            buffer: Arc::clone(&self.buffer),
            stats: Arc::clone(&self.stats),
        });
        match self.dispatcher.create(interval_ms, node_ids, listener).await {
            Ok(set) => {
                *self.subscription.lock().await = Some(set);
            }
            Err(e) => {
                self.session.disconnect().await;
                *self.state.write().await = HistorianState::Stopped;
                return Err(e);
            }
        }

        *self.worker.lock().await = Some(self.spawn_worker(events));
        *self.state.write().await = HistorianState::Running;
        info!(sink = self.sink.name(), "historian pipeline running");
        Ok(())
    }

    /// Stops collection. Idempotent.
    ///
    /// Signals the flush worker, joins it with a bounded timeout,
    /// cancels the subscription, closes the session, and performs one
    /// final flush so records accumulated since the last tick are
    /// persisted.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.stop_inner().await;
    }

    /// Attaches an extra listener to the live subscription.
    ///
    /// Listeners survive reconnect rebuilds. This is the hook for a
    /// [`tapline_client::client::BroadcastListener`] when embedders
    /// want the live change stream alongside persistence.
    pub async fn add_listener(&self, listener: Arc<dyn ChangeListener>) -> HistorianResult<()> {
        let slot = self.subscription.lock().await;
        match slot.as_ref() {
            Some(set) => {
                set.add_listener(listener).await;
                Ok(())
            }
            None => Err(HistorianError::NotRunning),
        }
    }

    /// Drains the buffer and writes the batch out immediately.
    ///
    /// Safe to call while the worker runs; each record is drained by
    /// exactly one side.
    pub async fn flush_now(&self) {
        self.flush_once().await;
    }

    async fn stop_inner(&self) {
        {
            let mut state = self.state.write().await;
            if *state == HistorianState::Stopped {
                return;
            }
            *state = HistorianState::Stopping;
        }

        if let Some(mut worker) = self.worker.lock().await.take() {
            worker.stop.notify_one();
            if tokio::time::timeout(self.config.stop_timeout, &mut worker.task)
                .await
                .is_err()
            {
                warn!(
                    timeout = ?self.config.stop_timeout,
                    "flush worker did not exit in time, aborting"
                );
                worker.task.abort();
            }
        }

        // Cancel before the final drain so nothing lands in the buffer
        // afterwards.
        if let Some(set) = self.subscription.lock().await.take() {
            set.cancel().await;
        }

        self.session.disconnect().await;

        // Records collected since the last tick survive a clean stop.
        self.flush_once().await;

        *self.state.write().await = HistorianState::Stopped;
        info!(sink = self.sink.name(), "historian pipeline stopped");
    }

    fn spawn_worker(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<SessionEvent>,
    ) -> WorkerHandle {
        let stop = Arc::new(Notify::new());
        let stop_signal = Arc::clone(&stop);
        let pipeline = Arc::clone(self);
        let period = self.config.flush_interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut events_open = true;
            debug!(interval = ?period, "flush worker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        pipeline.flush_once().await;
                    }
                    event = events.recv(), if events_open => {
                        match event {
                            Ok(SessionEvent::Reconnected { epoch }) => {
                                pipeline.rebuild_subscription(epoch).await;
                            }
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(skipped, "session events lagged, checking subscription");
                                let epoch = pipeline.session.epoch();
                                pipeline.rebuild_subscription(epoch).await;
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                events_open = false;
                            }
                        }
                    }
                    _ = stop_signal.notified() => {
                        debug!("flush worker stopping");
                        break;
                    }
                }
            }
        });

        WorkerHandle { task, stop }
    }

    /// Rebuilds the subscription when it is stale for `current_epoch`.
    ///
    /// A rebuild failure leaves the stale set in place so the next
    /// reconnect event gets another try with the same node list.
    async fn rebuild_subscription(&self, current_epoch: u64) {
        let mut slot = self.subscription.lock().await;
        let Some(old) = slot.as_ref() else {
            return;
        };
        if !old.is_stale_for(current_epoch) {
            return;
        }

        match self.dispatcher.recreate(old).await {
            Ok(rebuilt) => {
                self.stats.record_resubscription();
                info!(
                    set_id = %rebuilt.id(),
                    epoch = current_epoch,
                    nodes = rebuilt.requested_nodes().len(),
                    "subscription rebuilt after reconnect"
                );
                *slot = Some(rebuilt);
            }
            Err(e) => {
                warn!(error = %e, "re-subscription failed, keeping stale set for retry");
            }
        }
    }

    /// Drains the buffer and writes the batch with bounded retry.
    ///
    /// The drain happens under the buffer lock; the sink write does
    /// not, so appends continue while a slow sink works. A batch that
    /// exhausts the retry budget is dropped and counted.
    async fn flush_once(&self) {
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return;
        }
        self.stats.record_flush_cycle();

        let points: Vec<HistoryPoint> = batch.iter().map(HistoryPoint::from_record).collect();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.sink.insert_batch(&points).await {
                Ok(()) => {
                    self.stats.record_flushed(points.len() as u64);
                    debug!(
                        records = points.len(),
                        sink = self.sink.name(),
                        "flush complete"
                    );
                    return;
                }
                Err(e) => {
                    self.stats.record_flush_error();
                    if self.config.retry.allows(attempt) {
                        let delay = self.config.retry.backoff.delay(attempt);
                        debug!(
                            attempt,
                            max_attempts = self.config.retry.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "sink write failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            records = points.len(),
                            attempts = attempt,
                            sink = self.sink.name(),
                            error = %e,
                            "sink write failed after retries, dropping batch"
                        );
                        self.stats.record_batch_dropped(points.len() as u64);
                        return;
                    }
                }
            }
        }
    }
}

impl fmt::Debug for HistorianPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistorianPipeline")
            .field("endpoint", &self.session.endpoint())
            .field("sink", &self.sink.name())
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tapline_client::client::{ChannelListener, SessionConfig, SimTransport, Transport};
    use tapline_core::error::TaplineError;
    use tapline_core::types::TagValue;
    use tapline_store::MemorySink;

    fn nodes(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn fixture_with(
        config: HistorianConfig,
    ) -> (Arc<SimTransport>, Arc<MemorySink>, Arc<HistorianPipeline>) {
        let transport = Arc::new(SimTransport::new("sim://historian"));
        transport.add_node(None, "n1", "n1", TagValue::Int(0));
        transport.add_node(None, "n2", "n2", TagValue::Int(0));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            SessionConfig::for_testing(),
        ));
        let sink = Arc::new(MemorySink::new());
        let pipeline = Arc::new(HistorianPipeline::new(
            session,
            Arc::clone(&sink) as Arc<dyn HistorySink>,
            config,
        ));
        (transport, sink, pipeline)
    }

    fn fixture() -> (Arc<SimTransport>, Arc<MemorySink>, Arc<HistorianPipeline>) {
        fixture_with(HistorianConfig::for_testing())
    }

    /// Config whose periodic flush never fires within a test, so only
    /// explicit and final flushes move records.
    fn manual_flush_config() -> HistorianConfig {
        HistorianConfig::for_testing().with_flush_interval(Duration::from_secs(3600))
    }

    async fn wait_for(deadline: Duration, check: impl Fn() -> bool) -> bool {
        let start = tokio::time::Instant::now();
        while start.elapsed() < deadline {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        check()
    }

    #[tokio::test]
    async fn test_collects_and_flushes_per_node() {
        let (transport, sink, pipeline) = fixture();
        pipeline.start(&nodes(&["n1", "n2"]), 100).await.unwrap();
        assert_eq!(pipeline.state().await, HistorianState::Running);

        for i in 0..5 {
            transport.set_value("n1", TagValue::Int(i)).await.unwrap();
        }
        for i in 0..3 {
            transport.set_value("n2", TagValue::Int(i)).await.unwrap();
        }

        assert!(wait_for(Duration::from_secs(2), || sink.len() == 8).await);
        let points = sink.points();
        assert_eq!(points.iter().filter(|p| p.node_id == "n1").count(), 5);
        assert_eq!(points.iter().filter(|p| p.node_id == "n2").count(), 3);
        assert_eq!(pipeline.stats().records_buffered(), 8);
        assert_eq!(pipeline.stats().records_flushed(), 8);

        pipeline.stop().await;
        assert_eq!(sink.len(), 8);
    }

    #[tokio::test]
    async fn test_stop_flushes_remaining_records() {
        let (transport, sink, pipeline) = fixture_with(manual_flush_config());
        pipeline.start(&nodes(&["n1"]), 100).await.unwrap();
        // Let the worker's immediate first tick pass on an empty buffer.
        tokio::time::sleep(Duration::from_millis(50)).await;

        for i in 0..3 {
            transport.set_value("n1", TagValue::Int(i)).await.unwrap();
        }
        assert_eq!(sink.len(), 0);
        assert_eq!(pipeline.buffered(), 3);

        pipeline.stop().await;
        assert_eq!(sink.len(), 3);
        assert_eq!(pipeline.state().await, HistorianState::Stopped);

        // A second stop persists nothing new.
        pipeline.stop().await;
        assert_eq!(sink.len(), 3);
    }

    #[tokio::test]
    async fn test_flush_now_moves_batch_without_duplicates() {
        let (transport, sink, pipeline) = fixture_with(manual_flush_config());
        pipeline.start(&nodes(&["n1"]), 100).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        pipeline.flush_now().await;
        assert_eq!(sink.len(), 1);

        pipeline.stop().await;
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_restart_replaces_watched_nodes() {
        let (transport, sink, pipeline) = fixture();
        pipeline.start(&nodes(&["n1"]), 100).await.unwrap();
        pipeline.start(&nodes(&["n2"]), 100).await.unwrap();

        assert_eq!(pipeline.state().await, HistorianState::Running);
        let status = pipeline.status().await;
        assert_eq!(status.watched_nodes, nodes(&["n2"]));

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        transport.set_value("n2", TagValue::Int(2)).await.unwrap();
        assert!(wait_for(Duration::from_secs(2), || sink.len() >= 1).await);

        pipeline.stop().await;
        assert!(sink.points().iter().all(|p| p.node_id == "n2"));
    }

    #[tokio::test]
    async fn test_sink_failure_drops_batch_and_keeps_running() {
        let (transport, sink, pipeline) = fixture();
        sink.set_fail_inserts(true);
        pipeline.start(&nodes(&["n1"]), 100).await.unwrap();

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        transport.set_value("n1", TagValue::Int(2)).await.unwrap();

        assert!(
            wait_for(Duration::from_secs(2), || {
                pipeline.stats().records_dropped() == 2
            })
            .await
        );
        assert!(pipeline.stats().batches_dropped() >= 1);
        // Each dropped batch burned the full attempt budget.
        assert!(pipeline.stats().flush_errors() >= 2);
        assert_eq!(pipeline.state().await, HistorianState::Running);

        sink.set_fail_inserts(false);
        transport.set_value("n1", TagValue::Int(3)).await.unwrap();
        assert!(wait_for(Duration::from_secs(2), || sink.len() == 1).await);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_reconnect_resubscribes_and_delivery_resumes() {
        let (transport, sink, pipeline) = fixture();
        pipeline.start(&nodes(&["n1"]), 100).await.unwrap();

        transport.set_value("n1", TagValue::Int(1)).await.unwrap();
        assert!(wait_for(Duration::from_secs(2), || sink.len() == 1).await);

        transport.break_link();
        // One monitor cycle to notice the loss before the link returns.
        tokio::time::sleep(Duration::from_millis(75)).await;
        transport.restore_link();

        assert!(
            wait_for(Duration::from_secs(2), || {
                pipeline.stats().resubscriptions() >= 1
            })
            .await
        );

        // Delivery resumes without another start().
        transport.set_value("n1", TagValue::Int(2)).await.unwrap();
        assert!(wait_for(Duration::from_secs(2), || sink.len() == 2).await);

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_start_rejects_zero_interval() {
        let (_transport, _sink, pipeline) = fixture();
        let err = pipeline.start(&nodes(&["n1"]), 0).await.unwrap_err();
        assert!(matches!(
            err,
            TaplineError::Subscription(SubscriptionError::InvalidInterval { .. })
        ));
        assert_eq!(pipeline.state().await, HistorianState::Stopped);
    }

    #[tokio::test]
    async fn test_start_fails_when_schema_fails() {
        let (_transport, sink, pipeline) = fixture();
        sink.set_fail_schema(true);
        let err = pipeline.start(&nodes(&["n1"]), 100).await.unwrap_err();
        assert!(matches!(
            err,
            TaplineError::Historian(HistorianError::SinkUnavailable { .. })
        ));
        assert_eq!(pipeline.state().await, HistorianState::Stopped);
    }

    #[tokio::test]
    async fn test_start_fails_when_endpoint_unreachable() {
        let (transport, _sink, pipeline) = fixture();
        transport.break_link();
        let err = pipeline.start(&nodes(&["n1"]), 100).await.unwrap_err();
        assert!(matches!(
            err,
            TaplineError::Historian(HistorianError::SessionFailed { .. })
        ));
        assert_eq!(pipeline.state().await, HistorianState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_noop() {
        let (_transport, sink, pipeline) = fixture();
        pipeline.stop().await;
        assert_eq!(pipeline.state().await, HistorianState::Stopped);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_add_listener_requires_running_pipeline() {
        let (transport, _sink, pipeline) = fixture();

        let (listener, _rx) = ChannelListener::channel(8);
        assert!(matches!(
            pipeline.add_listener(Arc::new(listener)).await,
            Err(HistorianError::NotRunning)
        ));

        pipeline.start(&nodes(&["n1"]), 100).await.unwrap();
        let (listener, mut rx) = ChannelListener::channel(8);
        pipeline.add_listener(Arc::new(listener)).await.unwrap();

        transport.set_value("n1", TagValue::Int(9)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().value, TagValue::Int(9));

        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_status_reports_state_sink_and_nodes() {
        let (_transport, _sink, pipeline) = fixture();
        pipeline.start(&nodes(&["n1", "n2"]), 100).await.unwrap();

        let status = pipeline.status().await;
        assert_eq!(status.state, "Running");
        assert_eq!(status.sink, "memory");
        assert_eq!(status.watched_nodes, nodes(&["n1", "n2"]));

        pipeline.stop().await;
        let status = pipeline.status().await;
        assert_eq!(status.state, "Stopped");
        assert!(status.watched_nodes.is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config: HistorianConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.flush_interval, Duration::from_secs(1));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.stop_timeout, Duration::from_secs(2));
    }
}
