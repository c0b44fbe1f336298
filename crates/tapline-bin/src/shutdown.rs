// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! This module provides utilities for coordinating graceful shutdown
//! across the session, the historian pipeline, and the API server. It
//! handles OS signals (SIGTERM, SIGINT, SIGQUIT on Unix; Ctrl+C on
//! Windows) and lets components subscribe to shutdown notifications.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates graceful shutdown across multiple components.
///
/// The coordinator provides:
/// - A broadcast channel for notifying all components of shutdown
/// - Signal handling for SIGTERM/SIGINT/SIGQUIT (Unix) or Ctrl+C (Windows)
/// - A future that resolves when shutdown is initiated
///
/// # Example
///
/// ```ignore
/// use tapline_bin::shutdown::ShutdownCoordinator;
///
/// let coordinator = ShutdownCoordinator::new();
///
/// // Hand the API server a future that resolves on shutdown
/// let signal = coordinator.shutdown_signal();
/// tokio::spawn(async move {
///     signal.wait().await;
///     println!("Shutdown received!");
/// });
///
/// // Block until an OS signal or a programmatic initiation
/// coordinator.wait_for_shutdown().await;
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    /// Creates a new shutdown coordinator.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribes to shutdown notifications.
    ///
    /// Returns a receiver that will receive a message when shutdown is
    /// initiated.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Creates a future that resolves when shutdown is signaled.
    ///
    /// This is useful for passing to servers that accept a shutdown
    /// future.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
            shutdown_initiated: self.shutdown_initiated.clone(),
        }
    }

    /// Initiates shutdown.
    ///
    /// This notifies all subscribers that shutdown has been initiated.
    /// Calling it more than once is harmless.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for a shutdown signal (OS signal or manual initiation).
    ///
    /// Blocks until an OS signal arrives or some other holder of this
    /// coordinator calls [`ShutdownCoordinator::initiate_shutdown`].
    pub async fn wait_for_shutdown(&self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        let mut initiated = self.sender.subscribe();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm =
                signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
            let mut sigint =
                signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");
            let mut sigquit =
                signal(SignalKind::quit()).expect("Failed to register SIGQUIT handler");

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                }
                _ = sigquit.recv() => {
                    info!("Received SIGQUIT");
                }
                _ = initiated.recv() => {
                    info!("Shutdown requested");
                }
            }
        }

        #[cfg(windows)]
        {
            use tokio::signal::ctrl_c;

            tokio::select! {
                _ = ctrl_c() => {
                    info!("Received Ctrl+C");
                }
                _ = initiated.recv() => {
                    info!("Shutdown requested");
                }
            }
        }

        // Mark as shutdown and notify subscribers
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let _ = self.sender.send(());
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ShutdownSignal
// =============================================================================

/// A one-shot handle that resolves when shutdown is signaled.
///
/// Obtain it from [`ShutdownCoordinator::shutdown_signal`] and pass
/// `signal.wait()` to APIs that expect a shutdown future (like axum's
/// `with_graceful_shutdown`).
pub struct ShutdownSignal {
    receiver: broadcast::Receiver<()>,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Waits for the shutdown signal.
    pub async fn wait(mut self) {
        if self.shutdown_initiated.load(Ordering::SeqCst) {
            return;
        }

        let _ = self.receiver.recv().await;
    }
}

// =============================================================================
// ShutdownGuard
// =============================================================================

/// A guard that triggers shutdown when dropped.
///
/// Attach one to a spawned component task; if the task panics or exits
/// unexpectedly, dropping the guard brings the rest of the process
/// down with it. Dropping after shutdown has already been initiated is
/// silent.
pub struct ShutdownGuard {
    coordinator: ShutdownCoordinator,
    trigger_on_drop: bool,
}

impl ShutdownGuard {
    /// Creates a new shutdown guard.
    pub fn new(coordinator: ShutdownCoordinator) -> Self {
        Self {
            coordinator,
            trigger_on_drop: true,
        }
    }

    /// Disarms the guard so it won't trigger shutdown on drop.
    pub fn disarm(mut self) {
        self.trigger_on_drop = false;
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if self.trigger_on_drop && !self.coordinator.is_shutdown_initiated() {
            warn!("Component task ended unexpectedly, initiating shutdown");
            self.coordinator.initiate_shutdown();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        assert!(!coordinator.is_shutdown_initiated());

        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_signal() {
        let coordinator = ShutdownCoordinator::new();
        let signal = coordinator.shutdown_signal();

        let coordinator_clone = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            coordinator_clone.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("Shutdown signal should resolve");
    }

    #[tokio::test]
    async fn test_shutdown_signal_resolves_when_already_initiated() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        // Created after the fact, must still resolve immediately
        let signal = coordinator.shutdown_signal();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("Signal after initiation should resolve");
    }

    #[tokio::test]
    async fn test_wait_unblocks_on_programmatic_initiation() {
        let coordinator = ShutdownCoordinator::new();

        let coordinator_clone = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            coordinator_clone.initiate_shutdown();
        });

        tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown())
            .await
            .expect("wait_for_shutdown should unblock without an OS signal");
    }

    #[tokio::test]
    async fn test_shutdown_guard_triggers_on_drop() {
        let coordinator = ShutdownCoordinator::new();

        {
            let _guard = ShutdownGuard::new(coordinator.clone());
            // Guard is dropped here
        }

        assert!(coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_shutdown_guard_disarm() {
        let coordinator = ShutdownCoordinator::new();

        {
            let guard = ShutdownGuard::new(coordinator.clone());
            guard.disarm();
            // Guard is dropped here but was disarmed
        }

        assert!(!coordinator.is_shutdown_initiated());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx1 = coordinator.subscribe();
        let mut rx2 = coordinator.subscribe();

        coordinator.initiate_shutdown();

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_double_shutdown() {
        let coordinator = ShutdownCoordinator::new();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown(); // Should be idempotent

        assert!(coordinator.is_shutdown_initiated());
    }
}
