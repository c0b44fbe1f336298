// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Assertions
//!
//! Extension traits and polling helpers for integration tests.
//! The traits chain (`record.assert_node(..).assert_float_approx(..)`)
//! and panic with descriptive messages on mismatch.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use tapline_core::types::{ChangeRecord, TagValue};
use tapline_store::HistoryPoint;

// =============================================================================
// Record Assertions
// =============================================================================

/// Chainable assertions on a single change record.
pub trait RecordAssertions {
    /// Asserts the record belongs to `expected`.
    fn assert_node(&self, expected: &str) -> &Self;

    /// Asserts the value is numeric and within `tolerance` of `expected`.
    fn assert_float_approx(&self, expected: f64, tolerance: f64) -> &Self;

    /// Asserts the record was observed within the last `max_age`.
    fn assert_recent(&self, max_age: Duration) -> &Self;
}

impl RecordAssertions for ChangeRecord {
    fn assert_node(&self, expected: &str) -> &Self {
        assert_eq!(
            self.node_id, expected,
            "expected record for node '{}', got '{}'",
            expected, self.node_id
        );
        self
    }

    fn assert_float_approx(&self, expected: f64, tolerance: f64) -> &Self {
        match self.value.as_f64() {
            Some(actual) if (actual - expected).abs() <= tolerance => self,
            Some(actual) => panic!(
                "expected value near {} (tolerance {}), got {} for node '{}'",
                expected, tolerance, actual, self.node_id
            ),
            None => panic!(
                "expected numeric value for node '{}', got {:?}",
                self.node_id, self.value
            ),
        }
    }

    fn assert_recent(&self, max_age: Duration) -> &Self {
        let limit = chrono::Duration::from_std(max_age)
            .unwrap_or_else(|_| chrono::Duration::max_value());
        let age = self.age();
        assert!(
            age <= limit,
            "record for '{}' is {}ms old, expected at most {}ms",
            self.node_id,
            age.num_milliseconds(),
            limit.num_milliseconds()
        );
        self
    }
}

// =============================================================================
// Value Assertions
// =============================================================================

/// Chainable assertions on a tag value.
pub trait ValueAssertions {
    /// Asserts the value is numeric and within `tolerance` of `expected`.
    fn assert_approx(&self, expected: f64, tolerance: f64) -> &Self;

    /// Asserts the value is numeric and inside `[min, max]`.
    fn assert_in_range(&self, min: f64, max: f64) -> &Self;
}

impl ValueAssertions for TagValue {
    fn assert_approx(&self, expected: f64, tolerance: f64) -> &Self {
        match self.as_f64() {
            Some(actual) if (actual - expected).abs() <= tolerance => self,
            Some(actual) => panic!(
                "expected value near {} (tolerance {}), got {}",
                expected, tolerance, actual
            ),
            None => panic!("expected numeric value, got {:?}", self),
        }
    }

    fn assert_in_range(&self, min: f64, max: f64) -> &Self {
        match self.as_f64() {
            Some(actual) if actual >= min && actual <= max => self,
            Some(actual) => panic!("expected value in [{}, {}], got {}", min, max, actual),
            None => panic!("expected numeric value, got {:?}", self),
        }
    }
}

// =============================================================================
// History Point Assertions
// =============================================================================

/// Assertions on a slice of queried history points.
pub trait PointSliceAssertions {
    /// Asserts the total point count.
    fn assert_count(&self, expected: usize) -> &Self;

    /// Asserts the number of points recorded for one node.
    fn assert_count_for_node(&self, node_id: &str, expected: usize) -> &Self;

    /// Asserts every point belongs to one of the `allowed` nodes.
    fn assert_only_nodes(&self, allowed: &[&str]) -> &Self;

    /// Asserts timestamps never decrease across the whole slice.
    fn assert_ascending_by_time(&self) -> &Self;

    /// Asserts timestamps never decrease within each node's series.
    fn assert_monotonic_per_node(&self) -> &Self;
}

impl PointSliceAssertions for [HistoryPoint] {
    fn assert_count(&self, expected: usize) -> &Self {
        assert_eq!(
            self.len(),
            expected,
            "expected {} history points, got {}",
            expected,
            self.len()
        );
        self
    }

    fn assert_count_for_node(&self, node_id: &str, expected: usize) -> &Self {
        let actual = self.iter().filter(|p| p.node_id == node_id).count();
        assert_eq!(
            actual, expected,
            "expected {} points for node '{}', got {}",
            expected, node_id, actual
        );
        self
    }

    fn assert_only_nodes(&self, allowed: &[&str]) -> &Self {
        for point in self {
            assert!(
                allowed.contains(&point.node_id.as_str()),
                "unexpected node '{}' in history points (allowed: {:?})",
                point.node_id,
                allowed
            );
        }
        self
    }

    fn assert_ascending_by_time(&self) -> &Self {
        for pair in self.windows(2) {
            assert!(
                pair[0].ts <= pair[1].ts,
                "timestamps out of order: {} before {}",
                pair[0].ts,
                pair[1].ts
            );
        }
        self
    }

    fn assert_monotonic_per_node(&self) -> &Self {
        let mut last_seen: HashMap<&str, chrono::DateTime<chrono::Utc>> = HashMap::new();
        for point in self {
            if let Some(previous) = last_seen.get(point.node_id.as_str()) {
                assert!(
                    *previous <= point.ts,
                    "timestamps for node '{}' out of order: {} before {}",
                    point.node_id,
                    previous,
                    point.ts
                );
            }
            last_seen.insert(point.node_id.as_str(), point.ts);
        }
        self
    }
}

// =============================================================================
// Result Assertions
// =============================================================================

/// Unwrapping assertions on results with descriptive panics.
pub trait ResultAssertions<T, E> {
    /// Unwraps the success value, panicking with the error on failure.
    fn assert_ok(self) -> T;

    /// Unwraps the error value, panicking with the success on `Ok`.
    fn assert_err(self) -> E;

    /// Unwraps the success value, prefixing `context` on failure.
    fn assert_ok_with(self, context: &str) -> T;
}

impl<T: fmt::Debug, E: fmt::Debug> ResultAssertions<T, E> for Result<T, E> {
    fn assert_ok(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => panic!("expected Ok, got Err: {:?}", err),
        }
    }

    fn assert_err(self) -> E {
        match self {
            Ok(value) => panic!("expected Err, got Ok: {:?}", value),
            Err(err) => err,
        }
    }

    fn assert_ok_with(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => panic!("{}: {:?}", context, err),
        }
    }
}

// =============================================================================
// Polling Helpers
// =============================================================================

/// Polls an async condition until it holds or `timeout` passes.
///
/// The condition is re-invoked every `interval`; returns whether it
/// ever evaluated to true.
pub async fn wait_for<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Like [`wait_for`] but panics with `what` when the deadline passes.
pub async fn wait_for_or_panic<F, Fut>(
    timeout: Duration,
    interval: Duration,
    what: &str,
    condition: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    if !wait_for(timeout, interval, condition).await {
        panic!("timed out after {:?} waiting for {}", timeout, what);
    }
}

/// Polls a synchronous condition until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

// =============================================================================
// Assertion Macros
// =============================================================================

/// Awaits a future, panicking if it does not complete within `timeout`.
///
/// Evaluates to the future's output on success.
#[macro_export]
macro_rules! assert_completes_within {
    ($timeout:expr, $future:expr) => {{
        match tokio::time::timeout($timeout, $future).await {
            Ok(value) => value,
            Err(_) => panic!("operation did not complete within {:?}", $timeout),
        }
    }};
}

/// Polls a synchronous condition, panicking if it never holds.
///
/// With two arguments the poll interval defaults to 10ms.
#[macro_export]
macro_rules! assert_eventually {
    ($timeout:expr, $interval:expr, $condition:expr) => {{
        if !$crate::common::assertions::wait_until($timeout, $interval, || $condition).await {
            panic!(
                "condition not met within {:?}: {}",
                $timeout,
                stringify!($condition)
            );
        }
    }};
    ($timeout:expr, $condition:expr) => {
        $crate::assert_eventually!($timeout, ::std::time::Duration::from_millis(10), $condition)
    };
}
