// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded retry with exponential backoff.
//!
//! Used by the flush pipeline when a sink write fails and by the session
//! manager between reconnection attempts. Delays grow geometrically from
//! an initial value up to a cap, with a jitter factor so that several
//! clients recovering from the same outage do not retry in lockstep.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use tapline_core::retry::BackoffPolicy;
//!
//! let policy = BackoffPolicy::new()
//!     .with_initial_delay(Duration::from_millis(100))
//!     .with_max_delay(Duration::from_secs(5));
//!
//! let first = policy.delay(1);
//! let second = policy.delay(2);
//! assert!(second >= first);
//! ```

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

// =============================================================================
// BackoffPolicy
// =============================================================================

/// Exponential backoff parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    #[serde(with = "crate::serde_duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound on any single delay.
    #[serde(with = "crate::serde_duration_millis")]
    pub max_delay: Duration,

    /// Growth factor between attempts.
    pub multiplier: f64,

    /// Jitter as a fraction of the computed delay (0.0 to 1.0).
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fast policy for tests (millisecond delays, no jitter).
    pub fn for_testing() -> Self {
        Self {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter factor, clamped to [0.0, 1.0].
    pub fn with_jitter_factor(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    /// Computes the delay for the given attempt (1-based).
    ///
    /// Attempt 1 waits `initial_delay`, attempt 2 waits
    /// `initial_delay * multiplier`, and so on, capped at `max_delay`.
    /// Jitter is applied last and never produces a negative delay.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(63);
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jittered = if self.jitter_factor > 0.0 {
            let spread = capped * self.jitter_factor;
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered)
    }
}

// =============================================================================
// RetryPolicy
// =============================================================================

/// Attempt budget plus backoff shape for one retried operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first try.
    pub max_attempts: u32,

    /// Backoff between attempts.
    #[serde(flatten)]
    pub backoff: BackoffPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: BackoffPolicy::default(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fast policy for tests.
    pub fn for_testing() -> Self {
        Self {
            max_attempts: 2,
            backoff: BackoffPolicy::for_testing(),
        }
    }

    /// Sets the attempt budget (minimum 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the backoff shape.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Returns `true` if another attempt is allowed after `attempt`
    /// attempts have already been made.
    #[inline]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = BackoffPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(400))
            .with_multiplier(2.0)
            .with_jitter_factor(0.0);

        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
        // Cap holds from here on
        assert_eq!(policy.delay(4), Duration::from_millis(400));
        assert_eq!(policy.delay(10), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_zero_attempt() {
        let policy = BackoffPolicy::new();
        assert_eq!(policy.delay(0), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = BackoffPolicy::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_secs(1))
            .with_jitter_factor(0.5);

        for _ in 0..100 {
            let d = policy.delay(1);
            assert!(d >= Duration::from_millis(50));
            assert!(d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = BackoffPolicy::new().with_jitter_factor(0.0);
        assert_eq!(policy.delay(u32::MAX), policy.max_delay);
    }

    #[test]
    fn test_retry_policy_allows() {
        let policy = RetryPolicy::new().with_max_attempts(2);
        assert!(policy.allows(0));
        assert!(policy.allows(1));
        assert!(!policy.allows(2));
    }

    #[test]
    fn test_retry_policy_minimum_one_attempt() {
        let policy = RetryPolicy::new().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_serde_round_trip() {
        let policy = RetryPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        let back: RetryPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_attempts, policy.max_attempts);
        assert_eq!(back.backoff.initial_delay, policy.backoff.initial_delay);
    }
}
