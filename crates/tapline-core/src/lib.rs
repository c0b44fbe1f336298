// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tapline-core
//!
//! Core abstractions and shared types for the Tapline telemetry client.
//!
//! This crate provides the foundational types and utilities used across
//! all Tapline components including:
//!
//! - **Types**: Core data types like `NodeRef`, `TagValue`, `ChangeRecord`
//! - **Error**: Unified error hierarchy
//! - **Convert**: Scalar coercion and timestamp normalization
//! - **Retry**: Bounded retry with exponential backoff
//!
//! ## Example
//!
//! ```rust
//! use tapline_core::types::{ChangeRecord, TagValue};
//!
//! let record = ChangeRecord::new("ns=2;s=Line1.Temp", TagValue::Float(25.5));
//! assert!(record.value.is_numeric());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Core Modules
// =============================================================================

pub mod convert;
pub mod error;
pub mod retry;
pub mod types;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{
    HistorianError, HistorianResult, StoreError, StoreResult, SubscriptionError,
    SubscriptionResult, TaplineError, TaplineResult, TransportError, TransportResult,
};

pub use types::{ChangeRecord, NodeRef, SecuritySettings, SessionState, TagValue};

pub use convert::{
    coerce_float, coerce_scalar, coerce_str, from_epoch_millis, parse_timestamp, TimeSpec,
};

pub use retry::{BackoffPolicy, RetryPolicy};

// =============================================================================
// Serde Helpers
// =============================================================================

/// Serializes a `Duration` as whole seconds.
pub mod serde_duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Serializes as `u64` seconds.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    /// Deserializes from `u64` seconds.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Serializes a `Duration` as whole milliseconds.
pub mod serde_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    /// Serializes as `u64` milliseconds.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    /// Deserializes from `u64` milliseconds.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
