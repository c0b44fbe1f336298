// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Tapline Integration Tests
//!
//! This crate provides cross-crate integration tests for the Tapline
//! telemetry client. It includes test utilities, fixtures, and helpers
//! designed for extensibility and maintainability; the scenarios here
//! exercise whole stacks (transport, session, dispatcher, historian,
//! store, API) rather than single modules.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities, fixtures, and helpers
//!   - `fixtures`: Pre-built nodes, values, records, and config snippets
//!   - `builders`: Builder patterns for records and full test stacks
//!   - `assertions`: Custom assertion helpers
//!   - `mocks`: Listener, sink, and generator doubles
//!   - `harness`: Test harness for integration tests
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p tapline-tests
//!
//! # Run specific test suite
//! cargo test -p tapline-tests --test integration_session
//! cargo test -p tapline-tests --test integration_historian
//! cargo test -p tapline-tests --test integration_store
//! cargo test -p tapline-tests --test integration_config
//! cargo test -p tapline-tests --test integration_api
//!
//! # Run with verbose output
//! cargo test -p tapline-tests -- --nocapture
//!
//! # Run specific test
//! cargo test -p tapline-tests test_reconnect_restores_liveness_and_reads
//! ```
//!
//! ## Test Categories
//!
//! ### Session Tests (`integration_session.rs`)
//! - Connect/disconnect lifecycle and events
//! - Liveness probing
//! - Reads and writes through a live session
//! - Epoch staleness and re-subscription
//! - Automatic reconnection
//!
//! ### Historian Tests (`integration_historian.rs`)
//! - End-to-end collection into a sink
//! - Flush cadence, manual flush, and stop durability
//! - Listener fault isolation
//! - Sink retry behavior and reconnect absorption
//!
//! ### Store Tests (`integration_store.rs`)
//! - SQLite persistence and range/last-n/bucket queries
//! - CSV export through a running pipeline
//! - Failure switches and recovery
//!
//! ### Config Tests (`integration_config.rs`)
//! - Configuration parsing (YAML, TOML)
//! - Placeholder and environment variable overrides
//! - Validation rules
//! - Saved-server registry persistence
//!
//! ### API Tests (`integration_api.rs`)
//! - Health and readiness probes
//! - Session lifecycle over REST
//! - Node reads, writes, and browsing
//! - Historian control and history queries
//! - Server registry CRUD
//!
//! ## Writing New Tests
//!
//! ### Using Fixtures
//!
//! ```rust,ignore
//! use tapline_tests::common::fixtures::{NodeFixtures, ScenarioFixtures};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let scenario = ScenarioFixtures::boiler_room();
//!     let transport = scenario.build_transport();
//!     // ... test logic
//! }
//! ```
//!
//! ### Using Builders
//!
//! ```rust,ignore
//! use tapline_tests::common::builders::StackBuilder;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let stack = StackBuilder::new()
//!         .endpoint("sim://my-test")
//!         .node("line1.temp", TagValue::Float(20.0))
//!         .build();
//!     stack.pipeline.start(&nodes, 100).await.unwrap();
//!     // ... test logic
//! }
//! ```
//!
//! ### Using Test Harness
//!
//! ```rust,ignore
//! use tapline_tests::common::harness::TestHarness;
//!
//! #[tokio::test]
//! async fn test_with_harness() {
//!     let harness = TestHarness::with_name("my_test");
//!     harness.run(|resources| async move {
//!         // Use resources.transport, resources.temp_path(), etc.
//!     }).await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::builders::*;
    pub use crate::common::assertions::*;
    pub use crate::common::mocks::*;
    pub use crate::common::harness::*;
}
