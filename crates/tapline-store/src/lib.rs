// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tapline-store
//!
//! History sinks for Tapline. The historian pipeline flushes batches
//! of [`HistoryPoint`]s into a [`HistorySink`]; three implementations
//! ship here:
//!
//! - [`SqliteHistorySink`]: the durable, queryable store (WAL mode,
//!   epoch-millisecond timestamps, bucketed range queries).
//! - [`CsvSink`]: append-only file export; queries are unsupported.
//! - [`MemorySink`]: in-process sink with failure switches for tests.
//!
//! # Examples
//!
//! ```rust,ignore
//! use tapline_store::{HistorySink, SqliteHistorySink};
//!
//! let sink = SqliteHistorySink::connect("sqlite://data/history.db").await?;
//! sink.ensure_schema().await?;
//! sink.insert_batch(&points).await?;
//! let recent = sink.query_last_n("ns=2;s=Line1.Temp", 100).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod csv;
pub mod sink;
pub mod sqlite;

pub use csv::CsvSink;
pub use sink::{HistoryPoint, HistorySink, MemorySink};
pub use sqlite::SqliteHistorySink;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
