// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tapline-historian
//!
//! Buffered history collection for Tapline. The [`HistorianPipeline`]
//! subscribes to a set of nodes through a live session, buffers every
//! change it sees in a [`RecordBuffer`], and flushes batches into a
//! [`tapline_store::HistorySink`] on a fixed cadence. Reconnects are
//! absorbed: the pipeline rebuilds its subscription when the session
//! comes back and keeps collecting.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tapline_historian::{HistorianConfig, HistorianPipeline};
//!
//! let pipeline = Arc::new(HistorianPipeline::new(session, sink, HistorianConfig::default()));
//! pipeline.start(&node_ids, 1000).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod buffer;
pub mod pipeline;

pub use buffer::RecordBuffer;
pub use pipeline::{
    HistorianConfig, HistorianPipeline, HistorianState, HistorianStatus, PipelineStats,
    PipelineStatsSnapshot,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
