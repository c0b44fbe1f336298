// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tapline-bin
//!
//! CLI binary for the tapline industrial telemetry client.
//!
//! This crate provides the main binary entry point for tapline,
//! including:
//!
//! - CLI argument parsing with clap
//! - Runtime orchestration (sink, session, historian, API)
//! - Graceful shutdown handling
//! - Logging initialization
//! - Command implementations (run, validate, ls, read, write, history)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         main.rs                              │
//! │                    (Entry Point)                             │
//! └─────────────────────────┬───────────────────────────────────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    │ (Argument   │
//!                    │  Parsing)   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ runtime  │ │ logging  │
//!        │          │ │          │ │          │
//!        └──────────┘ └──────────┘ └──────────┘
//!               │           │
//!               │    ┌──────▼──────┐
//!               │    │  shutdown   │
//!               │    │ (Graceful)  │
//!               │    └─────────────┘
//!               │
//!        ┌──────┴──────┐
//!        │  tapline-*  │
//!        │  (crates)   │
//!        └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the telemetry client (default command)
//! tapline
//!
//! # Start with custom config
//! tapline -c /etc/tapline/config.yaml
//!
//! # Validate configuration
//! tapline validate
//!
//! # Browse the address space
//! tapline ls ns=2;s=Plant
//!
//! # One-shot reads and writes
//! tapline read "ns=2;s=Pump.Flow"
//! tapline write "ns=2;s=Setpoint" 42.5
//!
//! # Query stored history
//! tapline history "ns=2;s=Pump.Flow" --last 20
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use runtime::{RuntimeBuilder, TaplineRuntime};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
