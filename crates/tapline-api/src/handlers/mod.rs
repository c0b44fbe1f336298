// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! API handlers for all endpoints.
//!
//! This module contains the handler implementations for all API endpoints:
//!
//! - [`health`]: Health and readiness probes
//! - [`session`]: Session lifecycle
//! - [`nodes`]: Live reads, writes, and address-space browsing
//! - [`historian`]: Historian pipeline control
//! - [`history`]: Stored history queries
//! - [`servers`]: Saved-server registry

mod health;
mod historian;
mod history;
mod nodes;
mod servers;
mod session;

pub use health::*;
pub use historian::*;
pub use history::*;
pub use nodes::*;
pub use servers::*;
pub use session::*;
