// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # tapline-client
//!
//! Session lifecycle, subscription dispatch, and the transport
//! abstraction for Tapline.
//!
//! The crate is organized around three pieces:
//!
//! - [`client::Transport`]: the async contract a server connection
//!   must provide. [`client::SimTransport`] is the in-memory
//!   implementation used by tests and demos; real protocol bindings
//!   live behind the same trait.
//! - [`client::SessionManager`]: owns one transport, tracks the
//!   connection epoch, probes liveness, and reconnects with automatic
//!   staleness signaling for everything built on top.
//! - [`client::SubscriptionDispatcher`]: turns raw server
//!   notifications into normalized [`tapline_core::ChangeRecord`]s and
//!   fans them out to independent listeners.
//!
//! # Examples
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tapline_client::client::{
//!     ChannelListener, SessionConfig, SessionManager, SimTransport, SubscriptionDispatcher,
//! };
//!
//! let transport = Arc::new(SimTransport::new("sim://plant"));
//! let session = Arc::new(SessionManager::new(transport, SessionConfig::new()));
//! session.connect().await?;
//!
//! let dispatcher = SubscriptionDispatcher::new(Arc::clone(&session));
//! let (listener, mut rx) = ChannelListener::channel(256);
//! let set = dispatcher.create(1000, &nodes, Arc::new(listener)).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod client;

pub use browse::BrowseNode;
pub use client::{
    ChangeListener, ChannelListener, RawChange, SessionConfig, SessionEvent, SessionManager,
    SimTransport, SubscriptionDispatcher, SubscriptionSet, Transport,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
