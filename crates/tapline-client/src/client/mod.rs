// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session, subscription, and transport layers.
//!
//! ```text
//!   SubscriptionDispatcher ──► SessionManager ──► dyn Transport
//!          │                        │                  │
//!          │ normalize + fan-out    │ epoch, liveness  │ server protocol
//!          ▼                        ▼                  ▼
//!    ChangeListener(s)        SessionEvent bus    SimTransport / real
//! ```
//!
//! The [`SessionManager`] owns exactly one transport and serializes
//! connect and disconnect against in-flight operations. Everything
//! above it talks in [`tapline_core`] types; the transport boundary is
//! the only place raw server values appear.

pub mod session;
pub mod sim;
pub mod subscription;
pub mod transport;

pub use session::{
    SessionConfig, SessionEvent, SessionManager, SessionStats, SessionStatsSnapshot,
    SessionStatus,
};
pub use sim::SimTransport;
pub use subscription::{
    normalize, BroadcastListener, ChangeListener, ChannelListener, DispatcherStats,
    DispatcherStatsSnapshot, SubscriptionDispatcher, SubscriptionSet, SubscriptionSetId,
};
pub use transport::{ChangeCallback, RawChange, SubscriptionHandle, Transport, WatchToken};
