//! # turnos-sync
//!
//! Live data synchronization client for the turnos queue/ticketing backend.
//!
//! Consumers follow a live resource (pending tickets of a queue, tickets in
//! progress, one ticket's details or position) through a
//! [`sync::LiveSubscription`]: an initial REST pull, then the WebSocket push
//! channel. Pushed values always win over pulled ones.
//!
//! ## Architecture
//!
//! ```text
//! Consumers (monitor binary, AdviserDesk)
//!     │
//!     ├── LiveSubscription + Feed (sync/)
//!     │       │
//!     │       ├── SnapshotStore (sync/)
//!     │       ├── Backend / RestClient (api/)
//!     │       └── Transport (transport/)
//!     │               ├── SharedTransport ── FrameBus
//!     │               └── WsTransport ── ReconnectPolicy
//!     │
//!     └── SettingsStore (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod sync;
pub mod transport;
