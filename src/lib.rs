//! HTTP traffic shadow-mirroring and differential testing.
//!
//! Every inbound request is captured, acknowledged immediately, and
//! replayed asynchronously against two candidate backends; the two
//! responses are compared byte-for-byte to detect behavioral drift.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────┐
//!                 │                    DIFFMIRROR                    │
//!                 │                                                  │
//!   Client ───────┼─▶ http (capture front) ──▶ bounded queue         │
//!     ◀── "OK" ───┼                              │ (drop on full)    │
//!                 │                              ▼                   │
//!                 │                        mirror workers            │
//!                 │                   classify → filter              │
//!                 │                      │                           │
//!                 │              ┌───────┴───────┐                   │
//!                 │              ▼               ▼                   │
//!    Backend A ◀──┼─── sender (replay)   sender (replay) ───────────┼──▶ Backend B
//!                 │              └───────┬───────┘                   │
//!                 │                      ▼                           │
//!                 │              diff (verdict, snippet)             │
//!                 │              │               │                   │
//!                 │              ▼               ▼                   │
//!                 │       observability      persist                 │
//!                 │       (stats, export)    (diverging requests)    │
//!                 └──────────────────────────────────────────────────┘
//! ```

// Core pipeline
pub mod bucket;
pub mod diff;
pub mod http;
pub mod mirror;

// Cross-cutting concerns
pub mod config;
pub mod observability;
pub mod persist;

pub use config::MirrorConfig;
pub use http::MirrorServer;
pub use mirror::Mirror;
