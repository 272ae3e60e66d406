//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems record into:
//!     → stats.rs (counters, timers, gauges)
//!
//! Consumers:
//!     → export.rs console reporter (periodic snapshot via tracing)
//!     → export.rs graphite reporter (plaintext push)
//! ```
//!
//! # Design Decisions
//! - One process-wide registry, explicitly constructed and shared via Arc
//! - Metric updates are atomic; exporters only read snapshots
//! - Exporters are best-effort: a failed flush never blocks recording

pub mod export;
pub mod logging;
pub mod stats;

pub use stats::Stats;
