//! Diff engine.
//!
//! # Data Flow
//! ```text
//! worker (two BackendResponses + bucket)
//!     → reporter.rs (verdict, layered metrics, diagnostic report)
//!         → engine.rs (first-mismatch scan, context windows,
//!                      canonical / external comparison)
//!         → persist (diverging raw captures)
//! ```

pub mod engine;
pub mod reporter;

pub use reporter::{DiffReporter, DiffSettings, Verdict};
