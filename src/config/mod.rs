//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! flags (cli.rs) or TOML file (loader.rs)
//!     → schema.rs (MirrorConfig, serde defaults)
//!     → validation.rs (semantic checks, all violations reported)
//!     → immutable MirrorConfig consumed at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - Exactly one bucketing strategy may be active; violations are fatal
//!   before any traffic is accepted

pub mod cli;
pub mod loader;
pub mod schema;
pub mod validation;

pub use cli::Cli;
pub use loader::ConfigError;
pub use schema::{BackendConfig, BucketConfig, MirrorConfig};
