//! Shadow-mirroring pipeline.
//!
//! # Data Flow
//! ```text
//! capture front (http)
//!     → capture.rs (RawCapture, immutable after ingestion)
//!     → dispatcher.rs (bounded queue, N workers)
//!         → bucket (classify once, require/exclude filter)
//!         → sender.rs (two concurrent replays, fork/join)
//!         → diff (verdict + metrics + persistence)
//! ```

pub mod capture;
pub mod dispatcher;
pub mod sender;

pub use capture::{RawCapture, RequestMeta};
pub use dispatcher::{Mirror, Submission, WorkTracker};
pub use sender::{BackendResponse, SendError};
