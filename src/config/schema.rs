//! Configuration schema definitions.
//!
//! All types derive Serde traits so a full configuration can also be
//! loaded from a TOML file instead of flags.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bucket::Bucketer;

/// Root configuration for the mirror.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Listen address for the capture front (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Trusted baseline backend.
    pub backend_a: BackendConfig,

    /// Candidate backend under validation.
    pub backend_b: BackendConfig,

    /// Number of mirror workers.
    pub workers: usize,

    /// Ingestion queue capacity; overflow drops captures.
    pub queue_capacity: usize,

    /// Compare only response bodies (exclude status line and headers).
    pub body_only: bool,

    /// Skip the match/diff verdict when either backend call errors.
    pub ignore_errors: bool,

    /// Treat payloads with equal byte multisets as matching.
    pub ignore_body_order: bool,

    /// External comparator command; takes precedence over
    /// `ignore_body_order` when set.
    pub compare_cmd: Option<String>,

    /// Bucketing strategy; at most one.
    pub bucket: Option<BucketConfig>,

    /// Only mirror requests whose bucket equals this value.
    pub require_bucket: Option<String>,

    /// Skip requests whose bucket equals this value.
    pub exclude_bucket: Option<String>,

    /// File in which to persist requests that generated diffs.
    pub requests_file: Option<PathBuf>,

    /// Log a stats snapshot to the console periodically.
    pub print_stats: bool,

    /// Address of a graphite receiver for stats.
    pub graphite: Option<String>,

    /// Prefix for graphite metric names.
    pub graphite_prefix: String,

    /// Enable the pipeline-drain barrier. Test harnesses only.
    pub track_work: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_owned(),
            backend_a: BackendConfig {
                name: "a".to_owned(),
                address: String::new(),
            },
            backend_b: BackendConfig {
                name: "b".to_owned(),
                address: String::new(),
            },
            workers: 10,
            queue_capacity: 100,
            body_only: true,
            ignore_errors: true,
            ignore_body_order: false,
            compare_cmd: None,
            bucket: None,
            require_bucket: None,
            exclude_bucket: None,
            requests_file: None,
            print_stats: true,
            graphite: None,
            graphite_prefix: String::new(),
            track_work: false,
        }
    }
}

/// One backend: address plus the display alias used in metric names.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Display alias (appears in `diffing.err.<alias>` etc).
    pub name: String,

    /// Backend address (e.g. "127.0.0.1:3000").
    pub address: String,
}

/// Bucketing strategy selection with its offsets.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum BucketConfig {
    /// Slice `[start..end)` of the body.
    BodySlice { start: usize, end: usize },
    /// Path segments `[start..end)` joined with `_`.
    PathParts { start: usize, end: usize },
    /// NUL-terminated string at a body offset.
    Cstring { start: usize },
    /// Big-endian length-prefixed string at a body offset.
    Strlen { pos: usize },
}

impl BucketConfig {
    pub fn to_bucketer(&self) -> Bucketer {
        match *self {
            BucketConfig::BodySlice { start, end } => Bucketer::RangeSlice { start, end },
            BucketConfig::PathParts { start, end } => Bucketer::PathSegment { start, end },
            BucketConfig::Cstring { start } => Bucketer::NullTerminatedString { start },
            BucketConfig::Strlen { pos } => Bucketer::LengthPrefixedString { pos },
        }
    }
}
