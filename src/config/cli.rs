//! Flag parsing and settings construction.
//!
//! The flag surface mirrors the operational knobs one backend migration
//! needs: two backends with optional display aliases, one bucketing
//! strategy, and the comparison/reporting toggles.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::loader::{self, ConfigError};
use crate::config::schema::{BackendConfig, BucketConfig, MirrorConfig};
use crate::config::validation::validate;

#[derive(Debug, Parser)]
#[command(
    name = "diffmirror",
    about = "Shadow-mirror HTTP traffic against two backends and diff the responses"
)]
pub struct Cli {
    /// Listen address ("8080", ":8080" or "0.0.0.0:8080")
    #[arg(required_unless_present = "config")]
    pub listen: Option<String>,

    /// Baseline backend, "[alias=]host:port" (alias defaults to "a")
    #[arg(required_unless_present = "config")]
    pub backend_a: Option<String>,

    /// Candidate backend, "[alias=]host:port" (alias defaults to "b")
    #[arg(required_unless_present = "config")]
    pub backend_b: Option<String>,

    /// Load the full configuration from a TOML file instead of flags
    #[arg(long, conflicts_with_all = ["listen", "backend_a", "backend_b"])]
    pub config: Option<PathBuf>,

    /// Number of worker tasks
    #[arg(long, default_value_t = 10)]
    pub workers: usize,

    /// Ingestion queue capacity
    #[arg(long, default_value_t = 100)]
    pub queue_capacity: usize,

    /// Filename in which to store requests that generated diffs
    #[arg(long)]
    pub requests_file: Option<PathBuf>,

    /// Print stats to console periodically
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub stats: bool,

    /// Address of graphite receiver for stats
    #[arg(long)]
    pub graphite: Option<String>,

    /// Prefix for graphite writes
    #[arg(long, default_value = "")]
    pub graphite_prefix: String,

    /// start:end offsets to slice from the body for bucketing
    #[arg(long, value_name = "START:END")]
    pub bucket_by_body_slice: Option<String>,

    /// start:end offsets for path parts (split by /) for bucketing
    #[arg(long, value_name = "START:END")]
    pub bucket_by_path_parts: Option<String>,

    /// Offset into body of a null-terminated string for bucketing
    #[arg(long, value_name = "OFFSET")]
    pub bucket_by_cstring: Option<usize>,

    /// Offset into body of a length-prefixed string for bucketing
    #[arg(long, value_name = "OFFSET")]
    pub bucket_by_strlen: Option<usize>,

    /// Only mirror requests matching this bucket
    #[arg(long)]
    pub require_bucket: Option<String>,

    /// Ignore requests matching this bucket
    #[arg(long)]
    pub exclude_bucket: Option<String>,

    /// Ignore network errors and 5xx responses
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub ignore_errors: bool,

    /// Compare only the body of responses (exclude headers)
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub body_only: bool,

    /// Consider responses equal when their bytes match in any order
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub ignore_body_order: bool,

    /// External command deciding equivalence (invoked with two file paths)
    #[arg(long)]
    pub compare_cmd: Option<String>,
}

impl Cli {
    /// Assemble and validate the runtime configuration.
    pub fn into_config(self) -> Result<MirrorConfig, ConfigError> {
        if let Some(path) = &self.config {
            return loader::load(path);
        }

        // Positionals are present whenever --config is absent.
        let listen = normalize_listen(self.listen.as_deref().unwrap_or_default());
        let (name_a, host_a) = extract_alias(self.backend_a.as_deref().unwrap_or_default(), "a");
        let (name_b, host_b) = extract_alias(self.backend_b.as_deref().unwrap_or_default(), "b");

        let config = MirrorConfig {
            listen,
            backend_a: BackendConfig {
                name: name_a,
                address: host_a,
            },
            backend_b: BackendConfig {
                name: name_b,
                address: host_b,
            },
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            body_only: self.body_only,
            ignore_errors: self.ignore_errors,
            ignore_body_order: self.ignore_body_order,
            compare_cmd: self.compare_cmd,
            bucket: select_bucketer(
                self.bucket_by_body_slice.as_deref(),
                self.bucket_by_path_parts.as_deref(),
                self.bucket_by_cstring,
                self.bucket_by_strlen,
            )?,
            require_bucket: self.require_bucket,
            exclude_bucket: self.exclude_bucket,
            requests_file: self.requests_file,
            print_stats: self.stats,
            graphite: self.graphite,
            graphite_prefix: self.graphite_prefix,
            track_work: false,
        };

        validate(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Resolve the bucketing flags, insisting on at most one strategy.
fn select_bucketer(
    body_slice: Option<&str>,
    path_parts: Option<&str>,
    cstring: Option<usize>,
    strlen: Option<usize>,
) -> Result<Option<BucketConfig>, ConfigError> {
    let mut selected = Vec::new();

    if let Some(pair) = body_slice {
        let (start, end) = int_pair(pair)?;
        selected.push(BucketConfig::BodySlice { start, end });
    }
    if let Some(pair) = path_parts {
        let (start, end) = int_pair(pair)?;
        selected.push(BucketConfig::PathParts { start, end });
    }
    if let Some(start) = cstring {
        selected.push(BucketConfig::Cstring { start });
    }
    if let Some(pos) = strlen {
        selected.push(BucketConfig::Strlen { pos });
    }

    if selected.len() > 1 {
        return Err(ConfigError::Invalid(
            "cannot specify more than one bucketing strategy".to_owned(),
        ));
    }
    Ok(selected.pop())
}

/// Parse a "start:end" offset pair.
fn int_pair(s: &str) -> Result<(usize, usize), ConfigError> {
    let invalid = || ConfigError::Invalid(format!("'{s}': must provide 'start:end'"));
    let (start, end) = s.split_once(':').ok_or_else(invalid)?;
    Ok((
        start.parse().map_err(|_| invalid())?,
        end.parse().map_err(|_| invalid())?,
    ))
}

/// Split "alias=host" into its parts, falling back to a default alias.
fn extract_alias(s: &str, default: &str) -> (String, String) {
    match s.split_once('=') {
        Some((alias, host)) => (alias.to_owned(), host.to_owned()),
        None => (default.to_owned(), s.to_owned()),
    }
}

/// Accept bare ports and ":port" shorthands for the listen address.
fn normalize_listen(listen: &str) -> String {
    if listen.starts_with(':') {
        format!("0.0.0.0{listen}")
    } else if !listen.contains(':') {
        format!("0.0.0.0:{listen}")
    } else {
        listen.to_owned()
    }
}
