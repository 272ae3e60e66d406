//! Diff verdicts and reporting.
//!
//! # Responsibilities
//! - Decide match / diff / errored for each pair of backend responses
//! - Record global and per-bucket metrics under the operator-facing names
//! - Log a diagnostic report around the first point of divergence
//! - Forward diverging raw captures to the persistence writer
//!
//! # Design Decisions
//! - Metric names are assembled once per distinct bucket value and cached
//!   for the process lifetime; bucket cardinality is operator-controlled

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::diff::engine;
use crate::mirror::capture::RawCapture;
use crate::mirror::sender::BackendResponse;
use crate::observability::Stats;
use crate::persist::DiffLog;

/// Outcome of comparing one pair of backend responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Diff,
    /// Both calls errored, or errors are ignored and at least one did.
    Errored,
}

/// Resolved metric names for one scope (global or a single bucket).
#[derive(Debug)]
pub struct StatNames {
    pub total: String,
    pub matched: String,
    pub diff: String,
    pub err_a: String,
    pub err_b: String,
    pub rtt_a: String,
    pub rtt_b: String,
}

impl StatNames {
    fn global(name_a: &str, name_b: &str) -> Self {
        Self {
            total: "diffing.total".to_owned(),
            matched: "diffing.match".to_owned(),
            diff: "diffing.diff".to_owned(),
            err_a: format!("diffing.err.{name_a}"),
            err_b: format!("diffing.err.{name_b}"),
            rtt_a: format!("diffing.rtt.{name_a}"),
            rtt_b: format!("diffing.rtt.{name_b}"),
        }
    }

    fn for_bucket(bucket: &str, name_a: &str, name_b: &str) -> Self {
        Self {
            total: format!("diffing.{bucket}.total"),
            matched: format!("diffing.{bucket}.match"),
            diff: format!("diffing.{bucket}.diff"),
            err_a: format!("diffing.{bucket}.err.{name_a}"),
            err_b: format!("diffing.{bucket}.err.{name_b}"),
            rtt_a: format!("diffing.{bucket}.rtt.{name_a}"),
            rtt_b: format!("diffing.{bucket}.rtt.{name_b}"),
        }
    }
}

/// Comparison settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct DiffSettings {
    pub name_a: String,
    pub name_b: String,
    pub ignore_errors: bool,
    pub ignore_body_order: bool,
    pub compare_cmd: Option<String>,
}

/// Compares backend responses and records the layered metrics.
pub struct DiffReporter {
    settings: DiffSettings,
    stats: Arc<Stats>,

    total: AtomicU64,
    diffs: AtomicU64,

    names: StatNames,
    bucket_names: DashMap<String, Arc<StatNames>>,

    persist: Option<DiffLog>,
}

impl DiffReporter {
    pub fn new(settings: DiffSettings, stats: Arc<Stats>, persist: Option<DiffLog>) -> Self {
        let names = StatNames::global(&settings.name_a, &settings.name_b);
        Self {
            settings,
            stats,
            total: AtomicU64::new(0),
            diffs: AtomicU64::new(0),
            names,
            bucket_names: DashMap::new(),
            persist,
        }
    }

    fn names_for(&self, bucket: &str) -> Arc<StatNames> {
        if let Some(names) = self.bucket_names.get(bucket) {
            return names.clone();
        }
        self.bucket_names
            .entry(bucket.to_owned())
            .or_insert_with(|| {
                Arc::new(StatNames::for_bucket(
                    bucket,
                    &self.settings.name_a,
                    &self.settings.name_b,
                ))
            })
            .clone()
    }

    /// Compare one pair of responses, record metrics, and report any diff.
    pub async fn compare(
        &self,
        capture: &RawCapture,
        res_a: &BackendResponse,
        res_b: &BackendResponse,
        bucket: &str,
    ) -> Verdict {
        self.total.fetch_add(1, Ordering::Relaxed);

        let bucket_names = (!bucket.is_empty()).then(|| self.names_for(bucket));
        let scoped = |f: &dyn Fn(&StatNames)| {
            f(&self.names);
            if let Some(names) = &bucket_names {
                f(names);
            }
        };

        scoped(&|n| self.stats.inc(&n.total));

        let err_a = res_a.is_err();
        let err_b = res_b.is_err();

        if err_a {
            scoped(&|n| self.stats.inc(&n.err_a));
        } else {
            scoped(&|n| self.stats.timing(&n.rtt_a, res_a.rtt));
        }
        if err_b {
            scoped(&|n| self.stats.inc(&n.err_b));
        } else {
            scoped(&|n| self.stats.timing(&n.rtt_b, res_b.rtt));
        }

        if (err_a && err_b) || (self.settings.ignore_errors && (err_a || err_b)) {
            return Verdict::Errored;
        }

        if !err_a && !err_b && self.payloads_equivalent(res_a, res_b).await {
            scoped(&|n| self.stats.inc(&n.matched));
            return Verdict::Match;
        }

        self.diffs.fetch_add(1, Ordering::Relaxed);
        scoped(&|n| self.stats.inc(&n.diff));

        self.report_diff(capture, res_a, res_b, bucket);

        if let Some(persist) = &self.persist {
            persist.try_append(capture.wire.clone());
        }

        Verdict::Diff
    }

    /// Exact byte equality, then the external comparator if configured,
    /// then canonical order-insensitive comparison if enabled.
    async fn payloads_equivalent(&self, res_a: &BackendResponse, res_b: &BackendResponse) -> bool {
        if res_a.payload == res_b.payload {
            return true;
        }
        if let Some(cmd) = &self.settings.compare_cmd {
            return match engine::external_compare(cmd, &res_a.payload, &res_b.payload).await {
                Ok(equivalent) => equivalent,
                Err(error) => {
                    tracing::warn!(command = %cmd, error = %error, "comparator failed; treating as diff");
                    false
                }
            };
        }
        if self.settings.ignore_body_order {
            return engine::canonical_eq(&res_a.payload, &res_b.payload);
        }
        false
    }

    fn report_diff(
        &self,
        capture: &RawCapture,
        res_a: &BackendResponse,
        res_b: &BackendResponse,
        bucket: &str,
    ) {
        let limit = res_a.payload.len().min(res_b.payload.len());
        let i = engine::first_mismatch(&res_a.payload, &res_b.payload);
        let (start, end) = engine::context_bounds(i, limit);
        let snip_a = &res_a.payload[start..end];
        let snip_b = &res_b.payload[start..end];

        let size_a = res_a.payload.len() as i64;
        let size_b = res_b.payload.len() as i64;

        tracing::warn!(
            bucket = %bucket,
            diffs = self.diffs.load(Ordering::Relaxed),
            total = self.total.load(Ordering::Relaxed),
            method = %capture.meta.method,
            uri = %capture.meta.uri,
            status_a = res_a.status_code(),
            status_b = res_b.status_code(),
            size_a,
            size_b,
            size_delta = size_a - size_b,
            rtt_a_ms = res_a.rtt.as_millis() as u64,
            rtt_b_ms = res_b.rtt.as_millis() as u64,
            window_start = start,
            window_end = end,
            "response diff\n{}",
            render_snippets(&self.settings.name_a, snip_a, &self.settings.name_b, snip_b),
        );
    }

    /// Comparisons processed so far.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Diffs found so far.
    pub fn diffs(&self) -> u64 {
        self.diffs.load(Ordering::Relaxed)
    }
}

fn render_snippets(name_a: &str, snip_a: &[u8], name_b: &str, snip_b: &[u8]) -> String {
    let mut out = String::new();
    for (name, snip) in [(name_a, snip_a), (name_b, snip_b)] {
        let _ = writeln!(out, "######## {name} ########");
        let _ = writeln!(out, "{}", String::from_utf8_lossy(snip));
        let _ = writeln!(out, "{}", hex(snip));
    }
    let _ = write!(out, "####################");
    out
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
