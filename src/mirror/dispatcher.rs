//! Mirror dispatcher.
//!
//! # Responsibilities
//! - Own the bounded ingestion queue and the fixed worker pool
//! - Per dequeued capture: classify → filter → dual-send → diff → record
//!
//! # Design Decisions
//! - Enqueue is `try_send` only; a full queue drops the capture and bumps
//!   `mirror.dropped` — the sole backpressure mechanism, intentionally
//!   lossy so the caller-facing path is never slowed
//! - The two backend sends are a structured fork/join with no timeout; a
//!   hung backend stalls one worker, bounding backlog by pool size plus
//!   queue capacity
//! - Per-request failures are folded into metrics; a worker never exits
//!   its loop because of one

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex, Notify};

use crate::bucket::Bucketer;
use crate::config::MirrorConfig;
use crate::diff::{DiffReporter, DiffSettings};
use crate::mirror::capture::RawCapture;
use crate::mirror::sender;
use crate::observability::Stats;
use crate::persist::DiffLog;

/// Outcome of a non-blocking enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Accepted,
    Dropped,
}

/// Shared per-worker environment, fixed at startup.
struct WorkerContext {
    stats: Arc<Stats>,
    reporter: DiffReporter,

    bucketer: Option<Bucketer>,
    require_bucket: Option<String>,
    exclude_bucket: Option<String>,

    host_a: String,
    host_b: String,
    name_a: String,
    name_b: String,
    body_only: bool,
}

impl WorkerContext {
    fn filtered_out(&self, bucket: &str) -> bool {
        if let Some(required) = &self.require_bucket {
            if bucket != required {
                return true;
            }
        }
        if let Some(excluded) = &self.exclude_bucket {
            if bucket == excluded {
                return true;
            }
        }
        false
    }
}

/// The shadow-mirroring pipeline: bounded queue plus N workers.
pub struct Mirror {
    tx: mpsc::Sender<RawCapture>,
    stats: Arc<Stats>,
    queue_capacity: usize,
    tracker: Option<Arc<WorkTracker>>,
}

impl Mirror {
    /// Build the pipeline and spawn its workers.
    pub fn new(config: &MirrorConfig, stats: Arc<Stats>) -> Self {
        let persist = config.requests_file.clone().map(DiffLog::spawn);

        let reporter = DiffReporter::new(
            DiffSettings {
                name_a: config.backend_a.name.clone(),
                name_b: config.backend_b.name.clone(),
                ignore_errors: config.ignore_errors,
                ignore_body_order: config.ignore_body_order,
                compare_cmd: config.compare_cmd.clone(),
            },
            stats.clone(),
            persist,
        );

        let context = Arc::new(WorkerContext {
            stats: stats.clone(),
            reporter,
            bucketer: config.bucket.as_ref().map(|b| b.to_bucketer()),
            require_bucket: config.require_bucket.clone(),
            exclude_bucket: config.exclude_bucket.clone(),
            host_a: config.backend_a.address.clone(),
            host_b: config.backend_b.address.clone(),
            name_a: config.backend_a.name.clone(),
            name_b: config.backend_b.name.clone(),
            body_only: config.body_only,
        });

        let tracker = config.track_work.then(|| Arc::new(WorkTracker::default()));

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        for id in 0..config.workers.max(1) {
            tokio::spawn(worker(id, rx.clone(), context.clone(), tracker.clone()));
        }

        Self {
            tx,
            stats,
            queue_capacity: config.queue_capacity,
            tracker,
        }
    }

    /// Non-blocking enqueue. A full queue drops the capture and counts it;
    /// it never stalls the caller-facing response path.
    pub fn submit(&self, capture: RawCapture) -> Submission {
        if let Some(tracker) = &self.tracker {
            tracker.begin();
        }
        match self.tx.try_send(capture) {
            Ok(()) => {
                let depth = self.queue_capacity - self.tx.capacity();
                self.stats.set_gauge("mirror.queue", depth as i64);
                Submission::Accepted
            }
            Err(_) => {
                if let Some(tracker) = &self.tracker {
                    tracker.end();
                }
                self.stats.inc("mirror.dropped");
                Submission::Dropped
            }
        }
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Test-only synchronization handle; present only when `track_work`
    /// was set in the configuration.
    pub fn work_tracker(&self) -> Option<Arc<WorkTracker>> {
        self.tracker.clone()
    }
}

async fn worker(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<RawCapture>>>,
    context: Arc<WorkerContext>,
    tracker: Option<Arc<WorkTracker>>,
) {
    tracing::debug!(worker = id, "mirror worker started");
    loop {
        let capture = rx.lock().await.recv().await;
        let Some(capture) = capture else {
            break;
        };
        handle(&context, capture).await;
        if let Some(tracker) = &tracker {
            tracker.end();
        }
    }
    tracing::debug!(worker = id, "mirror worker stopped");
}

async fn handle(context: &WorkerContext, capture: RawCapture) {
    context.stats.inc("mirror.requests");
    let start = Instant::now();

    // Classification happens exactly once per capture.
    let bucket = context
        .bucketer
        .as_ref()
        .map(|b| b.classify(&capture.meta, &capture.body))
        .unwrap_or_default();

    if !bucket.is_empty() {
        context.stats.inc(&format!("mirror.requests-{bucket}"));
    }

    if context.filtered_out(&bucket) {
        context.stats.inc("mirror.ignored-bucket");
        return;
    }

    let (res_a, res_b) = tokio::join!(
        sender::send_and_time(&capture, &context.host_a, context.body_only),
        sender::send_and_time(&capture, &context.host_b, context.body_only),
    );

    if let Some(error) = &res_a.error {
        tracing::warn!(backend = %context.name_a, error = %error, "error mirroring request");
    }
    if let Some(error) = &res_b.error {
        tracing::warn!(backend = %context.name_b, error = %error, "error mirroring request");
    }

    context.reporter.compare(&capture, &res_a, &res_b, &bucket).await;

    context.stats.timing("mirror.time", start.elapsed());
}

/// Pending-work barrier for test harnesses.
///
/// Counts captures from accepted submission to the end of worker
/// processing. Never constructed on the production path.
#[derive(Debug, Default)]
pub struct WorkTracker {
    pending: AtomicUsize,
    idle: Notify,
}

impl WorkTracker {
    fn begin(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn end(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Wait until every accepted capture has drained through the pipeline.
    pub async fn wait_idle(&self) {
        loop {
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            let notified = self.idle.notified();
            if self.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}
