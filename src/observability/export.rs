//! Periodic metric exporters.
//!
//! # Responsibilities
//! - Console reporter: human-readable snapshot logged on an interval
//! - Graphite reporter: plaintext-protocol push to a remote receiver
//!
//! Both run as detached tasks and are best-effort: a failed flush is
//! logged and the next interval tries again from scratch.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::observability::stats::{Stats, StatsSnapshot};

/// Spawn a task that logs a registry snapshot every `interval`.
pub fn spawn_console_reporter(stats: Arc<Stats>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let snap = stats.snapshot();
            tracing::info!("stats snapshot\n{}", render_snapshot(&snap));
        }
    });
}

fn render_snapshot(snap: &StatsSnapshot) -> String {
    let mut out = String::new();
    for (name, value) in &snap.counters {
        let _ = writeln!(out, "  counter {name}: {value}");
    }
    for (name, value) in &snap.gauges {
        let _ = writeln!(out, "  gauge   {name}: {value}");
    }
    for (name, stat) in &snap.timers {
        let _ = writeln!(
            out,
            "  timer   {name}: count={} mean={:?} min={:?} max={:?}",
            stat.count,
            stat.mean(),
            stat.min,
            stat.max,
        );
    }
    out
}

/// Spawn a task that pushes the registry to a graphite receiver every
/// `interval`, using the plaintext protocol. Connection failures are
/// logged at warn and the round is skipped.
pub fn spawn_graphite_reporter(
    stats: Arc<Stats>,
    addr: String,
    prefix: String,
    interval: Duration,
) {
    tracing::info!(address = %addr, prefix = %prefix, "stats reporting to graphite");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(err) = flush_graphite(&stats, &addr, &prefix).await {
                tracing::warn!(address = %addr, error = %err, "graphite flush failed");
            }
        }
    });
}

async fn flush_graphite(stats: &Stats, addr: &str, prefix: &str) -> std::io::Result<()> {
    let snap = stats.snapshot();
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();

    let mut payload = String::new();
    for (name, value) in &snap.counters {
        let _ = writeln!(payload, "{}{} {} {}", dotted(prefix), name, value, ts);
    }
    for (name, value) in &snap.gauges {
        let _ = writeln!(payload, "{}{} {} {}", dotted(prefix), name, value, ts);
    }
    for (name, stat) in &snap.timers {
        let p = dotted(prefix);
        let _ = writeln!(payload, "{p}{name}.count {} {ts}", stat.count);
        let _ = writeln!(payload, "{p}{name}.mean_ms {} {ts}", stat.mean().as_millis());
        let _ = writeln!(payload, "{p}{name}.max_ms {} {ts}", stat.max.as_millis());
    }

    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(payload.as_bytes()).await?;
    stream.flush().await?;
    Ok(())
}

fn dotted(prefix: &str) -> String {
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}.")
    }
}
