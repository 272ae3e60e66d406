//! Process-wide metrics registry.
//!
//! # Responsibilities
//! - Counters, gauges and timers keyed by dotted metric names
//! - Safe under unbounded concurrent writers
//! - Read-back of counters for tests and diff reporting
//!
//! # Design Decisions
//! - `DashMap` shards the name space; the fast path for an existing metric
//!   is a shared read plus one atomic op, no allocation
//! - Timers keep count/total/min/max only; percentiles are left to the
//!   downstream time-series store

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;

/// Aggregate state of one named timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerStat {
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl TimerStat {
    /// Mean duration over all recorded samples.
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        self.total / self.count as u32
    }

    fn record(&mut self, sample: Duration) {
        if self.count == 0 || sample < self.min {
            self.min = sample;
        }
        if sample > self.max {
            self.max = sample;
        }
        self.count += 1;
        self.total += sample;
    }
}

/// Point-in-time view of the whole registry, sorted by name.
#[derive(Debug, Default)]
pub struct StatsSnapshot {
    pub counters: Vec<(String, i64)>,
    pub gauges: Vec<(String, i64)>,
    pub timers: Vec<(String, TimerStat)>,
}

/// Concurrent-safe counters, gauges and timers.
///
/// Created once at startup and shared by every component that records
/// metrics. Metric names are created lazily on first use and live for the
/// process lifetime.
#[derive(Debug, Default)]
pub struct Stats {
    counters: DashMap<String, AtomicI64>,
    gauges: DashMap<String, AtomicI64>,
    timers: DashMap<String, Mutex<TimerStat>>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one.
    pub fn inc(&self, name: &str) {
        if let Some(counter) = self.counters.get(name) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        self.counters
            .entry(name.to_owned())
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Current value of a counter; zero if never incremented.
    pub fn count(&self, name: &str) -> i64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Set a gauge to an absolute value.
    pub fn set_gauge(&self, name: &str, value: i64) {
        if let Some(gauge) = self.gauges.get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        self.gauges
            .entry(name.to_owned())
            .or_insert_with(|| AtomicI64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Current value of a gauge; zero if never set.
    pub fn gauge(&self, name: &str) -> i64 {
        self.gauges
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record one duration sample against a named timer.
    pub fn timing(&self, name: &str, sample: Duration) {
        if let Some(timer) = self.timers.get(name) {
            timer.lock().expect("timer lock poisoned").record(sample);
            return;
        }
        self.timers
            .entry(name.to_owned())
            .or_insert_with(|| Mutex::new(TimerStat::default()))
            .lock()
            .expect("timer lock poisoned")
            .record(sample);
    }

    /// Aggregate state of a timer; `None` if never recorded.
    pub fn timer(&self, name: &str) -> Option<TimerStat> {
        self.timers
            .get(name)
            .map(|t| *t.lock().expect("timer lock poisoned"))
    }

    /// Capture a sorted snapshot of every metric for export.
    pub fn snapshot(&self) -> StatsSnapshot {
        let mut snap = StatsSnapshot::default();
        for entry in self.counters.iter() {
            snap.counters
                .push((entry.key().clone(), entry.value().load(Ordering::Relaxed)));
        }
        for entry in self.gauges.iter() {
            snap.gauges
                .push((entry.key().clone(), entry.value().load(Ordering::Relaxed)));
        }
        for entry in self.timers.iter() {
            let stat = *entry.value().lock().expect("timer lock poisoned");
            snap.timers.push((entry.key().clone(), stat));
        }
        snap.counters.sort_by(|a, b| a.0.cmp(&b.0));
        snap.gauges.sort_by(|a, b| a.0.cmp(&b.0));
        snap.timers.sort_by(|a, b| a.0.cmp(&b.0));
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_round_trip() {
        let stats = Stats::new();
        assert_eq!(stats.count("mirror.requests"), 0);
        stats.inc("mirror.requests");
        stats.inc("mirror.requests");
        assert_eq!(stats.count("mirror.requests"), 2);
    }

    #[test]
    fn gauge_overwrites() {
        let stats = Stats::new();
        stats.set_gauge("mirror.queue", 3);
        stats.set_gauge("mirror.queue", 1);
        assert_eq!(stats.gauge("mirror.queue"), 1);
    }

    #[test]
    fn timer_tracks_bounds() {
        let stats = Stats::new();
        stats.timing("diffing.rtt.a", Duration::from_millis(10));
        stats.timing("diffing.rtt.a", Duration::from_millis(30));
        let stat = stats.timer("diffing.rtt.a").unwrap();
        assert_eq!(stat.count, 2);
        assert_eq!(stat.min, Duration::from_millis(10));
        assert_eq!(stat.max, Duration::from_millis(30));
        assert_eq!(stat.mean(), Duration::from_millis(20));
    }

    #[test]
    fn snapshot_is_sorted() {
        let stats = Stats::new();
        stats.inc("b");
        stats.inc("a");
        let snap = stats.snapshot();
        let names: Vec<_> = snap.counters.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn concurrent_increments_all_land() {
        let stats = std::sync::Arc::new(Stats::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = stats.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    stats.inc("diffing.total");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.count("diffing.total"), 8000);
    }
}
