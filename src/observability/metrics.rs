//! Thread-safe metrics collection
//!
//! Atomic counters for the poll loop and page outcomes, plus mutex-protected
//! per-handler statistics.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Keep at most this many duration samples
const MAX_SAMPLES: usize = 1000;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

pub struct MetricsCollector {
    cycles_started: AtomicU64,
    cycles_failed: AtomicU64,
    last_cycle_at: AtomicU64,
    last_activity_at: AtomicU64,

    pages_processed: AtomicU64,
    pages_completed: AtomicU64,
    pages_degraded: AtomicU64,
    pages_failed: AtomicU64,
    pages_no_feedback: AtomicU64,
    pages_skipped: AtomicU64,

    handler_timeouts: AtomicU64,
    blocks_written: AtomicU64,

    // Page processing times in milliseconds
    page_durations: Mutex<Vec<u64>>,
    handler_stats: Mutex<HashMap<String, HandlerStats>>,

    started_at: AtomicU64,
}

#[derive(Debug, Clone, Default)]
struct HandlerStats {
    invocations: u64,
    failures: u64,
    durations: Vec<u64>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            cycles_started: AtomicU64::new(0),
            cycles_failed: AtomicU64::new(0),
            last_cycle_at: AtomicU64::new(0),
            last_activity_at: AtomicU64::new(0),
            pages_processed: AtomicU64::new(0),
            pages_completed: AtomicU64::new(0),
            pages_degraded: AtomicU64::new(0),
            pages_failed: AtomicU64::new(0),
            pages_no_feedback: AtomicU64::new(0),
            pages_skipped: AtomicU64::new(0),
            handler_timeouts: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
            page_durations: Mutex::new(Vec::new()),
            handler_stats: Mutex::new(HashMap::new()),
            started_at: AtomicU64::new(current_timestamp()),
        }
    }

    // Poll loop
    pub fn cycle_started(&self) {
        let now = current_timestamp();
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_at.store(now, Ordering::Relaxed);
        self.last_activity_at.store(now, Ordering::Relaxed);
    }

    pub fn cycle_failed(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Stamp loop progress at the start of each page
    pub fn page_started(&self) {
        self.last_activity_at
            .store(current_timestamp(), Ordering::Relaxed);
    }

    // Page outcomes
    pub fn page_completed(&self, duration: Duration) {
        self.pages_completed.fetch_add(1, Ordering::Relaxed);
        self.page_processed(duration);
    }

    pub fn page_degraded(&self, duration: Duration) {
        self.pages_degraded.fetch_add(1, Ordering::Relaxed);
        self.page_processed(duration);
    }

    pub fn page_failed(&self, duration: Duration) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
        self.page_processed(duration);
    }

    pub fn page_no_feedback(&self, duration: Duration) {
        self.pages_no_feedback.fetch_add(1, Ordering::Relaxed);
        self.page_processed(duration);
    }

    /// A page left in its actionable status because it could not be claimed
    pub fn page_skipped(&self) {
        self.pages_skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn page_processed(&self, duration: Duration) {
        self.pages_processed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut durations) = self.page_durations.lock() {
            push_sample(&mut durations, duration);
        }
    }

    // Handlers
    pub fn handler_invoked(&self, kind: &str, duration: Duration, success: bool) {
        if let Ok(mut stats) = self.handler_stats.lock() {
            let entry = stats.entry(kind.to_string()).or_default();
            entry.invocations += 1;
            if !success {
                entry.failures += 1;
            }
            push_sample(&mut entry.durations, duration);
        }
    }

    pub fn handler_timed_out(&self) {
        self.handler_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    // Content
    pub fn blocks_written(&self, count: usize) {
        self.blocks_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.cycles_started,
            &self.cycles_failed,
            &self.last_cycle_at,
            &self.last_activity_at,
            &self.pages_processed,
            &self.pages_completed,
            &self.pages_degraded,
            &self.pages_failed,
            &self.pages_no_feedback,
            &self.pages_skipped,
            &self.handler_timeouts,
            &self.blocks_written,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.started_at
            .store(current_timestamp(), Ordering::Relaxed);
        if let Ok(mut durations) = self.page_durations.lock() {
            durations.clear();
        }
        if let Ok(mut stats) = self.handler_stats.lock() {
            stats.clear();
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let now = current_timestamp();
        let (avg, p50, p95) = match self.page_durations.lock() {
            Ok(durations) => duration_summary(&durations),
            Err(_) => (0.0, 0.0, 0.0),
        };

        let handlers = match self.handler_stats.lock() {
            Ok(stats) => stats
                .iter()
                .map(|(kind, stats)| (kind.clone(), HandlerStatsSnapshot::from(stats)))
                .collect(),
            Err(_) => HashMap::new(),
        };

        MetricsSnapshot {
            timestamp: now,
            uptime_seconds: now.saturating_sub(self.started_at.load(Ordering::Relaxed)),
            poller: PollerMetrics {
                cycles_started: self.cycles_started.load(Ordering::Relaxed),
                cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
                last_cycle_at: self.last_cycle_at.load(Ordering::Relaxed),
                last_activity_at: self.last_activity_at.load(Ordering::Relaxed),
            },
            pages: PageMetrics {
                processed: self.pages_processed.load(Ordering::Relaxed),
                completed: self.pages_completed.load(Ordering::Relaxed),
                degraded: self.pages_degraded.load(Ordering::Relaxed),
                failed: self.pages_failed.load(Ordering::Relaxed),
                no_feedback: self.pages_no_feedback.load(Ordering::Relaxed),
                skipped: self.pages_skipped.load(Ordering::Relaxed),
                avg_duration_ms: avg,
                p50_duration_ms: p50,
                p95_duration_ms: p95,
            },
            handlers,
            handler_timeouts: self.handler_timeouts.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
        }
    }
}

/// Serializable point-in-time view of the collector
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub poller: PollerMetrics,
    pub pages: PageMetrics,
    pub handlers: HashMap<String, HandlerStatsSnapshot>,
    pub handler_timeouts: u64,
    pub blocks_written: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollerMetrics {
    pub cycles_started: u64,
    pub cycles_failed: u64,
    /// Unix timestamp of the last cycle start, 0 before the first cycle
    pub last_cycle_at: u64,
    /// Unix timestamp of the last cycle or page start, 0 before the first cycle
    pub last_activity_at: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PageMetrics {
    pub processed: u64,
    pub completed: u64,
    pub degraded: u64,
    pub failed: u64,
    pub no_feedback: u64,
    pub skipped: u64,
    pub avg_duration_ms: f64,
    pub p50_duration_ms: f64,
    pub p95_duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HandlerStatsSnapshot {
    pub invocations: u64,
    pub failures: u64,
    pub avg_duration_ms: f64,
    pub success_rate: f64,
}

impl From<&HandlerStats> for HandlerStatsSnapshot {
    fn from(stats: &HandlerStats) -> Self {
        let (avg, _, _) = duration_summary(&stats.durations);
        let success_rate = if stats.invocations == 0 {
            0.0
        } else {
            (stats.invocations - stats.failures) as f64 / stats.invocations as f64
        };
        Self {
            invocations: stats.invocations,
            failures: stats.failures,
            avg_duration_ms: avg,
            success_rate,
        }
    }
}

fn push_sample(samples: &mut Vec<u64>, duration: Duration) {
    samples.push(duration.as_millis() as u64);
    if samples.len() > MAX_SAMPLES {
        samples.remove(0);
    }
}

/// Average, p50 and p95 of the samples
fn duration_summary(samples: &[u64]) -> (f64, f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let avg = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
    (avg, percentile(&sorted, 50.0), percentile(&sorted, 95.0))
}

/// Nearest-rank percentile of sorted data
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)] as f64
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
