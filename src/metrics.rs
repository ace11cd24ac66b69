//! Process-wide counters, incremented from request handlers and from the
//! watcher's batch-apply step. Plain atomics, the same shape as the
//! `AtomicUsize` fields the indexing layer already carried per-workspace,
//! generalized here to a single process-wide struct.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Default)]
pub struct WatcherCounters {
    pub changed: AtomicU64,
    pub created: AtomicU64,
    pub deleted: AtomicU64,
    pub errors: AtomicU64,
}

impl WatcherCounters {
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.changed.load(Ordering::Relaxed),
            self.created.load(Ordering::Relaxed),
            self.deleted.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}

pub struct Metrics {
    start: Instant,
    requests_total: AtomicU64,
    requests_search: AtomicU64,
    requests_index: AtomicU64,
    requests_tools: AtomicU64,
    errors: AtomicU64,
    last_index_time: parking_lot::RwLock<Option<String>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            requests_total: AtomicU64::new(0),
            requests_search: AtomicU64::new(0),
            requests_index: AtomicU64::new(0),
            requests_tools: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            last_index_time: parking_lot::RwLock::new(None),
        }
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search(&self) {
        self.requests_search.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index(&self) {
        self.requests_index.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tools(&self) {
        self.requests_tools.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_index_completed(&self, at: String) {
        *self.last_index_time.write() = Some(at);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start.elapsed().as_secs()
    }

    pub fn requests_per_second(&self) -> f64 {
        let uptime = self.uptime_seconds().max(1);
        self.requests_total.load(Ordering::Relaxed) as f64 / uptime as f64
    }

    pub fn counts(&self) -> RequestCounts {
        RequestCounts {
            total: self.requests_total.load(Ordering::Relaxed),
            search: self.requests_search.load(Ordering::Relaxed),
            index: self.requests_index.load(Ordering::Relaxed),
            tools: self.requests_tools.load(Ordering::Relaxed),
            requests_per_second: self.requests_per_second(),
        }
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn last_index_time(&self) -> Option<String> {
        self.last_index_time.read().clone()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
pub struct RequestCounts {
    pub total: u64,
    pub search: u64,
    pub index: u64,
    pub tools: u64,
    pub requests_per_second: f64,
}

/// Rough RSS reading from `/proc/self/status`. Falls back to zero on
/// platforms without procfs; this daemon has no dependency that exposes a
/// richer allocator-level heap breakdown, so `heap_used_mb`/`heap_total_mb`
/// are reported equal to RSS.
pub fn memory_usage_mb() -> (f64, f64, f64) {
    let rss_mb = read_proc_status_vm_rss_kb()
        .map(|kb| kb as f64 / 1024.0)
        .unwrap_or(0.0);
    (rss_mb, rss_mb, rss_mb)
}

fn read_proc_status_vm_rss_kb() -> Option<u64> {
    let contents = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest.trim().split_whitespace().next()?.parse().ok();
        }
    }
    None
}
