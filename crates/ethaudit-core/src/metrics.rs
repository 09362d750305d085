//! Process-wide run counters.
//!
//! Counters are bumped at the call site; [`Metrics::flush`] emits all of them
//! as one `info!` event, typically when a run finishes.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    runs_started: AtomicU64,
    collect_passes: AtomicU64,
    retries: AtomicU64,
    runs_failed: AtomicU64,
    collector_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            collect_passes: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            collector_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_runs_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_started", "counter incremented");
    }

    pub fn inc_collect_passes(&self) {
        self.collect_passes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "collect_passes", "counter incremented");
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "retries", "counter incremented");
    }

    pub fn inc_runs_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "runs_failed", "counter incremented");
    }

    pub fn inc_collector_failures(&self) {
        self.collector_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "collector_failures", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            runs_started = self.runs_started(),
            collect_passes = self.collect_passes(),
            retries = self.retries(),
            runs_failed = self.runs_failed(),
            collector_failures = self.collector_failures(),
        );
    }

    pub fn runs_started(&self) -> u64 {
        self.runs_started.load(Ordering::Relaxed)
    }

    pub fn collect_passes(&self) -> u64 {
        self.collect_passes.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn runs_failed(&self) -> u64 {
        self.runs_failed.load(Ordering::Relaxed)
    }

    pub fn collector_failures(&self) -> u64 {
        self.collector_failures.load(Ordering::Relaxed)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.runs_started.store(0, Ordering::Relaxed);
        self.collect_passes.store(0, Ordering::Relaxed);
        self.retries.store(0, Ordering::Relaxed);
        self.runs_failed.store(0, Ordering::Relaxed);
        self.collector_failures.store(0, Ordering::Relaxed);
    }
}
