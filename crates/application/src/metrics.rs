use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide dispatch counters. Every query lands in exactly one of
/// `resolved`, `timed_out` or `failed`.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    received: AtomicU64,
    resolved: AtomicU64,
    timed_out: AtomicU64,
    failed: AtomicU64,
    cache_hits: AtomicU64,
    poisoned: AtomicU64,
    stragglers: AtomicU64,
    probes: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub resolved: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub cache_hits: u64,
    pub poisoned: u64,
    pub stragglers: u64,
    pub probes: u64,
}

impl MetricsSnapshot {
    pub fn terminal(&self) -> u64 {
        self.resolved + self.timed_out + self.failed
    }
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timed_out(&self) {
        self.timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_poisoned(&self) {
        self.poisoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stragglers(&self, count: u64) {
        if count > 0 {
            self.stragglers.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_probe(&self) {
        self.probes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            poisoned: self.poisoned.load(Ordering::Relaxed),
            stragglers: self.stragglers.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
        }
    }
}
