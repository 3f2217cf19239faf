// Process-lifetime pipeline counters, logged periodically at INFO.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PipelineStats {
    pub ticks: AtomicU64,
    pub readings: AtomicU64,
    pub reader_failures: AtomicU64,
    pub alerts: AtomicU64,
    pub flushes: AtomicU64,
    pub batches_dropped: AtomicU64,
    pub broadcast_failures: AtomicU64,
    pub store_failures: AtomicU64,
    pub ledger_failures: AtomicU64,
}

impl PipelineStats {
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn log(&self, live_subscribers: usize) {
        tracing::info!(
            ticks = Self::get(&self.ticks),
            readings = Self::get(&self.readings),
            reader_failures = Self::get(&self.reader_failures),
            alerts = Self::get(&self.alerts),
            flushes = Self::get(&self.flushes),
            batches_dropped = Self::get(&self.batches_dropped),
            broadcast_failures = Self::get(&self.broadcast_failures),
            store_failures = Self::get(&self.store_failures),
            ledger_failures = Self::get(&self.ledger_failures),
            live_subscribers,
            "pipeline stats"
        );
    }
}
