//! Finalizer processing metrics.
//!
//! Counters are kept per processor instance as relaxed atomics and read out
//! as a consistent-enough snapshot for logging and tests. They are
//! monotonically increasing over the life of the processor, surviving worker
//! restarts.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::epoch::Epoch;

/// Point-in-time snapshot of a processor's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizerMetrics {
    /// Non-empty batches drained by the worker.
    pub batches_processed: u64,
    /// Worker wakeups that found a fresh epoch but no queued work.
    pub empty_wakeups: u64,
    /// Empty schedules completed synchronously without a worker.
    pub sync_completions: u64,
    /// Worker threads spawned, counting restarts after shutdown.
    pub workers_started: u64,
    /// Epoch most recently reported through the completion callback.
    pub last_completed_epoch: Epoch,
}

#[derive(Debug, Default)]
pub(crate) struct MetricsInner {
    batches_processed: AtomicU64,
    empty_wakeups: AtomicU64,
    sync_completions: AtomicU64,
    workers_started: AtomicU64,
    last_completed_epoch: AtomicI64,
}

impl MetricsInner {
    pub(crate) fn record_batch(&self) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_empty_wakeup(&self) {
        self.empty_wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sync_completion(&self) {
        self.sync_completions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_worker_started(&self) {
        self.workers_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_completed_epoch(&self, epoch: Epoch) {
        self.last_completed_epoch.store(epoch.get(), Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FinalizerMetrics {
        FinalizerMetrics {
            batches_processed: self.batches_processed.load(Ordering::Relaxed),
            empty_wakeups: self.empty_wakeups.load(Ordering::Relaxed),
            sync_completions: self.sync_completions.load(Ordering::Relaxed),
            workers_started: self.workers_started.load(Ordering::Relaxed),
            last_completed_epoch: Epoch(self.last_completed_epoch.load(Ordering::Relaxed)),
        }
    }
}
