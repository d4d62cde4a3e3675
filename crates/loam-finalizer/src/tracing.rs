//! Finalizer tracing support.
//!
//! When the `tracing` feature is enabled, this module provides structured
//! tracing spans and events for the scheduling and draining of finalization
//! work. With the feature disabled the call sites compile away entirely.

#[cfg(feature = "tracing")]
pub mod internal {
    use tracing::{span, Level};

    use crate::epoch::Epoch;

    /// Create a span covering one drained batch on the worker thread.
    pub fn trace_drain(epoch: Epoch) -> span::EnteredSpan {
        span!(Level::DEBUG, "finalizer_drain", epoch = epoch.get()).entered()
    }

    /// Log work handed to the processor.
    pub fn log_scheduled(epoch: Epoch, started_worker: bool) {
        tracing::debug!(epoch = epoch.get(), started_worker, "finalizers_scheduled");
    }

    /// Log an empty schedule completed without involving the worker.
    pub fn log_sync_completion(epoch: Epoch) {
        tracing::trace!(epoch = epoch.get(), "finalizers_done_inline");
    }

    /// Log worker thread startup.
    pub fn log_worker_started() {
        tracing::debug!("finalizer_worker_started");
    }

    /// Log worker thread exit.
    pub fn log_worker_exited() {
        tracing::debug!("finalizer_worker_exited");
    }

    /// Log a shutdown request being handed to the worker.
    pub fn log_stop_requested() {
        tracing::debug!("finalizer_stop_requested");
    }

    /// Log a completed shutdown, with the processor ready for reuse.
    pub fn log_stopped() {
        tracing::debug!("finalizer_stopped");
    }
}
