//! Asynchronous finalizer processing for the loam garbage collector.
//!
//! `loam-finalizer` owns the last stage of a collection cycle: running the
//! finalizers of dead objects off the collector's critical path. The
//! collector hands over batches of finalization work tagged with an *epoch*
//! (the identifier of the collection cycle that produced it); a single
//! dedicated worker thread drains those batches in order and reports each
//! completed epoch back through a callback, so the collector can mark the
//! cycle fully finished.
//!
//! # Features
//!
//! - **Epoch-tagged batches**: schedules between worker wakeups coalesce,
//!   and completing a batch completes the latest epoch scheduled into it
//! - **Restartable shutdown**: [`FinalizerProcessor::stop`] drains, joins,
//!   and resets; the same processor can spawn a fresh worker afterwards
//! - **Pluggable queues**: the batch representation is a [`QueuePolicy`],
//!   with [`RunClosures`] provided for boxed-closure finalizers
//! - **Host loop integration** (`run-loop` feature): the worker can park
//!   inside a platform event loop instead of a condvar, for runtimes whose
//!   finalizers touch reference-counted host objects
//!
//! # Quick Start
//!
//! ```
//! use loam_finalizer::{ClosureQueue, Epoch, FinalizerProcessor, RunClosures};
//! use std::sync::mpsc;
//!
//! let (done_tx, done_rx) = mpsc::channel();
//! let processor = FinalizerProcessor::<RunClosures>::new(move |epoch| {
//!     let _ = done_tx.send(epoch);
//! });
//!
//! let mut batch = ClosureQueue::default();
//! batch.push(Box::new(|| {
//!     // release the native resources of one dead object
//! }));
//! processor.schedule(batch, Epoch(1));
//!
//! assert_eq!(done_rx.recv().unwrap(), Epoch(1));
//! processor.stop();
//! ```
//!
//! # Feature Flags
//!
//! - `run-loop`: enables [`RunLoopSource`] and the [`HostRunLoop`] boundary
//!   trait for parking the worker in a native event loop
//! - `tracing`: structured spans and events for scheduling and draining,
//!   via the `tracing` crate

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod epoch;
#[cfg(feature = "run-loop")]
mod host;
mod metrics;
mod policy;
mod processor;
mod tracing;
mod wakeup;

// Re-export public API
pub use epoch::{Epoch, EpochDoneCallback};
#[cfg(feature = "run-loop")]
pub use host::HostRunLoop;
pub use metrics::FinalizerMetrics;
pub use policy::{ClosureQueue, QueuePolicy, RunClosures};
pub use processor::{FinalizerProcessor, ProcessorConfig, ProcessorShared};
#[cfg(feature = "run-loop")]
pub use wakeup::RunLoopSource;
pub use wakeup::{CondvarLoop, DefaultLoop, ProcessingLoop};
