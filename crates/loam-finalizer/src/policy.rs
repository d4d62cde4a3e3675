//! Pluggable queue behavior for finalization batches.
//!
//! The processor is generic over how batches are represented, combined, and
//! executed. A policy is a set of associated functions over an owned queue
//! type rather than a trait object: the processor never stores a policy
//! value, and the queue type itself travels from the scheduling thread to
//! the worker.

/// Strategy describing the finalization queue a processor drains.
///
/// Implementations are stateless. All knowledge lives in the
/// [`Queue`](Self::Queue) value, which must be cheaply constructible in its
/// empty form via `Default` and sendable to the worker thread.
pub trait QueuePolicy: 'static {
    /// Owned batch of pending finalization work.
    type Queue: Default + Send + 'static;

    /// Whether `queue` holds no work.
    ///
    /// Must be consistent with [`merge`](Self::merge): merging an empty
    /// queue into an empty queue leaves an empty queue.
    fn is_empty(queue: &Self::Queue) -> bool;

    /// Append the contents of `incoming` onto `pending`, leaving `incoming`
    /// consumed.
    ///
    /// Relative order within each queue must be preserved, and everything in
    /// `pending` stays ahead of everything in `incoming`.
    fn merge(pending: &mut Self::Queue, incoming: Self::Queue);

    /// Execute every piece of work in `queue`, consuming it.
    ///
    /// Runs on the worker thread with no processor locks held, so work items
    /// are free to schedule more finalizers onto the same processor.
    fn process(queue: Self::Queue);
}

/// Ready-made policy over a batch of boxed closures.
///
/// The queue is a `Vec` of `FnOnce` closures; processing runs them in
/// insertion order. Suitable for runtimes whose finalizers are already
/// erased to callable objects.
#[derive(Debug, Clone, Copy)]
pub struct RunClosures;

/// Queue type drained by [`RunClosures`].
pub type ClosureQueue = Vec<Box<dyn FnOnce() + Send>>;

impl QueuePolicy for RunClosures {
    type Queue = ClosureQueue;

    fn is_empty(queue: &Self::Queue) -> bool {
        queue.is_empty()
    }

    fn merge(pending: &mut Self::Queue, mut incoming: Self::Queue) {
        pending.append(&mut incoming);
    }

    fn process(queue: Self::Queue) {
        for task in queue {
            task();
        }
    }
}
