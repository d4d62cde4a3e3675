//! Worker wakeup strategies.
//!
//! The processor parks its worker thread between batches and pokes it when
//! new work or a shutdown request arrives. How the parking and poking happen
//! is a compile-time choice: [`CondvarLoop`] blocks directly on the shared
//! state's condvar, while [`RunLoopSource`] (behind the `run-loop` feature)
//! parks inside a host event loop so finalizers can interoperate with
//! reference-counted host objects.
//!
//! [`RunLoopSource`]: crate::RunLoopSource

mod monitor;
#[cfg(feature = "run-loop")]
mod run_loop;

pub use monitor::CondvarLoop;
#[cfg(feature = "run-loop")]
pub use run_loop::RunLoopSource;

use crate::policy::QueuePolicy;
use crate::processor::ProcessorShared;

/// Strategy used when none is named in the processor type.
pub type DefaultLoop = CondvarLoop;

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::CondvarLoop {}

    #[cfg(feature = "run-loop")]
    impl<L: crate::host::HostRunLoop> Sealed for super::RunLoopSource<L> {}
}

/// How the finalizer worker parks between processing steps and how producers
/// wake it.
///
/// The strategy value lives inside the processor's shared state, so both
/// sides see the same instance: producers call [`notify`](Self::notify) from
/// scheduling threads, the worker runs [`body`](Self::body) for its whole
/// life. This trait is sealed; the two provided implementations cover the
/// portable and the host-loop cases.
pub trait ProcessingLoop<P: QueuePolicy>:
    Default + Send + Sync + sealed::Sealed + Sized + 'static
{
    /// Wake the worker so it re-evaluates the queue.
    ///
    /// Always invoked with the queue lock held, after the state change it
    /// advertises. The worker's exit decision happens under that same lock,
    /// so a notify never races with wakeup teardown.
    fn notify(&self, owner: &ProcessorShared<P, Self>);

    /// Run the worker loop on the freshly spawned thread.
    ///
    /// Implementations must flag the processor initialized once their wakeup
    /// target is reachable, keep stepping until the processor shuts down,
    /// and clear the initialized flag before returning.
    fn body(&self, owner: &ProcessorShared<P, Self>);

    /// Bracket the execution of one non-empty batch.
    fn run_batch<R>(&self, execute: impl FnOnce() -> R) -> R {
        execute()
    }
}
