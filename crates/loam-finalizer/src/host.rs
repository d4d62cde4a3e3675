//! Host event loop integration.
//!
//! On platforms where finalizers must run inside a native event loop (for
//! interop with reference-counted host objects), the worker thread parks in
//! the host's loop instead of a condvar. This module defines the boundary
//! the embedding runtime implements to plug that loop in; the processor side
//! lives in [`RunLoopSource`](crate::RunLoopSource).

/// A native event loop owned by the finalizer worker thread.
///
/// [`install`](Self::install) is called on the worker thread itself and
/// splits the loop into two halves: the loop value, which stays on the
/// worker and is consumed by [`run`](Self::run), and a [`Waker`](Self::Waker)
/// handle that other threads use to signal it. The processor publishes the
/// waker to producers only between `install` and loop teardown, and drops it
/// after [`run`] returns, so implementations never observe a wake on a dead
/// loop.
///
/// Wake delivery contract:
///
/// * a wake delivered after `install` but before `run` starts must still be
///   observed by the first loop iteration;
/// * a wake delivered while `on_wake` is executing must trigger another
///   `on_wake` invocation after the current one returns;
/// * wakes delivered between invocations may coalesce into a single
///   `on_wake` call.
///
/// Spurious invocations of `on_wake` are harmless.
///
/// [`run`]: Self::run
pub trait HostRunLoop: Sized + 'static {
    /// Thread-safe handle that signals the loop from other threads.
    type Waker: Send + Sync + 'static;

    /// Set up the calling thread's event loop and a waker attached to it.
    fn install() -> (Self, Self::Waker);

    /// Drive the loop, invoking `on_wake` for each observed signal until it
    /// returns `false`.
    fn run(self, on_wake: &mut dyn FnMut() -> bool);

    /// Signal the loop. Callable from any thread, concurrently with
    /// [`run`](Self::run) and with other wakes.
    fn wake(waker: &Self::Waker);

    /// Bracket one finalization batch in the host's release scope, so that
    /// host references dropped by finalizers are reclaimed when the scope
    /// closes rather than accumulating for the life of the thread.
    fn with_release_scope<R>(execute: impl FnOnce() -> R) -> R {
        execute()
    }

    /// Run host callbacks that the host deferred onto this thread during a
    /// batch. Invoked after every batch and once more during teardown, after
    /// the waker has been retired.
    fn drain_deferred() {}
}
