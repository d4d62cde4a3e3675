//! Host-event-loop wakeup.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::epoch::Epoch;
use crate::host::HostRunLoop;
use crate::policy::QueuePolicy;
use crate::processor::{ProcessorShared, Step};
use crate::wakeup::ProcessingLoop;

/// Wakeup strategy that parks the worker inside a host event loop.
///
/// The worker installs a wakeup source into the loop owned by its own
/// thread, publishes the waker handle through an atomic, and then hands
/// control to the loop. Producers spin until the handle appears and signal
/// it instead of a condvar, so wakeups are delivered through the host's own
/// machinery and the loop stays free to dispatch the host's deferred
/// callbacks between batches.
///
/// Each batch runs inside [`HostRunLoop::with_release_scope`], and deferred
/// host callbacks are drained after every batch and once more on teardown.
pub struct RunLoopSource<L: HostRunLoop> {
    waker: AtomicPtr<L::Waker>,
}

impl<L: HostRunLoop> Default for RunLoopSource<L> {
    fn default() -> Self {
        Self {
            waker: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

impl<L: HostRunLoop> std::fmt::Debug for RunLoopSource<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLoopSource")
            .field("installed", &!self.waker.load(Ordering::Relaxed).is_null())
            .finish()
    }
}

impl<P: QueuePolicy, L: HostRunLoop> ProcessingLoop<P> for RunLoopSource<L> {
    fn notify(&self, _owner: &ProcessorShared<P, Self>) {
        loop {
            let waker = self.waker.load(Ordering::Acquire);
            if !waker.is_null() {
                // SAFETY: every notify runs inside a queue-lock critical
                // section that precedes the worker's gate-closing exit
                // decision, and the waker is only reclaimed after that
                // decision. The Acquire load pairs with the Release store
                // in `body`, so the pointee is fully constructed.
                L::wake(unsafe { &*waker });
                return;
            }
            // Worker thread is still installing its loop.
            std::hint::spin_loop();
        }
    }

    fn body(&self, owner: &ProcessorShared<P, Self>) {
        let (host_loop, waker) = L::install();
        let waker = Box::into_raw(Box::new(waker));
        self.waker.store(waker, Ordering::Release);
        owner.set_initialized(true);

        let mut previous = Epoch::ZERO;
        // One host wakeup may stand for several coalesced notifies, so each
        // invocation keeps stepping until the queue is quiescent.
        let mut on_wake = || loop {
            match owner.process_single_now(previous) {
                Step::Processed(epoch) => previous = epoch,
                Step::Idle => return true,
                Step::Exit => return false,
            }
        };
        host_loop.run(&mut on_wake);

        self.waker.store(ptr::null_mut(), Ordering::Release);
        // SAFETY: the pointer came from `Box::into_raw` above. The loop only
        // stops after the exit decision closed the scheduling gate, and every
        // producer still inside `notify` held the queue lock before that
        // decision, so no reference to the waker can outlive this point.
        drop(unsafe { Box::from_raw(waker) });
        L::drain_deferred();
        owner.set_initialized(false);
    }

    fn run_batch<R>(&self, execute: impl FnOnce() -> R) -> R {
        let result = L::with_release_scope(execute);
        L::drain_deferred();
        result
    }
}
