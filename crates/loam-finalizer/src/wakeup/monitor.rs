//! Condvar-based wakeup.

use crate::epoch::Epoch;
use crate::policy::QueuePolicy;
use crate::processor::{ProcessorShared, Step};
use crate::wakeup::ProcessingLoop;

/// Portable wakeup strategy parking the worker on the queue condvar.
///
/// Producers broadcast on the condvar after mutating the shared state; the
/// worker blocks on it directly between steps. This is the default on every
/// platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct CondvarLoop;

impl<P: QueuePolicy> ProcessingLoop<P> for CondvarLoop {
    fn notify(&self, owner: &ProcessorShared<P, Self>) {
        owner.wake_all();
    }

    fn body(&self, owner: &ProcessorShared<P, Self>) {
        owner.set_initialized(true);
        let mut previous = Epoch::ZERO;
        loop {
            match owner.process_single_blocking(previous) {
                Step::Processed(epoch) => previous = epoch,
                Step::Idle => {}
                Step::Exit => break,
            }
        }
        owner.set_initialized(false);
    }
}
