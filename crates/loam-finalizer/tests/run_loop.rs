#![cfg(feature = "run-loop")]

//! Integration tests for the host-event-loop wakeup strategy, driven by a
//! scripted in-process loop standing in for a platform one.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use loam_finalizer::{
    ClosureQueue, Epoch, FinalizerProcessor, HostRunLoop, RunClosures, RunLoopSource,
};

type Processor = FinalizerProcessor<RunClosures, RunLoopSource<ManualLoop>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

thread_local! {
    /// Nesting depth of open release scopes on this thread.
    static SCOPE_DEPTH: Cell<usize> = const { Cell::new(0) };
    /// Host callbacks deferred onto this thread, drained between batches.
    static DEFERRED: RefCell<Vec<Box<dyn FnOnce() + Send>>> = const { RefCell::new(Vec::new()) };
}

struct LoopInner {
    pending: Mutex<bool>,
    cv: Condvar,
}

/// Scripted event loop: a condvar dressed up with the signal-coalescing,
/// release-scope, and deferred-callback behavior of a platform loop.
struct ManualLoop {
    inner: Arc<LoopInner>,
}

struct ManualWaker {
    inner: Arc<LoopInner>,
}

impl HostRunLoop for ManualLoop {
    type Waker = ManualWaker;

    fn install() -> (Self, Self::Waker) {
        let inner = Arc::new(LoopInner {
            pending: Mutex::new(false),
            cv: Condvar::new(),
        });
        (
            Self {
                inner: Arc::clone(&inner),
            },
            ManualWaker { inner },
        )
    }

    fn run(self, on_wake: &mut dyn FnMut() -> bool) {
        loop {
            {
                let mut pending = self.inner.pending.lock();
                self.inner.cv.wait_while(&mut pending, |p| !*p);
                // Coalesce: all signals so far collapse into this wakeup.
                *pending = false;
            }
            if !on_wake() {
                return;
            }
        }
    }

    fn wake(waker: &Self::Waker) {
        let mut pending = waker.inner.pending.lock();
        *pending = true;
        waker.inner.cv.notify_all();
    }

    fn with_release_scope<R>(execute: impl FnOnce() -> R) -> R {
        SCOPE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        let result = execute();
        SCOPE_DEPTH.with(|depth| depth.set(depth.get() - 1));
        result
    }

    fn drain_deferred() {
        loop {
            let drained: Vec<_> = DEFERRED.with(|queue| queue.borrow_mut().drain(..).collect());
            if drained.is_empty() {
                return;
            }
            for task in drained {
                task();
            }
        }
    }
}

/// Queue a host callback on the current thread, as host libraries do from
/// inside finalizers.
fn defer(task: impl FnOnce() + Send + 'static) {
    DEFERRED.with(|queue| queue.borrow_mut().push(Box::new(task)));
}

fn current_scope_depth() -> usize {
    SCOPE_DEPTH.with(Cell::get)
}

fn processor_with_epoch_channel() -> (Processor, mpsc::Receiver<Epoch>) {
    let (tx, rx) = mpsc::channel();
    let processor = Processor::new(move |epoch| {
        let _ = tx.send(epoch);
    });
    (processor, rx)
}

/// Test that a schedule racing worker startup still lands: the notify spins
/// until the waker is published, then the loop drains the batch.
#[test]
fn test_schedule_races_worker_startup() {
    let (processor, epochs) = processor_with_epoch_channel();
    let ran = Arc::new(AtomicUsize::new(0));

    let batch = {
        let ran = Arc::clone(&ran);
        vec![Box::new(move || {
            ran.fetch_add(1, Ordering::Relaxed);
        }) as Box<dyn FnOnce() + Send>]
    };
    processor.schedule(batch, Epoch(1));

    assert_eq!(epochs.recv_timeout(RECV_TIMEOUT).unwrap(), Epoch(1));
    assert_eq!(ran.load(Ordering::Relaxed), 1);
    processor.stop();
}

/// Test that batches run inside exactly one release scope.
#[test]
fn test_batch_runs_inside_release_scope() {
    let (processor, epochs) = processor_with_epoch_channel();
    let (depth_tx, depth_rx) = mpsc::channel();

    let batch = vec![Box::new(move || {
        depth_tx.send(current_scope_depth()).unwrap();
    }) as Box<dyn FnOnce() + Send>];
    processor.schedule(batch, Epoch(1));

    assert_eq!(depth_rx.recv_timeout(RECV_TIMEOUT).unwrap(), 1);
    assert_eq!(epochs.recv_timeout(RECV_TIMEOUT).unwrap(), Epoch(1));
    processor.stop();
}

/// Test that host callbacks deferred by a finalizer run before the epoch is
/// reported complete.
#[test]
fn test_deferred_host_work_precedes_epoch_callback() {
    let (event_tx, event_rx) = mpsc::channel();
    let processor = {
        let event_tx = event_tx.clone();
        Processor::new(move |_| {
            let _ = event_tx.send("epoch_done");
        })
    };

    let batch = vec![Box::new(move || {
        defer(move || {
            let _ = event_tx.send("deferred");
        });
    }) as Box<dyn FnOnce() + Send>];
    processor.schedule(batch, Epoch(1));

    assert_eq!(event_rx.recv_timeout(RECV_TIMEOUT).unwrap(), "deferred");
    assert_eq!(event_rx.recv_timeout(RECV_TIMEOUT).unwrap(), "epoch_done");
    processor.stop();
}

/// Test that host work still deferred when the loop stops is drained during
/// teardown, before `stop` returns.
#[test]
fn test_teardown_drains_deferred_work() {
    let drained = Arc::new(AtomicUsize::new(0));
    // Deferring from the completion callback lands the task after the
    // per-batch drain, so only the teardown drain can run it.
    let processor = {
        let drained = Arc::clone(&drained);
        Processor::new(move |_| {
            let drained = Arc::clone(&drained);
            defer(move || {
                drained.fetch_add(1, Ordering::Relaxed);
            });
        })
    };

    processor.schedule(
        vec![Box::new(|| {}) as Box<dyn FnOnce() + Send>],
        Epoch(1),
    );
    processor.stop();
    assert_eq!(drained.load(Ordering::Relaxed), 1);
}

/// Test stop and restart across two loop incarnations.
#[test]
fn test_restart_installs_fresh_loop() {
    let (processor, epochs) = processor_with_epoch_channel();
    let ran = Arc::new(AtomicUsize::new(0));

    for epoch in [Epoch(1), Epoch(2)] {
        let batch = {
            let ran = Arc::clone(&ran);
            vec![Box::new(move || {
                ran.fetch_add(1, Ordering::Relaxed);
            }) as Box<dyn FnOnce() + Send>]
        };
        processor.schedule(batch, epoch);
        assert_eq!(epochs.recv_timeout(RECV_TIMEOUT).unwrap(), epoch);
        processor.stop();
        assert!(!processor.is_running());
    }

    assert_eq!(ran.load(Ordering::Relaxed), 2);
    assert_eq!(processor.metrics().workers_started, 2);
}

/// Test that an idle worker parked in the loop completes empty epochs after
/// the readiness handshake.
#[test]
fn test_initialized_worker_completes_empty_epoch() {
    let (processor, epochs) = processor_with_epoch_channel();

    processor.start();
    processor.wait_until_initialized();
    processor.schedule(ClosureQueue::default(), Epoch(5));

    assert_eq!(epochs.recv_timeout(RECV_TIMEOUT).unwrap(), Epoch(5));
    processor.stop();
    assert_eq!(processor.metrics().empty_wakeups, 1);
}

/// Test that a burst of schedules coalesces through one loop while every
/// task still runs and the last epoch is reported.
#[test]
fn test_rapid_schedules_coalesce() {
    let (processor, epochs) = processor_with_epoch_channel();
    let ran = Arc::new(AtomicUsize::new(0));
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let first = {
        let ran = Arc::clone(&ran);
        vec![Box::new(move || {
            entered_tx.send(()).unwrap();
            release_rx.recv().unwrap();
            ran.fetch_add(1, Ordering::Relaxed);
        }) as Box<dyn FnOnce() + Send>]
    };
    processor.schedule(first, Epoch(1));
    entered_rx.recv_timeout(RECV_TIMEOUT).unwrap();

    for epoch in 2..=20 {
        let batch = {
            let ran = Arc::clone(&ran);
            vec![Box::new(move || {
                ran.fetch_add(1, Ordering::Relaxed);
            }) as Box<dyn FnOnce() + Send>]
        };
        processor.schedule(batch, Epoch(epoch));
    }
    release_tx.send(()).unwrap();

    let mut last = Epoch::ZERO;
    while last != Epoch(20) {
        let epoch = epochs.recv_timeout(RECV_TIMEOUT).unwrap();
        assert!(epoch >= last, "epochs regressed: {epoch:?} after {last:?}");
        last = epoch;
    }
    processor.stop();
    assert_eq!(ran.load(Ordering::Relaxed), 20);
}
