//! Dedicated worker thread draining epoch-tagged finalization batches.

use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::epoch::{Epoch, EpochDoneCallback};
use crate::metrics::{FinalizerMetrics, MetricsInner};
use crate::policy::QueuePolicy;
use crate::wakeup::{DefaultLoop, ProcessingLoop};

/// Worker lifecycle, tracked under the queue lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProcessorState {
    /// No worker thread exists. Empty schedules complete inline.
    NotRunning,
    /// A worker thread is draining the queue.
    Running,
    /// A stop request was handed to the worker; it is draining what is left.
    ShuttingDown,
}

/// Queue-side state guarded by [`ProcessorShared::tasks`].
struct TaskState<P: QueuePolicy> {
    queue: P::Queue,
    epoch: Epoch,
    state: ProcessorState,
    /// Scheduling gate. The worker closes it when it decides to exit;
    /// [`FinalizerProcessor::stop`] reopens it after the join.
    new_tasks_allowed: bool,
}

/// Outcome of one worker processing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// A batch (possibly empty) was completed at this epoch.
    Processed(Epoch),
    /// Nothing new since the last step; only possible for polling wakeups.
    #[cfg_attr(not(feature = "run-loop"), allow(dead_code))]
    Idle,
    /// Shutdown observed with nothing left to drain; the worker must exit.
    Exit,
}

/// State shared between a processor handle, its producers, and its worker
/// thread.
///
/// This type shows up in [`ProcessingLoop`] signatures so strategies can
/// reach back into the queue; it has no public surface of its own.
pub struct ProcessorShared<P: QueuePolicy, L: ProcessingLoop<P>> {
    wakeup: L,
    tasks: Mutex<TaskState<P>>,
    tasks_cv: Condvar,
    initialized: Mutex<bool>,
    init_cv: Condvar,
    epoch_done: EpochDoneCallback,
    metrics: MetricsInner,
    config: ProcessorConfig,
}

impl<P: QueuePolicy, L: ProcessingLoop<P>> ProcessorShared<P, L> {
    /// Broadcast on the queue condvar.
    pub(crate) fn wake_all(&self) {
        self.tasks_cv.notify_all();
    }

    /// Flip the readiness flag observed by
    /// [`FinalizerProcessor::wait_until_initialized`].
    pub(crate) fn set_initialized(&self, ready: bool) {
        *self.initialized.lock() = ready;
        self.init_cv.notify_all();
    }

    /// Perform one worker step, parking on the queue condvar until there is
    /// something to react to.
    pub(crate) fn process_single_blocking(&self, previous: Epoch) -> Step {
        let mut tasks = self.tasks.lock();
        self.tasks_cv.wait_while(&mut tasks, |t| {
            P::is_empty(&t.queue) && t.epoch == previous && t.state != ProcessorState::ShuttingDown
        });
        self.drain(tasks, previous)
    }

    /// Perform one worker step without blocking; used when the host loop
    /// does the parking and wakeups may be spurious or coalesced.
    #[cfg_attr(not(feature = "run-loop"), allow(dead_code))]
    pub(crate) fn process_single_now(&self, previous: Epoch) -> Step {
        let tasks = self.tasks.lock();
        if P::is_empty(&tasks.queue)
            && tasks.epoch == previous
            && tasks.state != ProcessorState::ShuttingDown
        {
            return Step::Idle;
        }
        self.drain(tasks, previous)
    }

    /// Decision tail shared by both step flavors. Entered with the wakeup
    /// condition known to hold.
    fn drain(&self, mut tasks: MutexGuard<'_, TaskState<P>>, previous: Epoch) -> Step {
        if P::is_empty(&tasks.queue) && tasks.epoch == previous {
            // Nothing to drain and no new epoch: the only remaining reason
            // to be awake is shutdown. Close the gate so late producers
            // park until the processor is reset.
            tasks.new_tasks_allowed = false;
            assert_eq!(
                tasks.state,
                ProcessorState::ShuttingDown,
                "finalizer worker woke with an empty queue, an unchanged epoch, and no stop request"
            );
            return Step::Exit;
        }

        let queue = mem::take(&mut tasks.queue);
        let epoch = tasks.epoch;
        drop(tasks);

        if P::is_empty(&queue) {
            self.metrics.record_empty_wakeup();
        } else {
            #[cfg(feature = "tracing")]
            let _drain_span = crate::tracing::internal::trace_drain(epoch);
            self.wakeup.run_batch(|| P::process(queue));
            self.metrics.record_batch();
        }

        // Counters first, so a reader synchronized by the callback already
        // sees this step reflected.
        self.metrics.record_completed_epoch(epoch);
        (self.epoch_done)(epoch);
        Step::Processed(epoch)
    }
}

/// Configuration for a [`FinalizerProcessor`], mirroring
/// [`std::thread::Builder`] in shape.
///
/// # Example
///
/// ```
/// use loam_finalizer::ProcessorConfig;
///
/// let config = ProcessorConfig::new().name("my-rt-finalizer");
/// ```
pub struct ProcessorConfig {
    thread_name: String,
    on_worker_init: Option<Box<dyn Fn() + Send + Sync>>,
}

impl ProcessorConfig {
    /// Default configuration: worker named `loam-finalizer`, no init hook.
    #[must_use]
    pub fn new() -> Self {
        Self {
            thread_name: "loam-finalizer".to_owned(),
            on_worker_init: None,
        }
    }

    /// Name every worker thread this processor spawns.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Hook run first on each new worker thread, before any processing.
    ///
    /// Embedding runtimes use this to register the thread with the runtime
    /// (thread-local heaps, signal masks). Runs again for every restarted
    /// worker.
    #[must_use]
    pub fn worker_init(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_worker_init = Some(Box::new(hook));
        self
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("thread_name", &self.thread_name)
            .field("worker_init", &self.on_worker_init.is_some())
            .finish()
    }
}

/// Asynchronous finalizer processing on a dedicated worker thread.
///
/// Producers hand over batches of finalization work tagged with an epoch via
/// [`schedule`](Self::schedule); a single worker thread drains them in
/// submission order and reports each completed epoch through the processor's
/// completion callback. The worker is spawned lazily on the first non-empty
/// schedule, torn down by [`stop`](Self::stop), and may be started again
/// afterwards.
///
/// The second type parameter selects the wakeup strategy and defaults to the
/// portable condvar one; see [`RunLoopSource`](crate::RunLoopSource) for the
/// host-event-loop alternative.
pub struct FinalizerProcessor<P: QueuePolicy, L: ProcessingLoop<P> = DefaultLoop> {
    shared: Arc<ProcessorShared<P, L>>,
    /// Join handle bookkeeping. Lock order: `shared.tasks` first, then this.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<P: QueuePolicy, L: ProcessingLoop<P>> FinalizerProcessor<P, L> {
    /// Create a processor with the default configuration.
    ///
    /// `epoch_done` is invoked once per completed processing step with that
    /// step's epoch, usually on the worker thread but synchronously on the
    /// scheduling thread for the empty fast path. It must not call back into
    /// this processor.
    #[must_use]
    pub fn new(epoch_done: impl Fn(Epoch) + Send + Sync + 'static) -> Self {
        Self::with_config(ProcessorConfig::new(), epoch_done)
    }

    /// Create a processor with an explicit configuration.
    #[must_use]
    pub fn with_config(
        config: ProcessorConfig,
        epoch_done: impl Fn(Epoch) + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(ProcessorShared {
                wakeup: L::default(),
                tasks: Mutex::new(TaskState {
                    queue: P::Queue::default(),
                    epoch: Epoch::ZERO,
                    state: ProcessorState::NotRunning,
                    new_tasks_allowed: true,
                }),
                tasks_cv: Condvar::new(),
                initialized: Mutex::new(false),
                init_cv: Condvar::new(),
                epoch_done: Box::new(epoch_done),
                metrics: MetricsInner::default(),
                config,
            }),
            worker: Mutex::new(None),
        }
    }

    /// Hand a batch of finalization work for `epoch` to the worker.
    ///
    /// The batch is merged behind any work already queued and the pending
    /// epoch is overwritten, so several schedules between worker wakeups
    /// coalesce into one step completing the latest epoch. An empty batch
    /// while no worker exists completes synchronously: the callback runs on
    /// the calling thread and no worker is spawned. Otherwise a worker is
    /// spawned if none exists.
    ///
    /// If a shutdown is past the point of accepting work, this blocks until
    /// the processor has been fully stopped, then schedules onto a fresh
    /// worker.
    ///
    /// # Panics
    ///
    /// Panics if a worker thread needs to be spawned and the OS refuses.
    pub fn schedule(&self, batch: P::Queue, epoch: Epoch) {
        let mut tasks = self.shared.tasks.lock();
        if P::is_empty(&batch) && tasks.state == ProcessorState::NotRunning {
            self.shared.metrics.record_sync_completion();
            self.shared.metrics.record_completed_epoch(epoch);
            (self.shared.epoch_done)(epoch);
            #[cfg(feature = "tracing")]
            crate::tracing::internal::log_sync_completion(epoch);
            return;
        }

        self.shared
            .tasks_cv
            .wait_while(&mut tasks, |t| !t.new_tasks_allowed);

        #[cfg(feature = "tracing")]
        let started_worker = tasks.state == ProcessorState::NotRunning;
        if tasks.state == ProcessorState::NotRunning {
            self.spawn_worker(&mut tasks);
        }

        P::merge(&mut tasks.queue, batch);
        tasks.epoch = epoch;
        self.shared.wakeup.notify(&self.shared);
        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_scheduled(epoch, started_worker);
    }

    /// Spawn a worker thread if none exists.
    ///
    /// Usually unnecessary: [`schedule`](Self::schedule) spawns on demand.
    /// Useful for paying the thread startup cost ahead of the first real
    /// batch.
    ///
    /// The pending epoch survives [`stop`](Self::stop), so starting a fresh
    /// worker after a shutdown may report the last completed epoch through
    /// the callback once more. Epochs stay non-decreasing.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to spawn the thread.
    pub fn start(&self) {
        let mut tasks = self.shared.tasks.lock();
        if tasks.state == ProcessorState::NotRunning {
            self.spawn_worker(&mut tasks);
        }
    }

    /// Whether a worker thread currently exists, including one that is
    /// still draining a shutdown request.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.tasks.lock().state != ProcessorState::NotRunning
    }

    /// Block until the current worker has finished its thread-local setup
    /// and its wakeup target is reachable.
    ///
    /// Only meaningful while a worker exists or is being spawned; with no
    /// worker this blocks until the next one comes up.
    pub fn wait_until_initialized(&self) {
        let mut ready = self.shared.initialized.lock();
        self.shared.init_cv.wait_while(&mut ready, |ready| !*ready);
    }

    /// Stop the worker thread and wait for it to drain.
    ///
    /// The worker finishes everything scheduled before (and during) the
    /// drain, then exits; this returns once the thread is joined and the
    /// processor is reset for reuse. No-op when no worker exists. If another
    /// thread is already stopping, this waits for that shutdown to finish
    /// instead of racing it.
    ///
    /// Must not be called from the worker thread itself or from the
    /// completion callback.
    ///
    /// # Panics
    ///
    /// Panics if the worker thread panicked, or if it exited with work still
    /// queued.
    pub fn stop(&self) {
        let handle = {
            let mut tasks = self.shared.tasks.lock();
            while tasks.state == ProcessorState::ShuttingDown {
                self.shared.tasks_cv.wait(&mut tasks);
            }
            if tasks.state == ProcessorState::NotRunning {
                return;
            }
            tasks.state = ProcessorState::ShuttingDown;
            self.shared.wakeup.notify(&self.shared);
            #[cfg(feature = "tracing")]
            crate::tracing::internal::log_stop_requested();
            self.worker
                .lock()
                .take()
                .expect("running finalizer processor lost its worker handle")
        };

        // Join with no locks held so the worker can still drain the queue.
        handle.join().expect("finalizer worker thread panicked");

        let mut tasks = self.shared.tasks.lock();
        assert!(
            P::is_empty(&tasks.queue),
            "finalizer worker exited with work still queued"
        );
        tasks.state = ProcessorState::NotRunning;
        tasks.new_tasks_allowed = true;
        self.shared.tasks_cv.notify_all();
        drop(tasks);
        #[cfg(feature = "tracing")]
        crate::tracing::internal::log_stopped();
    }

    /// Snapshot of this processor's counters.
    #[must_use]
    pub fn metrics(&self) -> FinalizerMetrics {
        self.shared.metrics.snapshot()
    }

    fn spawn_worker(&self, tasks: &mut TaskState<P>) {
        debug_assert_eq!(tasks.state, ProcessorState::NotRunning);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(shared.config.thread_name.clone())
            .spawn(move || {
                if let Some(init) = &shared.config.on_worker_init {
                    init();
                }
                #[cfg(feature = "tracing")]
                crate::tracing::internal::log_worker_started();
                shared.wakeup.body(&shared);
                #[cfg(feature = "tracing")]
                crate::tracing::internal::log_worker_exited();
            })
            .expect("failed to spawn finalizer worker thread");
        *self.worker.lock() = Some(handle);
        tasks.state = ProcessorState::Running;
        self.shared.metrics.record_worker_started();
    }
}

impl<P: QueuePolicy, L: ProcessingLoop<P>> Drop for FinalizerProcessor<P, L> {
    fn drop(&mut self) {
        self.stop();
    }
}
