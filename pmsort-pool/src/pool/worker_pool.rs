use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, trace, warn};

use crate::config::PoolConfig;
use crate::error::{AwaitError, PoolError, SubmitError};
use crate::logging;
use crate::queue::BoundedQueue;
use crate::unit::{Unit, UnitStatus, Work};

use super::worker::{Worker, WorkerStatus};

/// Status codes for the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStatus {
    /// Workers are accepting units
    Running = 0,

    /// Queue terminated, workers draining
    ShuttingDown = 1,

    /// All workers joined
    Shutdown = 2,
}

/// Metrics about the pool state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    /// Number of worker threads in the pool
    pub worker_count: usize,

    /// Maximum number of active units
    pub capacity: usize,

    /// Units queued or running right now
    pub active: usize,

    /// Units waiting in the queue right now
    pub queued: usize,

    /// Highest active count seen so far
    pub peak_active: usize,

    /// Units accepted by the queue
    pub submitted: usize,

    /// Units refused by the queue, for any reason
    pub rejected: usize,

    /// Units executed by worker threads
    pub executed_by_workers: usize,

    /// Units executed by threads helping while they wait
    pub executed_by_helpers: usize,

    /// Current status of the pool
    pub status: PoolStatus,
}

impl PoolMetrics {
    /// Every unit offered to the pool, accepted or not.
    pub fn offered(&self) -> usize {
        self.submitted + self.rejected
    }

    pub fn executed(&self) -> usize {
        self.executed_by_workers + self.executed_by_helpers
    }
}

/// Outcome of [`WorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Units still queued when termination began; workers ran them before exiting.
    pub drained: usize,

    /// Worker threads joined by this call.
    pub workers_joined: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ExecutedBy {
    Worker(usize),
    Helper,
}

#[derive(Debug, Default)]
struct PoolCounters {
    submitted: AtomicUsize,
    rejected: AtomicUsize,
    executed_by_workers: AtomicUsize,
    executed_by_helpers: AtomicUsize,
}

/// State shared between the pool handle and its worker threads.
pub(crate) struct PoolShared {
    queue: BoundedQueue,
    counters: PoolCounters,
    status: AtomicUsize,
    dispatch: tracing::Dispatch,
}

impl PoolShared {
    pub(crate) fn queue(&self) -> &BoundedQueue {
        &self.queue
    }

    pub(crate) fn dispatch(&self) -> &tracing::Dispatch {
        &self.dispatch
    }

    /// Run a unit taken from the queue and publish its completion.
    ///
    /// Capacity and counters are settled before the unit is marked done, so
    /// a thread returning from a wait already sees them.
    pub(crate) fn execute(&self, unit: Arc<dyn Work>, by: ExecutedBy) {
        unit.run();
        self.queue.complete();
        match by {
            ExecutedBy::Worker(worker) => {
                self.counters.executed_by_workers.fetch_add(1, Ordering::SeqCst);
                trace!(unit = unit.id(), worker, "unit done on worker");
            }
            ExecutedBy::Helper => {
                self.counters.executed_by_helpers.fetch_add(1, Ordering::SeqCst);
                trace!(unit = unit.id(), "unit done on waiting thread");
            }
        }
        unit.finish();
    }
}

/// Fixed-size pool of worker threads fed by one [`BoundedQueue`].
///
/// Workers and waiting threads cooperate: a thread blocked in
/// [`WorkerPool::await_completion`] (or joining a scoped unit) keeps taking
/// queued units and running them itself, and only sleeps once the queue is
/// empty. A unit it waits on is then necessarily already running somewhere,
/// so fork/join recursion cannot starve a pool of any size.
///
/// # Shutdown
/// [`WorkerPool::shutdown`] (also run on drop) terminates the queue, lets the
/// workers drain whatever is still queued, then joins them. No accepted unit
/// is ever abandoned.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_statuses: Vec<Arc<AtomicUsize>>,
    worker_count: usize,
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("queue", &self.shared.queue)
            .field("status", &self.status())
            .finish()
    }
}

impl WorkerPool {
    /// Create a pool and start its workers.
    ///
    /// # Errors
    /// `PoolError::Config` for a zero worker count or capacity,
    /// `PoolError::ThreadSetup` if the OS refuses to start a worker thread.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;

        let dispatch = config.dispatch.clone().unwrap_or_else(logging::current_subscriber);
        let shared = Arc::new(PoolShared {
            queue: BoundedQueue::new(config.queue_capacity),
            counters: PoolCounters::default(),
            status: AtomicUsize::new(PoolStatus::Running as usize),
            dispatch,
        });

        let mut handles = Vec::with_capacity(config.worker_count);
        let mut worker_statuses = Vec::with_capacity(config.worker_count);
        for worker_id in 0..config.worker_count {
            let worker = Worker::new(worker_id, shared.clone());
            worker_statuses.push(worker.status());

            match worker.spawn(&config.thread_name_prefix, config.stack_size) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    shared.queue.terminate();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(PoolError::ThreadSetup(format!(
                        "failed to spawn worker {}: {}",
                        worker_id, e
                    )));
                }
            }
        }

        info!(
            workers = config.worker_count,
            capacity = config.queue_capacity,
            "worker pool created"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(handles),
            worker_statuses,
            worker_count: config.worker_count,
        })
    }

    /// Create a pool with `worker_count` threads and a queue of `capacity` slots.
    pub fn with_capacity(worker_count: usize, capacity: usize) -> Result<Self, PoolError> {
        Self::new(PoolConfig::new(worker_count, capacity))
    }

    /// Offer a unit to the queue. Never blocks.
    ///
    /// # Errors
    /// - `SubmitError::QueueFull` when `capacity` units are already active
    /// - `SubmitError::InvalidUnit` when the unit has no executable or was
    ///   already submitted
    /// - `SubmitError::ShuttingDown` after [`WorkerPool::shutdown`] began
    pub fn submit<T: Send + 'static>(&self, unit: &Arc<Unit<T>>) -> Result<(), SubmitError> {
        self.submit_work(unit.clone())
    }

    pub(crate) fn submit_work(&self, unit: Arc<dyn Work>) -> Result<(), SubmitError> {
        let id = unit.id();
        match self.shared.queue.submit(unit) {
            Ok(()) => {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                debug!(unit = id, "unit submitted");
                Ok(())
            }
            Err(e) => {
                self.shared.counters.rejected.fetch_add(1, Ordering::Relaxed);
                debug!(unit = id, reason = %e, "unit rejected");
                Err(e)
            }
        }
    }

    /// Block until `unit` has executed and return its output.
    ///
    /// While the unit is unfinished the calling thread runs other queued
    /// units. A unit without an executable returns `AwaitError::InvalidUnit`
    /// immediately.
    ///
    /// # Errors
    /// - `AwaitError::InvalidUnit` for a malformed unit
    /// - `AwaitError::NotSubmitted` for a unit no queue ever accepted
    /// - `AwaitError::Panicked` if the closure panicked
    /// - `AwaitError::OutputTaken` if the output was already collected
    pub fn await_completion<T: Send + 'static>(&self, unit: &Arc<Unit<T>>) -> Result<T, AwaitError> {
        if !unit.has_executable() {
            return Err(AwaitError::InvalidUnit);
        }
        if unit.status() == UnitStatus::Idle {
            return Err(AwaitError::NotSubmitted);
        }
        self.help_until_done(&**unit);
        unit.take_output()
    }

    /// Run queued units on this thread until `unit` is done.
    pub(crate) fn help_until_done(&self, unit: &dyn Work) {
        loop {
            if unit.is_done() {
                return;
            }
            match self.shared.queue.try_take() {
                Some(other) => {
                    trace!(waiting_on = unit.id(), unit = other.id(), "helping with queued unit");
                    self.shared.execute(other, ExecutedBy::Helper);
                }
                None => {
                    // Queue is empty, so the awaited unit has been taken and
                    // is running on another thread.
                    unit.wait_done();
                    return;
                }
            }
        }
    }

    /// Terminate the queue, drain it, and join every worker.
    ///
    /// Idempotent: later calls return an empty report. Must not be called
    /// from inside a unit running on this pool.
    pub fn shutdown(&self) -> ShutdownReport {
        let handles = mem::take(&mut *self.lock_workers());
        if handles.is_empty() {
            return ShutdownReport::default();
        }

        self.shared.status.store(PoolStatus::ShuttingDown as usize, Ordering::SeqCst);
        let drained = self.shared.queue.terminate();
        info!(drained, "shutting down worker pool");

        let current = thread::current().id();
        let mut workers_joined = 0;
        for handle in handles {
            if handle.thread().id() == current {
                warn!("shutdown called from a worker thread; not joining it");
                continue;
            }
            match handle.join() {
                Ok(()) => workers_joined += 1,
                Err(_) => warn!("worker thread panicked before joining"),
            }
        }

        self.shared.status.store(PoolStatus::Shutdown as usize, Ordering::SeqCst);
        info!(workers_joined, "worker pool shut down");

        ShutdownReport { drained, workers_joined }
    }

    /// Get the pool size
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }

    /// Get the current pool status
    pub fn status(&self) -> PoolStatus {
        match self.shared.status.load(Ordering::Relaxed) {
            0 => PoolStatus::Running,
            1 => PoolStatus::ShuttingDown,
            _ => PoolStatus::Shutdown,
        }
    }

    /// Snapshot of each worker's status, indexed by worker id.
    pub fn worker_statuses(&self) -> Vec<WorkerStatus> {
        self.worker_statuses
            .iter()
            .map(|s| WorkerStatus::from_raw(s.load(Ordering::Relaxed)))
            .collect()
    }

    /// Get metrics about the pool
    pub fn metrics(&self) -> PoolMetrics {
        let counters = &self.shared.counters;
        PoolMetrics {
            worker_count: self.worker_count,
            capacity: self.shared.queue.capacity(),
            active: self.shared.queue.active(),
            queued: self.shared.queue.queued(),
            peak_active: self.shared.queue.peak_active(),
            submitted: counters.submitted.load(Ordering::Relaxed),
            rejected: counters.rejected.load(Ordering::Relaxed),
            executed_by_workers: counters.executed_by_workers.load(Ordering::Relaxed),
            executed_by_helpers: counters.executed_by_helpers.load(Ordering::Relaxed),
            status: self.status(),
        }
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
