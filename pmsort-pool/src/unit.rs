//! # Completable Units of Work
//!
//! A [`Unit`] pairs a closure with everything needed to wait for it: a
//! status, an output slot, a lock and a condition variable. Submitters keep
//! an `Arc<Unit<T>>` and the queue keeps a type-erased `Arc<dyn Work>` to the
//! same allocation, so the unit stays alive until both sides are done with it
//! and its synchronization resources are released with the last reference.
//!
//! ## Lifecycle
//! `Idle → Queued → Running → Done`. The closure is moved out when the unit
//! starts running, so a unit can execute at most once.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{trace, warn};

use crate::error::{panic_message, AwaitError, SubmitError};

/// Process-unique identifier for a unit, used in logs.
pub type UnitId = u64;

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) type Job<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Status of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Built but not (yet) accepted by a queue
    Idle,
    /// Sitting in a queue
    Queued,
    /// Taken by a thread and executing
    Running,
    /// Finished, output stored
    Done,
}

/// Type-erased view of a unit, as stored by the queue and executed by workers.
pub trait Work: Send + Sync {
    /// Identifier used in logs.
    fn id(&self) -> UnitId;

    /// Move the unit into the `Queued` state, clearing any previous output.
    ///
    /// Fails with [`SubmitError::InvalidUnit`] for a unit without an
    /// executable, or one that is already queued, running, or consumed.
    fn prepare_submit(&self) -> Result<(), SubmitError>;

    /// Execute the closure and store its output.
    ///
    /// Panics inside the closure are captured into the output slot. The unit
    /// stays `Running` until [`Work::finish`], so the executor can release
    /// queue capacity first. Returns `false` if the unit was not in the
    /// `Queued` state or had no closure.
    fn run(&self) -> bool;

    /// Mark the unit done and wake every thread blocked in [`Work::wait_done`].
    fn finish(&self);

    fn is_done(&self) -> bool;

    /// Whether the unit finished by panicking and nobody has claimed the
    /// payload yet.
    fn has_unclaimed_panic(&self) -> bool;

    /// Block on this unit's own condition variable until it is done.
    fn wait_done(&self);
}

struct UnitState<T> {
    status: UnitStatus,
    job: Option<Job<T>>,
    output: Option<thread::Result<T>>,
}

/// A closure submitted for possibly-asynchronous execution, with its own
/// completion signal.
///
/// ```rust
/// use pmsort_pool::{Unit, WorkerPool};
///
/// let pool = WorkerPool::with_capacity(2, 4).unwrap();
/// let unit = Unit::new(|| 6 * 7);
/// pool.submit(&unit).unwrap();
/// assert_eq!(pool.await_completion(&unit).unwrap(), 42);
/// ```
pub struct Unit<T> {
    id: UnitId,
    has_executable: bool,
    state: Mutex<UnitState<T>>,
    done: Condvar,
}

impl<T: Send + 'static> Unit<T> {
    /// Wrap a closure into a unit ready to be submitted.
    pub fn new<F>(f: F) -> Arc<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::from_job(Box::new(f))
    }

    /// A unit without an executable. Submitting it fails and awaiting it
    /// returns immediately.
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    pub(crate) fn from_job(job: Job<T>) -> Arc<Self> {
        Arc::new(Self::build(Some(job)))
    }

    fn build(job: Option<Job<T>>) -> Self {
        Self {
            id: NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed),
            has_executable: job.is_some(),
            state: Mutex::new(UnitState {
                status: UnitStatus::Idle,
                job,
                output: None,
            }),
            done: Condvar::new(),
        }
    }
}

impl<T> Unit<T> {
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Whether the unit was built with a closure.
    pub fn has_executable(&self) -> bool {
        self.has_executable
    }

    pub fn status(&self) -> UnitStatus {
        self.lock().status
    }

    /// Take the closure back out of a unit that never ran.
    ///
    /// Used when the queue refuses a unit so the caller can run it in place.
    pub(crate) fn take_job(&self) -> Option<Job<T>> {
        let mut state = self.lock();
        match state.status {
            UnitStatus::Idle => state.job.take(),
            _ => None,
        }
    }

    /// Remove the raw result, keeping any panic payload intact.
    pub(crate) fn take_result(&self) -> Option<thread::Result<T>> {
        self.lock().output.take()
    }

    /// Remove the output of a finished unit.
    pub(crate) fn take_output(&self) -> Result<T, AwaitError> {
        match self.take_result() {
            Some(Ok(value)) => Ok(value),
            Some(Err(payload)) => Err(AwaitError::Panicked(panic_message(payload.as_ref()))),
            None => Err(AwaitError::OutputTaken),
        }
    }

    fn lock(&self) -> MutexGuard<'_, UnitState<T>> {
        // Closures run outside the lock, so a poisoned guard still holds
        // consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send> Work for Unit<T> {
    fn id(&self) -> UnitId {
        self.id
    }

    fn prepare_submit(&self) -> Result<(), SubmitError> {
        let mut state = self.lock();
        if !self.has_executable || state.job.is_none() {
            return Err(SubmitError::InvalidUnit);
        }
        if state.status != UnitStatus::Idle {
            return Err(SubmitError::InvalidUnit);
        }
        state.status = UnitStatus::Queued;
        state.output = None;
        Ok(())
    }

    fn run(&self) -> bool {
        let job = {
            let mut state = self.lock();
            if state.status != UnitStatus::Queued {
                warn!(unit = self.id, status = ?state.status, "refusing to run unit outside the queued state");
                return false;
            }
            state.status = UnitStatus::Running;
            state.job.take()
        };

        let Some(job) = job else {
            warn!(unit = self.id, "queued unit had no executable");
            return false;
        };

        trace!(unit = self.id, "running unit");
        let result = panic::catch_unwind(AssertUnwindSafe(job));
        if let Err(payload) = &result {
            tracing::error!(unit = self.id, panic = %panic_message(payload.as_ref()), "unit panicked");
        }

        self.lock().output = Some(result);
        true
    }

    fn finish(&self) {
        self.lock().status = UnitStatus::Done;
        self.done.notify_all();
    }

    fn is_done(&self) -> bool {
        self.lock().status == UnitStatus::Done
    }

    fn has_unclaimed_panic(&self) -> bool {
        matches!(self.lock().output, Some(Err(_)))
    }

    fn wait_done(&self) {
        let mut state = self.lock();
        while state.status != UnitStatus::Done {
            state = self
                .done
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl<T> fmt::Debug for Unit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("has_executable", &self.has_executable)
            .field("status", &self.status())
            .finish()
    }
}
