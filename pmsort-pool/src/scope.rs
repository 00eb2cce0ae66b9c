//! # Scoped Units
//!
//! [`WorkerPool::scope`] lets closures that borrow from the caller's stack
//! run on the pool. Every unit spawned in a scope has finished before
//! `scope` returns, which is what makes lending `&mut` slices to other
//! threads sound.
//!
//! ```rust
//! use pmsort_pool::WorkerPool;
//!
//! let pool = WorkerPool::with_capacity(2, 4).unwrap();
//! let mut data = [3, 1, 2, 5];
//! let (left, right) = data.split_at_mut(2);
//! pool.scope(|s| {
//!     let a = s.spawn(|| left.sort());
//!     let b = s.spawn(|| right.sort());
//!     a.join().unwrap();
//!     b.join().unwrap();
//! });
//! assert_eq!(data, [1, 3, 2, 5]);
//! ```

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tracing::{debug, trace};

use crate::error::SubmitError;
use crate::pool::WorkerPool;
use crate::unit::{Job, Unit, Work};

/// A scope for spawning units that borrow non-`'static` data.
///
/// Created by [`WorkerPool::scope`].
pub struct Scope<'scope, 'env: 'scope> {
    pool: &'env WorkerPool,
    spawned: Mutex<Vec<Arc<dyn Work>>>,
    scope: PhantomData<&'scope mut &'scope ()>,
    env: PhantomData<&'env mut &'env ()>,
}

/// Handle to one side of a fork, returned by [`Scope::spawn`].
///
/// The closure either sits in the pool's queue, or the queue refused it and
/// it runs on the joining thread when [`Fork::join`] is called. A fork that
/// is dropped without being joined still runs if it was queued; a refused
/// one is discarded.
pub struct Fork<'scope, T> {
    pool: &'scope WorkerPool,
    state: ForkState<T>,
    _scope: PhantomData<&'scope ()>,
}

enum ForkState<T> {
    Queued(Arc<Unit<T>>),
    Inline { unit: Arc<Unit<T>>, reason: SubmitError },
}

impl WorkerPool {
    /// Run `f` with a [`Scope`] whose spawned units may borrow from the
    /// enclosing stack frame.
    ///
    /// All units spawned in the scope are waited for before this returns,
    /// joined or not. If `f` panics, the panic is re-raised after that wait.
    /// If `f` returns normally but an unjoined unit panicked, this panics too.
    pub fn scope<'env, F, R>(&'env self, f: F) -> R
    where
        F: for<'scope> FnOnce(&'scope Scope<'scope, 'env>) -> R,
    {
        let scope = Scope::new(self);

        let result = panic::catch_unwind(AssertUnwindSafe(|| f(&scope)));
        let unclaimed_panic = scope.wait_all();

        match result {
            Ok(value) => {
                if unclaimed_panic {
                    panic!("a unit spawned in this scope panicked");
                }
                value
            }
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Run `f` as a single root unit on the pool and return its output.
    ///
    /// The calling thread helps with queued work until `f` is done. If the
    /// queue refuses the unit, `f` runs right here instead. A panic inside
    /// `f` is re-raised on the calling thread.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send + 'static,
    {
        let scope = Scope::new(self);
        let joined = panic::catch_unwind(AssertUnwindSafe(|| {
            let root = scope.spawn(f);
            debug!(queued = root.is_queued(), "root unit installed");
            root.join()
        }));
        scope.wait_all();

        match joined {
            Ok(Ok(value)) => value,
            Ok(Err(payload)) | Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Offer both closures to the pool and wait for both results.
    ///
    /// The scope here is local to this call, so the closures only need to
    /// outlive it, which any generic caller can guarantee.
    pub(crate) fn join_pair<A, B, RA, RB>(&self, left: A, right: B) -> (thread::Result<RA>, thread::Result<RB>)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send + 'static,
        RB: Send + 'static,
    {
        let scope = Scope::new(self);
        let forked = panic::catch_unwind(AssertUnwindSafe(|| {
            let left = scope.spawn(left);
            let right = scope.spawn(right);
            trace!(
                left_queued = left.is_queued(),
                right_queued = right.is_queued(),
                "forked pair"
            );
            (left.join(), right.join())
        }));
        scope.wait_all();

        match forked {
            Ok(results) => results,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<'scope, 'env> Scope<'scope, 'env> {
    fn new(pool: &'env WorkerPool) -> Self {
        Scope {
            pool,
            spawned: Mutex::new(Vec::new()),
            scope: PhantomData,
            env: PhantomData,
        }
    }

    /// Offer `f` to the pool.
    ///
    /// Never blocks. If the queue refuses it (full, or shutting down) the
    /// returned [`Fork`] runs `f` in place when joined.
    pub fn spawn<F, T>(&'scope self, f: F) -> Fork<'scope, T>
    where
        F: FnOnce() -> T + Send + 'scope,
        T: Send + 'static,
    {
        let job: Box<dyn FnOnce() -> T + Send + 'scope> = Box::new(f);
        // SAFETY: the closure may borrow data living for 'scope. A queued unit
        // is tracked in `spawned`, and every function that creates a `Scope`
        // calls `wait_all` before returning, panics included; a refused unit
        // stays inside the returned `Fork`, which cannot outlive 'scope. The
        // closure is therefore never run or dropped after its borrows expire.
        let job: Job<T> = unsafe {
            mem::transmute::<Box<dyn FnOnce() -> T + Send + 'scope>, Job<T>>(job)
        };
        let unit = Unit::from_job(job);

        let state = match self.pool.submit(&unit) {
            Ok(()) => {
                self.lock_spawned().push(unit.clone());
                ForkState::Queued(unit)
            }
            Err(reason) => {
                debug!(unit = unit.id(), reason = %reason, "fork will run inline");
                ForkState::Inline { unit, reason }
            }
        };

        Fork {
            pool: self.pool,
            state,
            _scope: PhantomData,
        }
    }

    pub fn pool(&self) -> &'env WorkerPool {
        self.pool
    }

    /// Wait for every queued unit, helping the pool meanwhile.
    ///
    /// Returns whether any of them panicked without being joined.
    fn wait_all(&self) -> bool {
        let mut unclaimed_panic = false;
        loop {
            // Units running inline on this thread may spawn into this scope,
            // so the list is not held locked while waiting.
            let batch = mem::take(&mut *self.lock_spawned());
            if batch.is_empty() {
                return unclaimed_panic;
            }
            for unit in batch {
                self.pool.help_until_done(&*unit);
                unclaimed_panic |= unit.has_unclaimed_panic();
            }
        }
    }

    fn lock_spawned(&self) -> MutexGuard<'_, Vec<Arc<dyn Work>>> {
        self.spawned.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Fork<'_, T> {
    /// Whether the pool accepted this side.
    pub fn is_queued(&self) -> bool {
        matches!(self.state, ForkState::Queued(_))
    }

    /// Why the pool refused this side, if it did.
    pub fn rejection(&self) -> Option<&SubmitError> {
        match &self.state {
            ForkState::Queued(_) => None,
            ForkState::Inline { reason, .. } => Some(reason),
        }
    }
}

impl<T: Send + 'static> Fork<'_, T> {
    /// Wait for the queued unit, or run the refused closure right here.
    ///
    /// Like `std::thread::JoinHandle::join`, a panic inside the closure is
    /// returned as `Err` with the original payload.
    pub fn join(self) -> thread::Result<T> {
        match self.state {
            ForkState::Queued(unit) => {
                self.pool.help_until_done(&*unit);
                unit.take_result()
                    .unwrap_or_else(|| Err(missing("fork output already taken")))
            }
            ForkState::Inline { unit, .. } => match unit.take_job() {
                Some(job) => panic::catch_unwind(AssertUnwindSafe(job)),
                None => Err(missing("fork closure already consumed")),
            },
        }
    }
}

fn missing(reason: &'static str) -> Box<dyn Any + Send> {
    Box::new(reason)
}

impl<T> fmt::Debug for Fork<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, queued) = match &self.state {
            ForkState::Queued(unit) => (unit.id(), true),
            ForkState::Inline { unit, .. } => (unit.id(), false),
        };
        f.debug_struct("Fork")
            .field("unit", &unit)
            .field("queued", &queued)
            .finish()
    }
}

impl fmt::Debug for Scope<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("pool", &self.pool)
            .field("pending", &self.lock_spawned().len())
            .finish()
    }
}
