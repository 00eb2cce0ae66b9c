//! # Worker Thread Implementation
//!
//! Each worker is a named OS thread that repeatedly takes the front unit
//! from the shared [`BoundedQueue`](crate::BoundedQueue) and executes it.
//!
//! ## Core Algorithm
//! 1. Block in `take()` until a unit is available or the queue terminates
//! 2. Run the unit and store its output
//! 3. Release its slot in the active count, then mark it done and wake its waiters
//! 4. Exit once `take()` reports a terminated, drained queue

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use super::worker_pool::{ExecutedBy, PoolShared};

/// Status codes for worker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Worker is waiting for a unit
    Idle = 0,

    /// Worker is executing a unit
    Processing = 1,

    /// Worker loop has exited
    Stopped = 2,
}

impl WorkerStatus {
    pub(crate) fn from_raw(raw: usize) -> Self {
        match raw {
            0 => WorkerStatus::Idle,
            1 => WorkerStatus::Processing,
            _ => WorkerStatus::Stopped,
        }
    }
}

pub(crate) struct Worker {
    id: usize,
    shared: Arc<PoolShared>,
    status: Arc<AtomicUsize>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("status", &WorkerStatus::from_raw(self.status.load(Ordering::Relaxed)))
            .finish()
    }
}

impl Worker {
    pub(crate) fn new(id: usize, shared: Arc<PoolShared>) -> Self {
        Self {
            id,
            shared,
            status: Arc::new(AtomicUsize::new(WorkerStatus::Idle as usize)),
        }
    }

    /// Shared handle to this worker's status cell.
    pub(crate) fn status(&self) -> Arc<AtomicUsize> {
        self.status.clone()
    }

    /// Launch the worker loop on its own thread.
    pub(crate) fn spawn(self, name_prefix: &str, stack_size: Option<usize>) -> io::Result<JoinHandle<()>> {
        let mut builder = thread::Builder::new().name(format!("{}-{}", name_prefix, self.id));
        if let Some(bytes) = stack_size {
            builder = builder.stack_size(bytes);
        }
        builder.spawn(move || {
            let dispatch = self.shared.dispatch().clone();
            tracing::dispatcher::with_default(&dispatch, || self.run_loop());
        })
    }

    fn run_loop(&self) {
        debug!(worker = self.id, "worker started");

        while let Some(unit) = self.shared.queue().take() {
            self.status.store(WorkerStatus::Processing as usize, Ordering::Relaxed);
            trace!(worker = self.id, unit = unit.id(), "worker took unit");
            self.shared.execute(unit, ExecutedBy::Worker(self.id));
            self.status.store(WorkerStatus::Idle as usize, Ordering::Relaxed);
        }

        self.status.store(WorkerStatus::Stopped as usize, Ordering::Relaxed);
        debug!(worker = self.id, "worker stopped");
    }
}
