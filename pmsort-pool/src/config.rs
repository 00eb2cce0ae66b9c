use std::fmt;

use crate::error::PoolError;

/// Default number of pending-or-running units the queue admits.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default fan-out depth cutoff for fork/join recursion.
pub const DEFAULT_MAX_DEPTH: usize = 2;

pub const DEFAULT_THREAD_NAME_PREFIX: &str = "pmsort-worker";

// --- Pool Configuration ---

/// Configuration for a [`WorkerPool`](crate::WorkerPool).
#[derive(Clone)]
pub struct PoolConfig {
    /// The number of worker threads. Fixed for the life of the pool.
    pub worker_count: usize,

    /// Maximum number of units that may be queued or running at once.
    pub queue_capacity: usize,

    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,

    /// Stack size for worker threads. `None` keeps the platform default.
    pub stack_size: Option<usize>,

    /// Logging capability handed to every worker thread.
    ///
    /// When `None`, the pool captures the subscriber that is current on the
    /// thread calling [`WorkerPool::new`](crate::WorkerPool::new).
    pub dispatch: Option<tracing::Dispatch>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
            dispatch: None,
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("worker_count", &self.worker_count)
            .field("queue_capacity", &self.queue_capacity)
            .field("thread_name_prefix", &self.thread_name_prefix)
            .field("stack_size", &self.stack_size)
            .field("dispatch", &self.dispatch.is_some())
            .finish()
    }
}

impl PoolConfig {
    /// Shorthand for a default config with the given sizes.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        Self {
            worker_count,
            queue_capacity,
            ..Default::default()
        }
    }

    pub fn with_dispatch(mut self, dispatch: tracing::Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.worker_count == 0 {
            return Err(PoolError::Config("worker_count must be at least 1".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(PoolError::Config("queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}
