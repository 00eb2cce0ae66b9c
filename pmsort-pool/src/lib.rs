// pmsort worker pool
//
// A fixed set of worker threads fed by one bounded LIFO queue, plus the
// depth-bounded fork/join policy used by divide-and-conquer algorithms on
// top of it. Full queues never block a submitter: refused work runs on the
// submitting thread instead.

pub mod config;
pub mod error;
pub mod logging;
pub mod pool;
pub mod queue;
pub mod scheduler;
pub mod scope;
pub mod unit;

// Re-export commonly used types
pub use config::{PoolConfig, DEFAULT_MAX_DEPTH, DEFAULT_QUEUE_CAPACITY, DEFAULT_THREAD_NAME_PREFIX};
pub use error::{AwaitError, PoolError, SubmitError};
pub use pool::{PoolMetrics, PoolStatus, ShutdownReport, WorkerPool, WorkerStatus};
pub use queue::BoundedQueue;
pub use scheduler::ForkJoin;
pub use scope::{Fork, Scope};
pub use unit::{Unit, UnitId, UnitStatus, Work};
