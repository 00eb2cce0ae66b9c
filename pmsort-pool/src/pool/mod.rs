//! # Worker Pool Module
//!
//! A fixed number of long-lived worker threads pulling units from one
//! [`BoundedQueue`](crate::BoundedQueue).
//!
//! ## Key Concepts
//! - Completion protocol: run, store output, release capacity, mark done and notify
//! - Helping: threads waiting on a unit execute queued units meanwhile
//! - Draining shutdown: queued units always run before workers exit

mod worker;
mod worker_pool;

pub use worker::WorkerStatus;
pub use worker_pool::{PoolMetrics, PoolStatus, ShutdownReport, WorkerPool};
