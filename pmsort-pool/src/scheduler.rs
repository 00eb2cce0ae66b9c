//! # Fork/Join Scheduler
//!
//! Decides, at each level of a divide-and-conquer recursion, whether the two
//! halves become pool units or simply run one after the other on the current
//! thread.
//!
//! ## Policy
//! - No pool, or `depth > max_depth`: run both halves directly
//! - Otherwise offer each half to the pool independently; a half the pool
//!   refuses runs in place on the calling thread
//! - Return only once both halves are resolved
//!
//! The depth cutoff bounds how many units one top-level call can create:
//! the recursion tree above the cutoff has at most `2^(max_depth + 1)` forks.

use std::panic;

use tracing::trace;

use crate::config::DEFAULT_MAX_DEPTH;
use crate::pool::WorkerPool;

/// Depth-bounded fork/join policy over an optional [`WorkerPool`].
#[derive(Debug, Clone, Copy)]
pub struct ForkJoin<'p> {
    pool: Option<&'p WorkerPool>,
    max_depth: usize,
}

impl<'p> ForkJoin<'p> {
    pub fn new(pool: Option<&'p WorkerPool>, max_depth: usize) -> Self {
        Self { pool, max_depth }
    }

    /// A policy that never forks.
    pub fn sequential() -> Self {
        Self { pool: None, max_depth: 0 }
    }

    pub fn pool(&self) -> Option<&'p WorkerPool> {
        self.pool
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether a call at `depth` may hand its halves to the pool.
    pub fn forks_at(&self, depth: usize) -> bool {
        self.pool.is_some() && depth <= self.max_depth
    }

    /// Resolve `left` and `right`, in parallel when the policy allows.
    ///
    /// Callers pass `depth + 1` to whatever recursion happens inside the
    /// closures. If either side panics, the panic is re-raised here after
    /// both sides have finished.
    pub fn join<A, B, RA, RB>(&self, depth: usize, left: A, right: B) -> (RA, RB)
    where
        A: FnOnce() -> RA + Send,
        B: FnOnce() -> RB + Send,
        RA: Send + 'static,
        RB: Send + 'static,
    {
        let pool = match self.pool {
            Some(pool) if depth <= self.max_depth => pool,
            _ => return (left(), right()),
        };

        trace!(depth, "fork");
        match pool.join_pair(left, right) {
            (Ok(a), Ok(b)) => (a, b),
            (Err(payload), _) | (_, Err(payload)) => panic::resume_unwind(payload),
        }
    }
}

impl Default for ForkJoin<'_> {
    /// Sequential, with the default depth cutoff kept for when a pool is attached.
    fn default() -> Self {
        Self {
            pool: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
