// pmsort
//
// Stable merge sort whose recursion forks onto a `pmsort_pool::WorkerPool`
// down to a fixed depth, with a parallel merge that splits around binary
// searched pivots.

pub mod error;
mod merge;
pub mod sort;

pub use error::SortError;
pub use sort::{sort, sort_by, sort_by_key, sort_into, sort_into_by, sort_with_config, Sorter};

// The pool is part of this crate's API.
pub use pmsort_pool;
