use pmsort_pool::PoolError;
use thiserror::Error;

/// Errors returned by the checked sort entry points.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("Source and destination lengths differ (source: {source_len}, dest: {dest_len})")]
    LengthMismatch { source_len: usize, dest_len: usize },
    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}
