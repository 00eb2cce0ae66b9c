//! # Divide-and-Conquer Sort
//!
//! Top-down merge sort: split the range, sort both halves into a scratch
//! buffer through the fork/join policy, then merge the scratch halves into
//! the destination. The merge continues the frame's depth, so the depth
//! cutoff bounds the units created by one call regardless of input size.

use std::cmp::Ordering;

use pmsort_pool::{log_pool, pool_span, ForkJoin, PoolConfig, WorkerPool, DEFAULT_MAX_DEPTH};

use crate::error::SortError;
use crate::merge::merge_into;

/// Sort `source` into `dest` using the recursion rooted at `depth`.
fn sort_frame<T, F>(fj: &ForkJoin<'_>, source: &[T], dest: &mut [T], depth: usize, compare: &F)
where
    T: Clone + Send + Sync,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    let n = source.len();
    match n {
        0 => return,
        1 => {
            dest[0] = source[0].clone();
            return;
        }
        _ => {}
    }

    let q = (n - 1) / 2;
    let (src_lo, src_hi) = source.split_at(q + 1);
    let mut scratch = source.to_vec();
    {
        let (scratch_lo, scratch_hi) = scratch.split_at_mut(q + 1);
        fj.join(
            depth,
            || sort_frame(fj, src_lo, scratch_lo, depth + 1, compare),
            || sort_frame(fj, src_hi, scratch_hi, depth + 1, compare),
        );
    }

    let (sorted_lo, sorted_hi) = scratch.split_at(q + 1);
    merge_into(fj, sorted_lo, sorted_hi, dest, depth, compare);
}

/// Run one full sort of `source` into `dest`, as a root unit when a pool is given.
fn run_sort<T, F>(source: &[T], dest: &mut [T], pool: Option<&WorkerPool>, max_depth: usize, compare: &F)
where
    T: Clone + Send + Sync,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    let len = source.len();
    if len == 0 {
        return;
    }

    let span = pool_span!("sort", len, max_depth);
    let _guard = span.enter();

    let fj = ForkJoin::new(pool, max_depth);
    match pool {
        Some(pool) => pool.install(|| sort_frame(&fj, source, dest, 0, compare)),
        None => sort_frame(&fj, source, dest, 0, compare),
    }
    log_pool!("sort", "completed", len);
}

/// Sort `source` into `dest`, leaving `source` untouched.
///
/// # Errors
/// `SortError::LengthMismatch` when the slices differ in length. Nothing is
/// written in that case.
///
/// # Examples
///
/// ```rust
/// use pmsort::sort_into;
/// use pmsort_pool::WorkerPool;
///
/// let pool = WorkerPool::with_capacity(2, 8).unwrap();
/// let source = [4, 1, 3, 2];
/// let mut dest = [0; 4];
/// sort_into(&source, &mut dest, Some(&pool), 2).unwrap();
/// assert_eq!(dest, [1, 2, 3, 4]);
/// ```
pub fn sort_into<T>(source: &[T], dest: &mut [T], pool: Option<&WorkerPool>, max_depth: usize) -> Result<(), SortError>
where
    T: Ord + Clone + Send + Sync,
{
    sort_into_by(source, dest, T::cmp, pool, max_depth)
}

/// [`sort_into`] with a custom comparator.
pub fn sort_into_by<T, F>(
    source: &[T],
    dest: &mut [T],
    compare: F,
    pool: Option<&WorkerPool>,
    max_depth: usize,
) -> Result<(), SortError>
where
    T: Clone + Send + Sync,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    if source.len() != dest.len() {
        return Err(SortError::LengthMismatch {
            source_len: source.len(),
            dest_len: dest.len(),
        });
    }
    run_sort(source, dest, pool, max_depth, &compare);
    Ok(())
}

/// Sort `data` in place. Stable.
///
/// With `pool` set, the recursion forks onto it down to `max_depth`;
/// without one the sort runs entirely on the calling thread.
pub fn sort<T>(data: &mut [T], pool: Option<&WorkerPool>, max_depth: usize)
where
    T: Ord + Clone + Send + Sync,
{
    sort_by(data, T::cmp, pool, max_depth);
}

/// Sort `data` in place with a comparator. Stable.
pub fn sort_by<T, F>(data: &mut [T], compare: F, pool: Option<&WorkerPool>, max_depth: usize)
where
    T: Clone + Send + Sync,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    if data.len() < 2 {
        return;
    }
    let source = data.to_vec();
    run_sort(&source, data, pool, max_depth, &compare);
}

/// Sort `data` in place by a key. Stable.
pub fn sort_by_key<T, K, F>(data: &mut [T], key: F, pool: Option<&WorkerPool>, max_depth: usize)
where
    T: Clone + Send + Sync,
    K: Ord,
    F: Fn(&T) -> K + Sync,
{
    sort_by(data, |a, b| key(a).cmp(&key(b)), pool, max_depth);
}

/// Build a temporary pool from `config`, sort `data` on it, and shut it down.
///
/// # Errors
/// `SortError::Pool` if the pool cannot be created.
pub fn sort_with_config<T>(data: &mut [T], config: PoolConfig, max_depth: usize) -> Result<(), SortError>
where
    T: Ord + Clone + Send + Sync,
{
    let pool = WorkerPool::new(config)?;
    sort(data, Some(&pool), max_depth);
    pool.shutdown();
    Ok(())
}

/// Reusable bundle of an optional pool and a depth cutoff.
///
/// ```rust
/// use pmsort::Sorter;
/// use pmsort_pool::WorkerPool;
///
/// let pool = WorkerPool::with_capacity(4, 16).unwrap();
/// let sorter = Sorter::new().with_pool(&pool).with_max_depth(3);
///
/// let mut words = vec!["pear", "fig", "apple", "kiwi"];
/// sorter.sort_by_key(&mut words, |w| w.len());
/// assert_eq!(words, ["fig", "pear", "kiwi", "apple"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Sorter<'p> {
    pool: Option<&'p WorkerPool>,
    max_depth: usize,
}

impl Default for Sorter<'_> {
    fn default() -> Self {
        Self {
            pool: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl<'p> Sorter<'p> {
    /// A sequential sorter with the default depth cutoff.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: &'p WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn pool(&self) -> Option<&'p WorkerPool> {
        self.pool
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn sort<T: Ord + Clone + Send + Sync>(&self, data: &mut [T]) {
        sort(data, self.pool, self.max_depth);
    }

    pub fn sort_by<T, F>(&self, data: &mut [T], compare: F)
    where
        T: Clone + Send + Sync,
        F: Fn(&T, &T) -> Ordering + Sync,
    {
        sort_by(data, compare, self.pool, self.max_depth);
    }

    pub fn sort_by_key<T, K, F>(&self, data: &mut [T], key: F)
    where
        T: Clone + Send + Sync,
        K: Ord,
        F: Fn(&T) -> K + Sync,
    {
        sort_by_key(data, key, self.pool, self.max_depth);
    }

    pub fn sort_into<T: Ord + Clone + Send + Sync>(&self, source: &[T], dest: &mut [T]) -> Result<(), SortError> {
        sort_into(source, dest, self.pool, self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_point_puts_middle_in_left_half() {
        // n = 5 splits as 0..=2 | 3..5; a single level must still sort.
        let mut data = vec![5, 3, 4, 1, 2];
        sort(&mut data, None, 0);
        assert_eq!(data, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_length_mismatch_writes_nothing() {
        let mut dest = [9, 9];
        let err = sort_into(&[3, 2, 1], &mut dest, None, 2).unwrap_err();
        assert!(matches!(err, SortError::LengthMismatch { source_len: 3, dest_len: 2 }));
        assert_eq!(dest, [9, 9]);
    }

    #[test]
    fn test_sort_into_leaves_source() {
        let source = vec![2, 1];
        let mut dest = vec![0, 0];
        sort_into(&source, &mut dest, None, 2).unwrap();
        assert_eq!(source, vec![2, 1]);
        assert_eq!(dest, vec![1, 2]);
    }
}
