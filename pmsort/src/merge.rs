//! # Parallel Merge
//!
//! Merges two sorted runs into a destination of exactly their combined
//! length. Each step picks the median of the longer run as a pivot, finds
//! where it lands in the shorter run by binary search, writes it to its final
//! slot, and leaves the two independent halves to the fork/join policy.
//!
//! ## Stability
//! Ties always resolve in favor of the left run. When the pivot comes from
//! the left run the search is a lower bound in the right run, so equal right
//! elements land after it; when it comes from the right run the search is an
//! upper bound in the left run, so equal left elements land before it.

use std::cmp::Ordering;

use pmsort_pool::ForkJoin;

/// Merge the sorted runs `left` and `right` into `dest`.
///
/// `dest.len()` must equal `left.len() + right.len()`.
pub(crate) fn merge_into<T, F>(
    fj: &ForkJoin<'_>,
    left: &[T],
    right: &[T],
    dest: &mut [T],
    depth: usize,
    compare: &F,
) where
    T: Clone + Send + Sync,
    F: Fn(&T, &T) -> Ordering + Sync,
{
    debug_assert_eq!(left.len() + right.len(), dest.len());

    let pivot_from_left = left.len() >= right.len();
    let (long, short) = if pivot_from_left { (left, right) } else { (right, left) };
    if long.is_empty() {
        return;
    }

    let q1 = (long.len() - 1) / 2;
    let pivot = &long[q1];
    let q2 = if pivot_from_left {
        short.partition_point(|x| compare(x, pivot) == Ordering::Less)
    } else {
        short.partition_point(|x| compare(x, pivot) != Ordering::Greater)
    };
    let q3 = q1 + q2;

    let (dest_lo, rest) = dest.split_at_mut(q3);
    let (slot, dest_hi) = rest.split_at_mut(1);
    slot[0] = pivot.clone();

    let (long_lo, long_hi) = (&long[..q1], &long[q1 + 1..]);
    let (short_lo, short_hi) = short.split_at(q2);

    // Sub-merges keep the original left/right roles.
    let (lo_left, lo_right, hi_left, hi_right) = if pivot_from_left {
        (long_lo, short_lo, long_hi, short_hi)
    } else {
        (short_lo, long_lo, short_hi, long_hi)
    };

    fj.join(
        depth,
        || merge_into(fj, lo_left, lo_right, dest_lo, depth + 1, compare),
        || merge_into(fj, hi_left, hi_right, dest_hi, depth + 1, compare),
    );
}
