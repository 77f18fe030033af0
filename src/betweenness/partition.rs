//! Contiguous batch partitioning of the source-vertex sequence.
//!
//! Worker `i` of `N` receives `[i * L/N, (i + 1) * L/N)`; the last worker's
//! batch extends to `L`, absorbing the `L mod N` remainder. Concatenating the
//! batches in worker order reproduces the input exactly.

use core::ops::Range;

/// Index range of worker `worker_index`'s batch in a sequence of `len` sources.
///
/// # Panics
/// Panics if `worker_count == 0` or `worker_index >= worker_count`.
#[inline]
pub fn batch_bounds(len: usize, worker_count: usize, worker_index: usize) -> Range<usize> {
    assert!(worker_count != 0, "worker_count must be > 0");
    assert!(
        worker_index < worker_count,
        "worker {worker_index} out of range for {worker_count} workers"
    );
    let batch_size = len / worker_count;
    let begin = worker_index * batch_size;
    let end = if worker_index + 1 == worker_count {
        len
    } else {
        begin + batch_size
    };
    begin..end
}

/// The batch of `sources` assigned to worker `worker_index` of `worker_count`.
///
/// # Panics
/// Panics if `worker_count == 0` or `worker_index >= worker_count`.
#[inline]
pub fn partition<T>(sources: &[T], worker_count: usize, worker_index: usize) -> &[T] {
    &sources[batch_bounds(sources.len(), worker_count, worker_index)]
}
