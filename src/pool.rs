//! Bounded worker pool for independent verifier evaluations.
//!
//! Analyses dispatch batches of pure evaluations (each job owns its perturbed
//! vector) onto a rayon pool sized for the batch. Results come back in input
//! order, so aggregation never depends on completion order.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::error::AppError;

/// Worker count for a batch of independent jobs: the batch size capped at the
/// machine's available parallelism. Degenerate batches get zero workers and
/// must be handled before any pool is built.
pub fn worker_count(jobs: usize) -> usize {
    jobs.min(available_parallelism())
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Evaluate a batch of jobs on a dedicated pool with the given worker count.
///
/// The pool is torn down when the call returns; nothing outlives the batch.
/// The output vector is index-aligned with `items`.
pub fn evaluate_batch<I, T, F>(workers: usize, items: Vec<I>, evaluate: F) -> Result<Vec<T>, AppError>
where
    I: Send,
    T: Send,
    F: Fn(I) -> T + Sync + Send,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    // rayon treats num_threads(0) as "pick a default", so clamp to 1.
    let pool = ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to build worker pool: {e}")))?;

    Ok(pool.install(|| items.into_par_iter().map(evaluate).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_caps_at_parallelism() {
        assert_eq!(worker_count(0), 0);
        assert_eq!(worker_count(1), 1);
        let cap = available_parallelism();
        assert_eq!(worker_count(usize::MAX), cap);
        assert!(worker_count(2) <= 2);
    }

    #[test]
    fn evaluate_batch_preserves_input_order() {
        let items: Vec<u64> = (0..100).collect();
        let out = evaluate_batch(4, items.clone(), |x| x * x).unwrap();
        let expected: Vec<u64> = items.iter().map(|x| x * x).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn evaluate_batch_empty_is_empty() {
        let out: Vec<u64> = evaluate_batch(4, Vec::<u64>::new(), |x| x).unwrap();
        assert!(out.is_empty());
    }
}
