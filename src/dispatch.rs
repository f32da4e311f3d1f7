//! Fork-join dispatch of per-cell work over a fixed worker pool.
//!
//! Worker `i` of `W` handles items `i, i + W, i + 2W, ...`. The call returns
//! only after every worker has finished, which is the barrier between passes.

use rayon::prelude::*;

use crate::error::{Result, TerrainError};

/// Items handled by `worker` when `total` items are split across `workers`.
pub fn partition(worker: usize, workers: usize, total: usize) -> impl Iterator<Item = usize> {
    (worker..total).step_by(workers.max(1))
}

/// A fixed-size pool that runs strided partitions of a work list.
#[derive(Debug)]
pub struct Dispatcher {
    workers: usize,
    pool: rayon::ThreadPool,
}

impl Dispatcher {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(TerrainError::invalid_parameter("workers", "must be at least 1"));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("terrain-worker-{}", i))
            .build()
            .map_err(|e| TerrainError::invalid_parameter("workers", e.to_string()))?;
        Ok(Self { workers, pool })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `work` once for every item in `0..total` and return the results in
    /// item order. Blocks until all partitions are done. If any item fails,
    /// the failure with the lowest item index is returned.
    pub fn run_partitioned<R, F>(&self, total: usize, work: F) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(usize) -> Result<R> + Sync,
    {
        let workers = self.workers;
        let partitions: Vec<Vec<(usize, Result<R>)>> = self.pool.install(|| {
            (0..workers)
                .into_par_iter()
                .map(|worker| {
                    partition(worker, workers, total)
                        .map(|item| (item, work(item)))
                        .collect::<Vec<_>>()
                })
                .collect()
        });

        let mut results: Vec<(usize, Result<R>)> = partitions.into_iter().flatten().collect();
        results.sort_unstable_by_key(|(item, _)| *item);
        debug_assert_eq!(results.len(), total);
        log::trace!("dispatched {} items across {} workers", total, workers);

        results.into_iter().map(|(_, result)| result).collect()
    }
}
