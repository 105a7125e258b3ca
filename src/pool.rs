//! Fixed worker pool for the data-parallel phases of a cycle.
//!
//! The column array is split into contiguous, near-equal ranges, one per
//! worker, and each parallel phase runs the same per-range function over
//! all ranges as a strict fork-join: [`WorkerPool::run`] returns only when
//! every range has been processed, so phases never overlap.
//!
//! Each job gets exclusive mutable access to its column range and shared
//! access to the region-level snapshot arenas. Disjointness of the ranges
//! is established by `par_chunks_mut`, so no phase takes a lock.

use crate::error::{CorticalError, Result};
use crate::params::Params;
use crate::region::Region;
use crate::utils::div_ceil;
use crate::{spatial, temporal};
use rayon::prelude::*;

/// The parallel phases of one cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Compute boosted column overlaps with the input SDR
    Overlap,
    /// Adjust boost multipliers of starved columns
    Boost,
    /// Compute predictive cell states and schedule reinforcement updates
    Predict,
    /// Consume pending updates with positive or negative reinforcement
    ApplyUpdates,
    /// Snapshot counters and advance cell and segment state one timestep
    Cycle,
    /// Drop updates older than the staleness horizon
    ForgetUpdates,
    /// Remove stale segments and dead connections
    ForgetSegments,
}

/// A fixed-size thread pool dispatching phase functions over column ranges.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    workers: usize,
}

impl WorkerPool {
    /// Build a pool with `workers` threads.
    ///
    /// # Examples
    ///
    /// ```
    /// use cortical::WorkerPool;
    ///
    /// let pool = WorkerPool::new(4).unwrap();
    /// assert_eq!(pool.workers(), 4);
    /// ```
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(CorticalError::Pool("worker count must be > 0".into()));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| CorticalError::Pool(e.to_string()))?;
        Ok(Self { pool, workers })
    }

    /// Number of worker threads.
    #[inline]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Execute one parallel phase over the whole region and wait for it.
    pub fn run(&self, region: &mut Region, params: &Params, phase: Phase) {
        let chunk = div_ceil(region.columns.len(), self.workers).max(1);
        let cell_count = region.cell_count;
        let cycle = region.cycle;
        match phase {
            Phase::Overlap => {
                let sdr = match region.sdr.as_ref() {
                    Some(sdr) => sdr,
                    None => return,
                };
                let columns = &mut region.columns;
                self.pool.install(|| {
                    columns
                        .par_chunks_mut(chunk)
                        .for_each(|cols| spatial::overlap_columns(cols, sdr, params));
                });
            }
            Phase::Boost => {
                let max = region.average_max;
                let columns = &mut region.columns;
                self.pool.install(|| {
                    columns
                        .par_chunks_mut(chunk)
                        .for_each(|cols| spatial::boost_columns(cols, max, params));
                });
            }
            Phase::Predict => {
                let Region {
                    columns,
                    active_now,
                    ..
                } = region;
                let active_now = &active_now[..];
                self.pool.install(|| {
                    columns
                        .par_chunks_mut(chunk)
                        .for_each(|cols| temporal::predict_columns(cols, active_now, cycle, params));
                });
            }
            Phase::ApplyUpdates => {
                let Region { columns, prev, .. } = region;
                let prev = &prev[..];
                self.pool.install(|| {
                    columns
                        .par_chunks_mut(chunk)
                        .enumerate()
                        .for_each(|(i, cols)| {
                            temporal::apply_updates_columns(
                                cols,
                                i * chunk,
                                prev,
                                cell_count,
                                cycle,
                                params,
                            )
                        });
                });
            }
            Phase::Cycle => {
                let Region { columns, prev, .. } = region;
                self.pool.install(|| {
                    columns
                        .par_chunks_mut(chunk)
                        .zip(prev.par_chunks_mut(chunk * cell_count))
                        .for_each(|(cols, prev)| temporal::cycle_columns(cols, prev));
                });
            }
            Phase::ForgetUpdates => {
                let horizon = params.forget_interval;
                let columns = &mut region.columns;
                self.pool.install(|| {
                    columns
                        .par_chunks_mut(chunk)
                        .for_each(|cols| temporal::forget_updates_columns(cols, cycle, horizon));
                });
            }
            Phase::ForgetSegments => {
                let horizon = params.forget_interval;
                let columns = &mut region.columns;
                self.pool.install(|| {
                    columns
                        .par_chunks_mut(chunk)
                        .for_each(|cols| temporal::forget_segments_columns(cols, cycle, horizon));
                });
            }
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}
