//! Region data model and per-cycle driver.
//!
//! A [`Region`] owns a fixed array of [`Column`]s; each column owns its
//! feed-forward [`InputSynapse`]s and its [`Cell`]s; cells own their
//! dendrite [`Segment`]s, which own their lateral [`Connection`]s. Segments
//! and connections are created lazily during temporal-memory learning and
//! destroyed only by the forgetting pass or at teardown; columns and cells
//! are allocated once and never move.
//!
//! A connection refers to its target cell by **flat index**
//! `column_index * cell_count + cell_index`. The flat index is a weak
//! reference: cells are never freed individually, so it stays valid for the
//! region's lifetime and resolves in O(1).
//!
//! Two region-level snapshot arenas decouple cross-column reads from
//! per-column writes during parallel phases:
//!
//! - `prev` holds every cell's previous-cycle counter snapshot, rebuilt by
//!   the cycle phase; all same-cycle algorithms that distinguish this-cycle
//!   from last-cycle state read it immutably.
//! - `active_now` holds the current cycle's active flags, finalized
//!   sequentially before the predict phase and read immutably by it.
//!
//! Parallel phase functions receive `&mut [Column]` for their assigned
//! range plus `&`-shared snapshots only, so exclusive write access per
//! column range is enforced by the borrow checker with zero locks.

use crate::error::Result;
use crate::params::Params;
use crate::pool::{Phase, WorkerPool};
use crate::sdr::Sdr;
use crate::utils::rand_uint;
use crate::{spatial, temporal};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A synapse from a dendrite segment to a specific cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Cycle this connection last counted toward segment activity
    pub active_cycle: u64,
    /// Flat index of the target cell (`column * cell_count + cell`)
    pub target: usize,
    /// Permanence in [0, 1]
    pub perm: f64,
}

/// A dendrite: a group of connections that fires when enough of them
/// target currently (or previously) active cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Stable id within the owning cell; pending updates refer to it
    pub id: u64,
    /// Cycle this segment last activated
    pub active_cycle: u64,
    /// Number of outstanding updates referencing this segment.
    /// A segment with `pending > 0` is pinned: forgetting neither removes
    /// it nor prunes its connections.
    pub pending: u32,
    /// Connection activity count from the most recent evaluation
    pub activity: u32,
    pub active: bool,
    pub prev_active: bool,
    pub learning: bool,
    pub prev_learning: bool,
    pub connections: Vec<Connection>,
}

impl Segment {
    pub(crate) fn new(id: u64, cycle: u64, connections: Vec<Connection>) -> Self {
        Self {
            id,
            active_cycle: cycle,
            pending: 0,
            activity: 0,
            active: false,
            prev_active: false,
            learning: false,
            prev_learning: false,
            connections,
        }
    }
}

/// A pending synaptic change, scheduled during prediction or learning-cell
/// selection and consumed exactly once: either applied, or dropped by the
/// forgetting pass when stale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    /// Cycle this update was scheduled
    pub cycle: u64,
    /// Target segment id within the owning cell; `None` means "create a
    /// new segment on apply"
    pub segment: Option<u64>,
    /// Indices into the target segment's connection list that were active
    /// at schedule time
    pub active: Vec<usize>,
    /// Indices that were inactive at schedule time
    pub inactive: Vec<usize>,
    /// Newly proposed connections, owned until merged or dropped
    pub added: Vec<Connection>,
}

/// One sequence-memory unit. The three state channels are decrementing
/// "remaining" counters: nonzero means the state holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub active: u32,
    pub predictive: u32,
    pub learning: u32,
    /// Duration loaded into `active` when the cell activates
    pub remain_active: u32,
    pub remain_predictive: u32,
    pub remain_learning: u32,
    pub segments: Vec<Segment>,
    pub updates: Vec<Update>,
    /// Monotonic source of stable segment ids
    pub next_segment_id: u64,
}

impl Cell {
    fn new(remain_active: u32, remain_predictive: u32, remain_learning: u32) -> Self {
        Self {
            active: 0,
            predictive: 0,
            learning: 0,
            remain_active,
            remain_predictive,
            remain_learning,
            segments: Vec::new(),
            updates: Vec::new(),
            next_segment_id: 0,
        }
    }

    /// Resolve a stable segment id to its current position, if present.
    pub(crate) fn segment_position(&self, id: u64) -> Option<usize> {
        self.segments.iter().position(|s| s.id == id)
    }
}

/// A feed-forward synapse from a column to one bit of the input SDR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSynapse {
    /// Target bit index into the input SDR, fixed at init
    pub bit: usize,
    /// Recomputed each cycle by the overlap phase
    pub active: bool,
    /// Permanence in [0, 1]
    pub perm: f64,
}

/// A competitive feed-forward pattern detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub active: bool,
    pub overlap: u32,
    /// Boost multiplier, >= 1, capped at `column_max_boost`
    pub boost: u32,
    /// Index into input space used to bias initial permanences by distance
    pub center: usize,
    /// Exponential moving average of the activation rate
    pub avg_active: f64,
    /// Exponential moving average of the nonzero-overlap rate
    pub avg_overlap: f64,
    pub inputs: Vec<InputSynapse>,
    pub cells: Vec<Cell>,
}

/// Previous-cycle snapshot of one cell's three counters, captured by the
/// cycle phase before decay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevState {
    pub active: u32,
    pub predictive: u32,
    pub learning: u32,
}

/// Summary of one completed cycle, returned by [`Region::step`].
///
/// The two ratios are plain IEEE divisions: with no winning column the
/// burst ratio is NaN, and with no predictive cell the prediction overlap
/// is NaN. NaN is propagated, not masked; the boolean flags are derived
/// with ordinary comparisons, which are false for NaN, so no control
/// decision fires on the degenerate cases.
#[derive(Debug, Clone, Copy)]
pub struct CycleStats {
    /// Cycle counter value during the computation
    pub cycle: u64,
    /// Number of winning columns
    pub active_columns: usize,
    /// Number of columns that burst
    pub bursts: u32,
    /// `bursts / active_columns`
    pub burst_ratio: f64,
    /// Ratio of cells predictive both this cycle and last to cells
    /// predictive this cycle
    pub prediction_overlap: f64,
    /// `burst_ratio > detection_threshold`
    pub anomaly: bool,
    /// `prediction_overlap < overlap_threshold`
    pub low_overlap: bool,
}

fn fresh_rng() -> StdRng {
    StdRng::seed_from_u64(0)
}

/// The full processing unit for one hierarchical level.
#[derive(Debug, Serialize, Deserialize)]
pub struct Region {
    /// Monotonic cycle counter, starts at 0
    pub cycle: u64,
    /// Columns that burst this cycle; reset when the cycle advances
    pub bursts: u32,
    /// Maximum column activation average, updated by `region_averages`
    pub average_max: f64,
    /// Prediction-overlap ratio of the most recent cycle (may be NaN)
    pub overlap: f64,
    /// Winning columns of the current cycle, unordered
    pub active_columns: Vec<usize>,
    pub columns: Vec<Column>,
    /// Per-cell previous-cycle snapshots, flat column-major
    pub(crate) prev: Vec<PrevState>,
    /// Per-cell current-cycle active flags, finalized before predict
    pub(crate) active_now: Vec<bool>,
    /// Input SDR owned for the duration of one cycle
    pub(crate) sdr: Option<Sdr>,
    /// Cells per column, cached for flat indexing
    pub(crate) cell_count: usize,
    /// Drawn only in sequential phases, so results are independent of the
    /// worker count. Not persisted; reloads restart the stream.
    #[serde(skip, default = "fresh_rng")]
    pub(crate) rng: StdRng,
}

impl Region {
    /// Allocate and initialize a region from a validated parameter bundle.
    ///
    /// Feed-forward synapses get distance-biased initial permanences around
    /// a random column center; cell state counters start cleared with their
    /// configured (optionally randomized) remain durations.
    ///
    /// # Examples
    ///
    /// ```
    /// use cortical::{Params, Region};
    ///
    /// let mut params = Params::default();
    /// params.column_count = 8;
    /// params.cell_count = 4;
    /// params.input_count = 4;
    /// let region = Region::new(&params, 42).unwrap();
    /// assert_eq!(region.columns.len(), 8);
    /// ```
    pub fn new(params: &Params, seed: u64) -> Result<Self> {
        params.validate()?;

        let mut rng = StdRng::seed_from_u64(seed);
        let input_len = params.input_len();
        let mut columns = Vec::with_capacity(params.column_count);

        for _ in 0..params.column_count {
            let (center, inputs) = spatial::init_inputs(input_len, params, &mut rng);
            let mut cells = Vec::with_capacity(params.cell_count);
            for _ in 0..params.cell_count {
                let (ra, rp, rl) = if params.cell_remain_random {
                    (
                        rand_uint(1, params.cell_remain_active, &mut rng),
                        rand_uint(1, params.cell_remain_predictive, &mut rng),
                        rand_uint(1, params.cell_remain_learning, &mut rng),
                    )
                } else {
                    (
                        params.cell_remain_active,
                        params.cell_remain_predictive,
                        params.cell_remain_learning,
                    )
                };
                cells.push(Cell::new(ra, rp, rl));
            }
            columns.push(Column {
                active: false,
                overlap: 0,
                boost: 1,
                center,
                avg_active: 0.0,
                avg_overlap: 0.0,
                inputs,
                cells,
            });
        }

        let total_cells = params.total_cells();
        Ok(Self {
            cycle: 0,
            bursts: 0,
            average_max: 0.0,
            overlap: 0.0,
            active_columns: Vec::new(),
            columns,
            prev: vec![PrevState::default(); total_cells],
            active_now: vec![false; total_cells],
            sdr: None,
            cell_count: params.cell_count,
            rng,
        })
    }

    /// Total number of cells in the region.
    #[inline]
    pub fn total_cells(&self) -> usize {
        self.columns.len() * self.cell_count
    }

    /// Cells per column.
    #[inline]
    pub fn cells_per_column(&self) -> usize {
        self.cell_count
    }

    /// Run one full cycle over the given input SDR.
    ///
    /// The input may be locally encoded ([`Sdr::encode`]) or externally
    /// supplied (e.g. concatenated upstream predictive bitmaps); the region
    /// owns it for the duration of the cycle.
    ///
    /// Phase sequence: parallel overlap, sequential winner selection,
    /// sequential reinforcement and averages plus parallel boosting (when
    /// learning), sequential cell activation, parallel prediction,
    /// sequential anomaly/overlap scoring, parallel update application
    /// (when learning), parallel decay, and a periodic parallel forgetting
    /// pass. Every parallel phase is a strict fork-join barrier.
    pub fn step(&mut self, input: Sdr, pool: &WorkerPool, params: &Params) -> CycleStats {
        self.sdr = Some(input);

        pool.run(self, params, Phase::Overlap);
        spatial::activate_region(self, params);

        if params.enable_learning {
            spatial::reinforce_region(self, params);
            spatial::region_averages(self, params);
            if self.cycle >= params.column_start_boost {
                pool.run(self, params, Phase::Boost);
            }
        }

        temporal::activate_region(self, params);

        let winners = self.active_columns.len();
        let burst_ratio = self.bursts as f64 / winners as f64;

        // Prediction reads each cell's finalized active flag; snapshot it
        // once so parallel jobs share an immutable view.
        self.snapshot_active();
        pool.run(self, params, Phase::Predict);

        let anomaly = burst_ratio > params.detection_threshold;
        if anomaly {
            log::warn!("cycle {}: anomaly detected (burst ratio {:.3})", self.cycle, burst_ratio);
            temporal::reset_prediction(self);
        }

        let prediction_overlap = temporal::overlap_score(self);
        let low_overlap = prediction_overlap < params.overlap_threshold;
        if low_overlap {
            log::warn!(
                "cycle {}: low prediction overlap ({:.3})",
                self.cycle,
                prediction_overlap
            );
        }

        if params.enable_learning {
            pool.run(self, params, Phase::ApplyUpdates);
        }
        pool.run(self, params, Phase::Cycle);

        let stats = CycleStats {
            cycle: self.cycle,
            active_columns: winners,
            bursts: self.bursts,
            burst_ratio,
            prediction_overlap,
            anomaly,
            low_overlap,
        };

        self.cycle += 1;
        self.bursts = 0;
        self.active_columns.clear();
        self.sdr = None;

        if params.enable_learning && self.cycle % params.forget_interval == 0 {
            pool.run(self, params, Phase::ForgetUpdates);
            pool.run(self, params, Phase::ForgetSegments);
        }

        log::debug!(
            "cycle {} done: {} winners, {} bursts, overlap {:.3}",
            stats.cycle,
            stats.active_columns,
            stats.bursts,
            stats.prediction_overlap
        );
        stats
    }

    /// Previous-cycle predictive-cell bitmap, one bit per cell in
    /// column-major order, for transmission to downstream regions.
    pub fn predictive_bitmap(&self) -> Sdr {
        let mut sdr = Sdr::new(self.prev.len());
        for (i, p) in self.prev.iter().enumerate() {
            if p.predictive > 0 {
                sdr.set(i);
            }
        }
        sdr
    }

    /// Capture every cell's current active flag into the shared snapshot.
    fn snapshot_active(&mut self) {
        let mut i = 0;
        for col in &self.columns {
            for cell in &col.cells {
                self.active_now[i] = cell.active > 0;
                i += 1;
            }
        }
    }

    /// Persist the full structural state to a file with bincode.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reconstruct a region from a file written by [`Region::save`].
    ///
    /// The rebuilt graph is isomorphic to the saved one: connection targets
    /// are flat cell indices and resolve without fixup. The RNG stream is
    /// not persisted and restarts from a fixed seed.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let region: Region = bincode::deserialize_from(BufReader::new(file))?;
        Ok(region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> Params {
        let mut p = Params::default();
        p.column_count = 8;
        p.cell_count = 4;
        p.input_count = 4;
        p.sdr_base = 16;
        p.sdr_set = 4;
        p.region_active_columns = 2;
        p
    }

    #[test]
    fn test_allocation_shape() {
        let params = small_params();
        let region = Region::new(&params, 1).unwrap();
        assert_eq!(region.columns.len(), 8);
        assert_eq!(region.total_cells(), 32);
        for col in &region.columns {
            assert_eq!(col.inputs.len(), 4);
            assert_eq!(col.cells.len(), 4);
            assert_eq!(col.boost, 1);
            assert!(col.center < params.input_len());
            for input in &col.inputs {
                assert!(input.bit < params.input_len());
                assert!((0.0..=1.0).contains(&input.perm));
            }
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut params = small_params();
        params.cell_count = 0;
        assert!(Region::new(&params, 1).is_err());
    }

    #[test]
    fn test_randomized_remain_durations_in_range() {
        let mut params = small_params();
        params.cell_remain_active = 5;
        params.cell_remain_predictive = 3;
        params.cell_remain_learning = 2;
        params.cell_remain_random = true;
        let region = Region::new(&params, 7).unwrap();
        for col in &region.columns {
            for cell in &col.cells {
                assert!((1..=5).contains(&cell.remain_active));
                assert!((1..=3).contains(&cell.remain_predictive));
                assert!((1..=2).contains(&cell.remain_learning));
            }
        }
    }

    #[test]
    fn test_predictive_bitmap_shape() {
        let params = small_params();
        let mut region = Region::new(&params, 1).unwrap();
        let bitmap = region.predictive_bitmap();
        assert_eq!(bitmap.len(), 32);
        assert_eq!(bitmap.num_set(), 0);

        // column 2, cell 1 predicted last cycle
        region.prev[2 * 4 + 1].predictive = 1;
        let bitmap = region.predictive_bitmap();
        assert_eq!(bitmap.get_acts(), vec![9]);
    }

    #[test]
    fn test_identical_seeds_identical_regions() {
        let params = small_params();
        let a = Region::new(&params, 99).unwrap();
        let b = Region::new(&params, 99).unwrap();
        assert_eq!(
            bincode::serialize(&a).unwrap(),
            bincode::serialize(&b).unwrap()
        );
    }
}
