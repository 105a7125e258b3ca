//! Region configuration.
//!
//! All tunables of the engine live in one immutable [`Params`] bundle that
//! is constructed once at startup and passed by reference into every
//! component. The external configuration loader is expected to produce a
//! `Params` (e.g. by deserializing JSON via [`Params::from_json`]); the
//! core never reads files on its own beyond the provided helpers and never
//! mutates the bundle after validation.

use crate::error::{CorticalError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Immutable parameter bundle for one region.
///
/// Field groups mirror the structures they tune: feed-forward inputs,
/// columns, cells, dendrite segments, synaptic connections, forgetting and
/// the anomaly/overlap signals.
///
/// # Examples
///
/// ```
/// use cortical::Params;
///
/// let mut params = Params::default();
/// params.column_count = 64;
/// params.cell_count = 4;
/// params.validate().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Params {
    /// Number of columns in the region
    pub column_count: usize,
    /// Number of feed-forward input synapses per column
    pub input_count: usize,
    /// Number of cells per column
    pub cell_count: usize,

    /// Permanence threshold for a feed-forward synapse to count as connected
    pub input_permanence_threshold: f64,
    /// Positive reinforcement step for feed-forward synapses
    pub input_permanence_inc: f64,
    /// Negative reinforcement step for feed-forward synapses
    pub input_permanence_dec: f64,
    /// Whether overlap requires the permanence threshold (disable to count raw bits)
    pub input_permanence_check: bool,

    /// Minimum raw overlap for a column to score at all
    pub column_stimulus_threshold: u32,
    /// Cap on the boost multiplier
    pub column_max_boost: u32,
    /// Cycle at which boosting starts
    pub column_start_boost: u64,
    /// Window of the activation / overlap moving averages
    pub column_average_window: u64,
    /// Target number of winning columns per cycle (not exact under ties)
    pub region_active_columns: usize,

    /// Cycles a cell remains active once activated
    pub cell_remain_active: u32,
    /// Cycles a cell remains predictive once predicted
    pub cell_remain_predictive: u32,
    /// Cycles a cell remains in the learning state
    pub cell_remain_learning: u32,
    /// Randomize each cell's remain durations in [1, configured] at init
    pub cell_remain_random: bool,

    /// Connection activity needed for a segment to activate
    pub segment_activation_threshold: u32,
    /// Connection activity needed for a segment to qualify for learning
    pub segment_learning_threshold: u32,
    /// Quota of new connections formed per learning update
    pub segment_new_connections: usize,

    /// Horizontal (column) half-width of the new-connection search window
    pub connection_learning_horizontal: usize,
    /// Vertical (cell) half-width of the new-connection search window
    pub connection_learning_vertical: usize,
    /// Permanence threshold for a lateral connection to count as connected
    pub connection_permanence_threshold: f64,
    /// Initial permanence of newly formed connections
    pub connection_initial_permanence: f64,
    /// Positive reinforcement step for lateral connections
    pub connection_permanence_inc: f64,
    /// Negative reinforcement step for lateral connections
    pub connection_permanence_dec: f64,

    /// Cycle interval between forgetting passes; also the staleness horizon
    pub forget_interval: u64,
    /// Burst-to-active ratio above which a cycle is flagged anomalous
    pub detection_threshold: f64,
    /// Prediction-overlap ratio below which the low-overlap signal fires
    pub overlap_threshold: f64,
    /// Master switch for all reinforcement and structural learning
    pub enable_learning: bool,

    /// Number of distinct integers the local encoder can represent
    pub sdr_base: usize,
    /// Number of contiguous set bits per encoded integer
    pub sdr_set: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            column_count: 128,
            input_count: 32,
            cell_count: 4,
            input_permanence_threshold: 0.2,
            input_permanence_inc: 0.05,
            input_permanence_dec: 0.05,
            input_permanence_check: true,
            column_stimulus_threshold: 1,
            column_max_boost: 4,
            column_start_boost: 100,
            column_average_window: 100,
            region_active_columns: 5,
            cell_remain_active: 1,
            cell_remain_predictive: 1,
            cell_remain_learning: 1,
            cell_remain_random: false,
            segment_activation_threshold: 2,
            segment_learning_threshold: 1,
            segment_new_connections: 8,
            connection_learning_horizontal: 16,
            connection_learning_vertical: 4,
            connection_permanence_threshold: 0.2,
            connection_initial_permanence: 0.3,
            connection_permanence_inc: 0.05,
            connection_permanence_dec: 0.05,
            forget_interval: 50,
            detection_threshold: 0.9,
            overlap_threshold: 0.5,
            enable_learning: true,
            sdr_base: 1000,
            sdr_set: 20,
        }
    }
}

impl Params {
    /// Length of the locally encoded input SDR.
    #[inline]
    pub fn input_len(&self) -> usize {
        self.sdr_base + self.sdr_set
    }

    /// Total number of cells in the region.
    #[inline]
    pub fn total_cells(&self) -> usize {
        self.column_count * self.cell_count
    }

    /// Parse a parameter bundle from a JSON string.
    ///
    /// Missing fields fall back to their defaults; the result is validated.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Params = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Read and parse a parameter bundle from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check that the bundle describes a usable region.
    pub fn validate(&self) -> Result<()> {
        if self.column_count == 0 {
            return Err(CorticalError::InvalidParameter(
                "column_count must be > 0".into(),
            ));
        }
        if self.cell_count == 0 {
            return Err(CorticalError::InvalidParameter(
                "cell_count must be > 0".into(),
            ));
        }
        if self.input_count == 0 {
            return Err(CorticalError::InvalidParameter(
                "input_count must be > 0".into(),
            ));
        }
        if self.input_len() == 0 {
            return Err(CorticalError::InvalidParameter(
                "sdr_base + sdr_set must be > 0".into(),
            ));
        }
        if self.region_active_columns == 0 {
            return Err(CorticalError::InvalidParameter(
                "region_active_columns must be > 0".into(),
            ));
        }
        if self.forget_interval == 0 {
            return Err(CorticalError::InvalidParameter(
                "forget_interval must be > 0".into(),
            ));
        }
        if self.column_average_window == 0 {
            return Err(CorticalError::InvalidParameter(
                "column_average_window must be > 0".into(),
            ));
        }
        if self.cell_remain_active == 0
            || self.cell_remain_predictive == 0
            || self.cell_remain_learning == 0
        {
            return Err(CorticalError::InvalidParameter(
                "cell remain durations must be > 0".into(),
            ));
        }
        for (name, v) in [
            ("input_permanence_threshold", self.input_permanence_threshold),
            ("input_permanence_inc", self.input_permanence_inc),
            ("input_permanence_dec", self.input_permanence_dec),
            (
                "connection_permanence_threshold",
                self.connection_permanence_threshold,
            ),
            (
                "connection_initial_permanence",
                self.connection_initial_permanence,
            ),
            ("connection_permanence_inc", self.connection_permanence_inc),
            ("connection_permanence_dec", self.connection_permanence_dec),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(CorticalError::InvalidParameter(format!(
                    "{} must be in [0, 1], got {}",
                    name, v
                )));
            }
        }
        Ok(())
    }
}
