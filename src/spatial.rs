//! Spatial pooling: feed-forward pattern detection over columns.
//!
//! Each cycle the columns compute their overlap with the input SDR in
//! parallel, a sequential pass selects roughly `region_active_columns`
//! winners with a rank-based threshold, and (when learning) the winners'
//! feed-forward synapses are reinforced. Moving averages of activation and
//! overlap rates drive a boosting mechanism that keeps starved columns
//! competitive.

use crate::params::Params;
use crate::region::{Column, InputSynapse, Region};
use crate::sdr::Sdr;
use crate::utils::clamp01;
use itertools::Itertools;
use rand::Rng;

/// Build one column's feed-forward synapses.
///
/// Picks a random center bit and connects to `input_count` distinct random
/// bits (falling back to repeats once the input space is exhausted).
/// Initial permanences sit just below the connection threshold with a small
/// random jitter plus a bias favoring bits near the center, so columns
/// start weakly tuned to a neighborhood of the input space.
pub(crate) fn init_inputs<R: Rng>(
    input_len: usize,
    params: &Params,
    rng: &mut R,
) -> (usize, Vec<InputSynapse>) {
    let center = rng.gen_range(0..input_len);
    let mut used = vec![false; input_len];
    let mut available = input_len;
    let mut inputs = Vec::with_capacity(params.input_count);
    for _ in 0..params.input_count {
        let mut picked = None;
        while available > 0 {
            let i = rng.gen_range(0..input_len);
            if !used[i] {
                used[i] = true;
                available -= 1;
                picked = Some(i);
                break;
            }
        }
        let bit = match picked {
            Some(i) => i,
            None => rng.gen_range(0..input_len),
        };
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let jitter = sign * rng.gen_range(1..=100) as f64 / 1000.0;
        let distance = center.abs_diff(bit) as f64;
        let bias = 0.1 - 0.1 * distance / input_len as f64;
        let perm = clamp01(params.input_permanence_threshold - 0.15 + jitter + bias);
        inputs.push(InputSynapse {
            bit,
            active: false,
            perm,
        });
    }
    (center, inputs)
}

/// Compute the boosted overlap of a range of columns with the input SDR.
///
/// A synapse is active when its input bit is set and (if the permanence
/// check is enabled) its permanence reaches the threshold. A raw overlap
/// below the stimulus threshold scores 0; otherwise the score is the raw
/// overlap times the column's boost.
pub(crate) fn overlap_columns(columns: &mut [Column], sdr: &Sdr, params: &Params) {
    for column in columns {
        let mut raw: u32 = 0;
        for input in &mut column.inputs {
            input.active = if params.input_permanence_check {
                input.perm >= params.input_permanence_threshold && sdr.get(input.bit)
            } else {
                sdr.get(input.bit)
            };
            raw += input.active as u32;
        }
        column.overlap = if raw >= params.column_stimulus_threshold {
            raw * column.boost
        } else {
            0
        };
    }
}

/// Rank-based winner threshold: the smallest overlap value such that the
/// columns scoring at least that value number `region_active_columns` or
/// more. Tied columns are all admitted, so the winner count can exceed the
/// target but never splits a tie group.
fn activation_threshold(columns: &[Column], target: usize) -> u32 {
    let sorted: Vec<u32> = columns
        .iter()
        .map(|c| c.overlap)
        .sorted_unstable()
        .collect();
    let mut val = sorted[sorted.len() - 1];
    let mut count = 0usize;
    for &v in sorted.iter().rev() {
        if v != val {
            if count >= target {
                break;
            }
            val = v;
        }
        count += 1;
    }
    val
}

/// Select the winning columns of this cycle.
///
/// A column wins when its overlap is nonzero and reaches the rank
/// threshold; winners are recorded in `region.active_columns`.
pub(crate) fn activate_region(region: &mut Region, params: &Params) {
    let val = activation_threshold(&region.columns, params.region_active_columns);
    for (i, column) in region.columns.iter_mut().enumerate() {
        column.active = column.overlap > 0 && column.overlap >= val;
        if column.active {
            region.active_columns.push(i);
        }
    }
}

/// Reinforce the winning columns: active synapses gain permanence,
/// inactive ones lose it, both clamped to [0, 1].
pub(crate) fn reinforce_region(region: &mut Region, params: &Params) {
    for &ci in &region.active_columns {
        for input in &mut region.columns[ci].inputs {
            if input.active {
                input.perm = clamp01(input.perm + params.input_permanence_inc);
            } else {
                input.perm = clamp01(input.perm - params.input_permanence_dec);
            }
        }
    }
}

/// Update every column's moving averages and the region-wide maximum
/// activation rate.
///
/// The effective window grows with the cycle count until it reaches the
/// configured window, and is floored at 1 so the first cycle contributes a
/// full-weight sample instead of dividing by zero.
pub(crate) fn region_averages(region: &mut Region, params: &Params) {
    let window = region.cycle.min(params.column_average_window).max(1) as f64;
    let mut max = 0.0f64;
    for column in &mut region.columns {
        column.avg_active -= column.avg_active / window;
        if column.active {
            column.avg_active += 1.0 / window;
        }
        column.avg_overlap -= column.avg_overlap / window;
        if column.overlap > 0 {
            column.avg_overlap += 1.0 / window;
        }
        if column.avg_active > max {
            max = column.avg_active;
        }
    }
    region.average_max = max;
}

/// Boost a range of starved columns.
///
/// A column far below the region's best activation rate has its boost
/// multiplier incremented up to the cap; a healthy column drops back to 1.
/// A column whose overlap rate is starved additionally has all feed-forward
/// permanences nudged up toward the connection threshold.
pub(crate) fn boost_columns(columns: &mut [Column], average_max: f64, params: &Params) {
    for column in columns {
        if column.avg_active < 0.01 * average_max {
            column.boost = (column.boost + 1).min(params.column_max_boost);
        } else {
            column.boost = 1;
        }
        if column.avg_overlap < 0.01 * average_max {
            for input in &mut column.inputs {
                input.perm = clamp01(input.perm + 0.1 * params.input_permanence_threshold);
            }
        }
    }
}
