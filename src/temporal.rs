//! Temporal memory: sequence learning over the cells of winning columns.
//!
//! Cells in a winning column activate from their predictive state, or the
//! whole column bursts when nothing predicted it. Dendrite segments learn
//! lateral connections to previously learning cells through two-phase
//! updates: prediction and learning-cell selection schedule [`Update`]s,
//! and the apply pass consumes them with positive or negative
//! reinforcement depending on whether the prediction came true. A periodic
//! forgetting pass removes stale updates, segments and connections.
//!
//! Cross-cell reads never touch live counters: same-cycle algorithms read
//! the previous-cycle snapshot arena and the predict phase reads the
//! current-cycle active snapshot, so the parallel phases stay free of
//! read-write races by construction.

use crate::params::Params;
use crate::region::{Cell, Column, Connection, PrevState, Region, Segment, Update};
use crate::utils::clamp01;
use rand::Rng;

/// Evaluate every segment of a cell against the previous cycle.
///
/// A connection counts when its permanence reaches the threshold and its
/// target was active; it counts toward learning when the target was in the
/// learning state. A segment activates at the activation threshold and is
/// a learning segment when every one of its active connections points to a
/// learning cell.
fn activate_segments(cell: &mut Cell, prev: &[PrevState], cycle: u64, params: &Params) {
    for segment in &mut cell.segments {
        let mut active: u32 = 0;
        let mut learning: u32 = 0;
        for connection in &mut segment.connections {
            if connection.perm >= params.connection_permanence_threshold {
                if prev[connection.target].active > 0 {
                    active += 1;
                    connection.active_cycle = cycle;
                }
                if prev[connection.target].learning > 0 {
                    learning += 1;
                }
            }
        }
        segment.activity = active;
        if active >= params.segment_activation_threshold {
            segment.active = true;
            segment.active_cycle = cycle;
            segment.learning = learning == active;
        } else {
            segment.active = false;
            segment.learning = false;
        }
    }
}

/// The most active currently active segment, optionally restricted to
/// learning segments.
fn best_active_segment(cell: &Cell, learning: bool) -> Option<&Segment> {
    let mut best: Option<&Segment> = None;
    for segment in &cell.segments {
        if segment.active
            && !(learning && !segment.learning)
            && best.map_or(true, |b| segment.activity > b.activity)
        {
            best = Some(segment);
        }
    }
    best
}

/// Collect new-connection candidates around a learning cell and draw a
/// random sample of them into the update.
///
/// Candidates are cells that were learning last cycle inside a window of
/// `connection_learning_horizontal` columns and
/// `connection_learning_vertical` cells around the chosen cell, clamped to
/// the region bounds. The chosen cell itself may qualify.
fn add_new_connections<R: Rng>(
    prev: &[PrevState],
    column_index: usize,
    cell_index: usize,
    column_count: usize,
    cell_count: usize,
    cycle: u64,
    rng: &mut R,
    params: &Params,
    mut count: usize,
    update: &mut Update,
) {
    let column_from = column_index.saturating_sub(params.connection_learning_horizontal);
    let column_to = (column_index + params.connection_learning_horizontal).min(column_count - 1);
    let cell_from = cell_index.saturating_sub(params.connection_learning_vertical);
    let cell_to = (cell_index + params.connection_learning_vertical).min(cell_count - 1);

    let mut candidates = Vec::new();
    for a in column_from..=column_to {
        for b in cell_from..=cell_to {
            let flat = a * cell_count + b;
            if prev[flat].learning > 0 {
                candidates.push(flat);
            }
        }
    }
    while count > 0 && !candidates.is_empty() {
        let i = rng.gen_range(0..candidates.len());
        let target = candidates.swap_remove(i);
        update.added.push(Connection {
            active_cycle: cycle,
            target,
            perm: params.connection_initial_permanence,
        });
        count -= 1;
    }
}

/// Choose the learning cell of a winning column and schedule its update.
///
/// Preference goes to the cell holding the segment with the highest
/// previous-cycle activity at or above the learning threshold; without one
/// the cell with the fewest segments wins, ties broken by coin flip. The
/// chosen cell enters the learning state and receives an update that
/// reinforces the matching segment (if any) and proposes new connections
/// up to the quota left by the segment's already active connections.
fn select_learning_cell<R: Rng>(
    columns: &mut [Column],
    prev: &[PrevState],
    column_index: usize,
    cell_count: usize,
    cycle: u64,
    rng: &mut R,
    params: &Params,
) {
    let column_count = columns.len();
    let column = &mut columns[column_index];

    let mut best: Option<(usize, u64)> = None;
    let mut best_active: u32 = 0;
    let mut smallest: usize = 0;
    let mut smallest_len: usize = 0;
    for (b, cell) in column.cells.iter().enumerate() {
        for segment in &cell.segments {
            let active = segment
                .connections
                .iter()
                .filter(|c| prev[c.target].active > 0)
                .count() as u32;
            if active >= params.segment_learning_threshold && active > best_active {
                best = Some((b, segment.id));
                best_active = active;
            }
        }
        let len = cell.segments.len();
        if b == 0 || len < smallest_len || (len == smallest_len && rng.gen_bool(0.5)) {
            smallest = b;
            smallest_len = len;
        }
    }

    let chosen = best.map_or(smallest, |(b, _)| b);
    let cell = &mut column.cells[chosen];
    cell.learning = cell.remain_learning;

    let mut update = Update {
        cycle,
        segment: None,
        active: Vec::new(),
        inactive: Vec::new(),
        added: Vec::new(),
    };
    if let Some((_, segment_id)) = best {
        if let Some(p) = cell.segment_position(segment_id) {
            let segment = &mut cell.segments[p];
            segment.pending += 1;
            update.segment = Some(segment_id);
            for (k, connection) in segment.connections.iter().enumerate() {
                if prev[connection.target].active > 0 {
                    update.active.push(k);
                } else {
                    update.inactive.push(k);
                }
            }
        }
    }
    let count = params.segment_new_connections.saturating_sub(update.active.len());
    add_new_connections(
        prev,
        column_index,
        chosen,
        column_count,
        cell_count,
        cycle,
        rng,
        params,
        count,
        &mut update,
    );
    column.cells[chosen].updates.push(update);
}

/// Activate the cells of the winning columns.
///
/// A previously predictive cell activates directly and may continue
/// learning through its best active segment; a column with no such cell
/// bursts, activating every cell. Each winning column without a
/// continuing learning cell gets one selected. Runs sequentially: it is
/// the only consumer of the region's RNG during a cycle.
pub(crate) fn activate_region(region: &mut Region, params: &Params) {
    let Region {
        columns,
        prev,
        active_columns,
        bursts,
        cycle,
        rng,
        cell_count,
        ..
    } = region;
    let cycle = *cycle;
    let cell_count = *cell_count;

    for &ci in active_columns.iter() {
        let mut predicted = false;
        let mut chosen = false;
        {
            let column = &mut columns[ci];
            for (b, cell) in column.cells.iter_mut().enumerate() {
                if prev[ci * cell_count + b].predictive > 0 {
                    predicted = true;
                    cell.active = cell.remain_active;
                    activate_segments(cell, prev, cycle, params);
                    let continues = best_active_segment(cell, false)
                        .map_or(false, |s| s.prev_learning);
                    if continues {
                        chosen = true;
                        cell.learning = cell.remain_learning;
                    }
                }
            }
            if !predicted {
                *bursts += 1;
                for cell in &mut column.cells {
                    cell.active = cell.remain_active;
                }
            }
        }
        if !chosen {
            select_learning_cell(columns, prev, ci, cell_count, cycle, rng, params);
        }
    }
}

/// Compute the predictive state of a range of columns from the current
/// cycle's active snapshot.
///
/// A segment whose connected activity reaches the activation threshold
/// makes its cell predictive; with learning enabled it also schedules a
/// reinforcement update recording which connections were active.
pub(crate) fn predict_columns(
    columns: &mut [Column],
    active_now: &[bool],
    cycle: u64,
    params: &Params,
) {
    for column in columns {
        for cell in &mut column.cells {
            let Cell {
                segments,
                updates,
                predictive,
                remain_predictive,
                ..
            } = cell;
            for segment in segments.iter_mut() {
                let active = segment
                    .connections
                    .iter()
                    .filter(|c| {
                        c.perm >= params.connection_permanence_threshold && active_now[c.target]
                    })
                    .count() as u32;
                if active >= params.segment_activation_threshold {
                    *predictive = *remain_predictive;
                    if params.enable_learning {
                        segment.pending += 1;
                        let mut update = Update {
                            cycle,
                            segment: Some(segment.id),
                            active: Vec::new(),
                            inactive: Vec::new(),
                            added: Vec::new(),
                        };
                        for (k, connection) in segment.connections.iter().enumerate() {
                            if active_now[connection.target] {
                                update.active.push(k);
                            } else {
                                update.inactive.push(k);
                            }
                        }
                        updates.push(update);
                    }
                }
            }
        }
    }
}

/// Consume every pending update of a cell.
///
/// Positive reinforcement strengthens the connections recorded as active
/// plus the proposed ones and weakens those recorded as inactive; negative
/// reinforcement only weakens the recorded active connections. Either way
/// the proposed connections are merged into their segment, or a new
/// segment is created when the update targeted none. An update whose
/// segment no longer exists is dropped.
fn adapt_segments(cell: &mut Cell, positive: bool, cycle: u64, params: &Params) {
    let Cell {
        segments,
        updates,
        next_segment_id,
        ..
    } = cell;
    for mut update in updates.drain(..) {
        if positive {
            for connection in &mut update.added {
                connection.perm = clamp01(connection.perm + params.connection_permanence_inc);
            }
        }
        match update.segment {
            Some(id) => {
                let p = match segments.iter().position(|s| s.id == id) {
                    Some(p) => p,
                    None => continue,
                };
                let segment = &mut segments[p];
                segment.pending = segment.pending.saturating_sub(1);
                if positive {
                    for &k in &update.active {
                        if let Some(c) = segment.connections.get_mut(k) {
                            c.perm = clamp01(c.perm + params.connection_permanence_inc);
                        }
                    }
                    for &k in &update.inactive {
                        if let Some(c) = segment.connections.get_mut(k) {
                            c.perm = clamp01(c.perm - params.connection_permanence_dec);
                        }
                    }
                } else {
                    for &k in &update.active {
                        if let Some(c) = segment.connections.get_mut(k) {
                            c.perm = clamp01(c.perm - params.connection_permanence_dec);
                        }
                    }
                }
                segment.connections.append(&mut update.added);
            }
            None => {
                let id = *next_segment_id;
                *next_segment_id += 1;
                segments.push(Segment::new(id, cycle, std::mem::take(&mut update.added)));
            }
        }
    }
}

/// Apply the pending updates of a range of columns.
///
/// A learning cell confirms its updates positively; a cell that predicted
/// its activation exactly one cycle ago and failed to activate pays for
/// the miss negatively. All other cells keep their updates pending.
pub(crate) fn apply_updates_columns(
    columns: &mut [Column],
    column_offset: usize,
    prev: &[PrevState],
    cell_count: usize,
    cycle: u64,
    params: &Params,
) {
    for (i, column) in columns.iter_mut().enumerate() {
        for (b, cell) in column.cells.iter_mut().enumerate() {
            if cell.learning > 0 {
                adapt_segments(cell, true, cycle, params);
            } else if cell.active == 0 && prev[(column_offset + i) * cell_count + b].predictive == 1
            {
                adapt_segments(cell, false, cycle, params);
            }
        }
    }
}

/// Advance a range of columns to the next cycle.
///
/// Snapshots every cell's counters into the previous-cycle arena, decays
/// the live counters toward zero and rolls segment flags into their
/// previous-cycle fields. `prev` is the arena subrange covering exactly
/// these columns.
pub(crate) fn cycle_columns(columns: &mut [Column], prev: &mut [PrevState]) {
    let mut j = 0;
    for column in columns {
        for cell in &mut column.cells {
            prev[j] = PrevState {
                active: cell.active,
                predictive: cell.predictive,
                learning: cell.learning,
            };
            j += 1;
            cell.active = cell.active.saturating_sub(1);
            cell.predictive = cell.predictive.saturating_sub(1);
            cell.learning = cell.learning.saturating_sub(1);
            for segment in &mut cell.segments {
                segment.activity = 0;
                segment.prev_active = segment.active;
                segment.prev_learning = segment.learning;
                segment.active = false;
                segment.learning = false;
            }
        }
    }
}

/// Drop updates older than the staleness horizon from a range of columns,
/// unpinning their segments.
pub(crate) fn forget_updates_columns(columns: &mut [Column], cycle: u64, horizon: u64) {
    for column in columns {
        for cell in &mut column.cells {
            let Cell {
                segments, updates, ..
            } = cell;
            updates.retain(|update| {
                if cycle - update.cycle >= horizon {
                    if let Some(id) = update.segment {
                        if let Some(p) = segments.iter().position(|s| s.id == id) {
                            segments[p].pending = segments[p].pending.saturating_sub(1);
                        }
                    }
                    false
                } else {
                    true
                }
            });
        }
    }
}

/// Remove stale segments and dead connections from a range of columns.
///
/// Segments with pending updates are left untouched entirely. Of the
/// rest, a segment inactive past the horizon is removed with all its
/// connections; a surviving segment sheds connections that are stale or
/// whose permanence has decayed to zero.
pub(crate) fn forget_segments_columns(columns: &mut [Column], cycle: u64, horizon: u64) {
    for column in columns {
        for cell in &mut column.cells {
            cell.segments.retain_mut(|segment| {
                if segment.pending > 0 {
                    return true;
                }
                if cycle - segment.active_cycle >= horizon {
                    return false;
                }
                segment
                    .connections
                    .retain(|c| cycle - c.active_cycle < horizon && c.perm != 0.0);
                true
            });
        }
    }
}

/// Collapse every multi-cycle prediction to a single remaining cycle.
/// Used after an anomaly so stale predictions expire together.
pub(crate) fn reset_prediction(region: &mut Region) {
    for column in &mut region.columns {
        for cell in &mut column.cells {
            if cell.predictive > 0 {
                cell.predictive = 1;
            }
        }
    }
}

/// Ratio of cells predictive both last cycle and this cycle to cells
/// predictive this cycle. NaN when nothing is predicted; stored on the
/// region and returned.
pub(crate) fn overlap_score(region: &mut Region) -> f64 {
    let mut total = 0u32;
    let mut both = 0u32;
    let mut j = 0;
    for column in &region.columns {
        for cell in &column.cells {
            if cell.predictive > 0 {
                total += 1;
                if region.prev[j].predictive > 0 {
                    both += 1;
                }
            }
            j += 1;
        }
    }
    region.overlap = both as f64 / total as f64;
    region.overlap
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params() -> Params {
        let mut p = Params::default();
        p.column_count = 4;
        p.cell_count = 2;
        p.input_count = 2;
        p.sdr_base = 8;
        p.sdr_set = 2;
        p.region_active_columns = 1;
        p.segment_activation_threshold = 1;
        p.segment_learning_threshold = 1;
        p.segment_new_connections = 2;
        p.connection_learning_horizontal = 4;
        p.connection_learning_vertical = 2;
        p
    }

    fn region() -> Region {
        Region::new(&params(), 5).unwrap()
    }

    fn segment_with_targets(id: u64, targets: &[usize], perm: f64) -> Segment {
        Segment::new(
            id,
            0,
            targets
                .iter()
                .map(|&t| Connection {
                    active_cycle: 0,
                    target: t,
                    perm,
                })
                .collect(),
        )
    }

    #[test]
    fn test_unpredicted_column_bursts() {
        let p = params();
        let mut r = region();
        r.active_columns.push(2);
        activate_region(&mut r, &p);
        assert_eq!(r.bursts, 1);
        for cell in &r.columns[2].cells {
            assert!(cell.active > 0);
        }
        // a learning cell was chosen and scheduled an update
        let updates: usize = r.columns[2].cells.iter().map(|c| c.updates.len()).sum();
        assert_eq!(updates, 1);
    }

    #[test]
    fn test_predicted_cell_activates_without_burst() {
        let p = params();
        let mut r = region();
        r.prev[2 * 2].predictive = 1; // column 2, cell 0
        r.active_columns.push(2);
        activate_region(&mut r, &p);
        assert_eq!(r.bursts, 0);
        assert!(r.columns[2].cells[0].active > 0);
        assert_eq!(r.columns[2].cells[1].active, 0);
    }

    #[test]
    fn test_learning_cell_prefers_matching_segment() {
        let p = params();
        let mut r = region();
        // cell 1 of column 0 holds a segment matching the previously
        // active cell at flat index 6
        r.columns[0].cells[1]
            .segments
            .push(segment_with_targets(0, &[6], 0.5));
        r.columns[0].cells[1].next_segment_id = 1;
        r.prev[6].active = 1;
        r.active_columns.push(0);
        activate_region(&mut r, &p);
        let cell = &r.columns[0].cells[1];
        assert!(cell.learning > 0);
        assert_eq!(cell.updates.len(), 1);
        assert_eq!(cell.updates[0].segment, Some(0));
        assert_eq!(cell.updates[0].active, vec![0]);
        assert_eq!(cell.segments[0].pending, 1);
    }

    #[test]
    fn test_learning_cell_fallback_fewest_segments() {
        let p = params();
        let mut r = region();
        // no segment matches; cell 0 has one segment, cell 1 has none
        r.columns[0].cells[0]
            .segments
            .push(segment_with_targets(0, &[7], 0.5));
        r.columns[0].cells[0].next_segment_id = 1;
        r.active_columns.push(0);
        activate_region(&mut r, &p);
        let cell = &r.columns[0].cells[1];
        assert!(cell.learning > 0);
        assert_eq!(cell.updates.len(), 1);
        assert_eq!(cell.updates[0].segment, None);
    }

    #[test]
    fn test_new_connections_target_previous_learning_cells() {
        let p = params();
        let mut r = region();
        r.prev[5].learning = 1;
        r.prev[6].learning = 1;
        r.active_columns.push(1);
        activate_region(&mut r, &p);
        let added: Vec<usize> = r.columns[1]
            .cells
            .iter()
            .flat_map(|c| c.updates.iter())
            .flat_map(|u| u.added.iter().map(|c| c.target))
            .collect();
        assert_eq!(added.len(), 2);
        assert!(added.contains(&5));
        assert!(added.contains(&6));
    }

    #[test]
    fn test_predict_marks_cell_and_schedules_update() {
        let p = params();
        let mut r = region();
        r.columns[3].cells[0]
            .segments
            .push(segment_with_targets(0, &[0, 1], 0.5));
        r.columns[3].cells[0].next_segment_id = 1;
        r.active_now[0] = true;
        let Region {
            columns, active_now, ..
        } = &mut r;
        predict_columns(columns, active_now, 0, &p);
        let cell = &r.columns[3].cells[0];
        assert!(cell.predictive > 0);
        assert_eq!(cell.updates.len(), 1);
        assert_eq!(cell.updates[0].active, vec![0]);
        assert_eq!(cell.updates[0].inactive, vec![1]);
        assert_eq!(cell.segments[0].pending, 1);
    }

    #[test]
    fn test_predict_below_permanence_threshold_ignored() {
        let p = params();
        let mut r = region();
        r.columns[3].cells[0]
            .segments
            .push(segment_with_targets(0, &[0], 0.05));
        r.active_now[0] = true;
        let Region {
            columns, active_now, ..
        } = &mut r;
        predict_columns(columns, active_now, 0, &p);
        assert_eq!(r.columns[3].cells[0].predictive, 0);
    }

    #[test]
    fn test_apply_positive_reinforcement() {
        let p = params();
        let mut r = region();
        let cell = &mut r.columns[0].cells[0];
        cell.segments.push(segment_with_targets(0, &[4, 5], 0.5));
        cell.segments[0].pending = 1;
        cell.next_segment_id = 1;
        cell.learning = 1;
        cell.updates.push(Update {
            cycle: 0,
            segment: Some(0),
            active: vec![0],
            inactive: vec![1],
            added: vec![Connection {
                active_cycle: 0,
                target: 6,
                perm: 0.3,
            }],
        });
        let Region {
            columns, prev, ..
        } = &mut r;
        apply_updates_columns(columns, 0, prev, 2, 0, &p);
        let segment = &r.columns[0].cells[0].segments[0];
        assert_eq!(segment.pending, 0);
        assert_eq!(segment.connections.len(), 3);
        assert!((segment.connections[0].perm - 0.55).abs() < 1e-12);
        assert!((segment.connections[1].perm - 0.45).abs() < 1e-12);
        assert!((segment.connections[2].perm - 0.35).abs() < 1e-12);
        assert!(r.columns[0].cells[0].updates.is_empty());
    }

    #[test]
    fn test_apply_negative_on_failed_prediction() {
        let p = params();
        let mut r = region();
        let cell = &mut r.columns[0].cells[0];
        cell.segments.push(segment_with_targets(0, &[4], 0.5));
        cell.segments[0].pending = 1;
        cell.next_segment_id = 1;
        cell.updates.push(Update {
            cycle: 0,
            segment: Some(0),
            active: vec![0],
            inactive: vec![],
            added: vec![],
        });
        // predicted exactly one cycle ago, now inactive and not learning
        r.prev[0].predictive = 1;
        let Region {
            columns, prev, ..
        } = &mut r;
        apply_updates_columns(columns, 0, prev, 2, 0, &p);
        let segment = &r.columns[0].cells[0].segments[0];
        assert!((segment.connections[0].perm - 0.45).abs() < 1e-12);
        assert_eq!(segment.pending, 0);
    }

    #[test]
    fn test_apply_skips_longer_standing_prediction() {
        let p = params();
        let mut r = region();
        let cell = &mut r.columns[0].cells[0];
        cell.updates.push(Update {
            cycle: 0,
            segment: None,
            active: vec![],
            inactive: vec![],
            added: vec![],
        });
        // a prediction with cycles still remaining is not a miss
        r.prev[0].predictive = 2;
        let Region {
            columns, prev, ..
        } = &mut r;
        apply_updates_columns(columns, 0, prev, 2, 0, &p);
        assert_eq!(r.columns[0].cells[0].updates.len(), 1);
        assert!(r.columns[0].cells[0].segments.is_empty());
    }

    #[test]
    fn test_apply_creates_segment_with_stable_ids() {
        let p = params();
        let mut r = region();
        let cell = &mut r.columns[0].cells[0];
        cell.learning = 1;
        cell.updates.push(Update {
            cycle: 3,
            segment: None,
            active: vec![],
            inactive: vec![],
            added: vec![Connection {
                active_cycle: 3,
                target: 7,
                perm: 0.3,
            }],
        });
        let Region {
            columns, prev, ..
        } = &mut r;
        apply_updates_columns(columns, 0, prev, 2, 3, &p);
        let cell = &r.columns[0].cells[0];
        assert_eq!(cell.segments.len(), 1);
        assert_eq!(cell.segments[0].id, 0);
        assert_eq!(cell.next_segment_id, 1);
        assert_eq!(cell.segments[0].active_cycle, 3);
        assert_eq!(cell.segments[0].connections.len(), 1);
    }

    #[test]
    fn test_cycle_snapshots_and_decays() {
        let mut r = region();
        let cell = &mut r.columns[1].cells[1];
        cell.active = 2;
        cell.predictive = 1;
        cell.segments.push(segment_with_targets(0, &[], 0.5));
        cell.segments[0].active = true;
        cell.segments[0].learning = true;
        cell.segments[0].activity = 3;
        let Region {
            columns, prev, ..
        } = &mut r;
        cycle_columns(columns, prev);
        let cell = &r.columns[1].cells[1];
        assert_eq!(r.prev[3], PrevState { active: 2, predictive: 1, learning: 0 });
        assert_eq!(cell.active, 1);
        assert_eq!(cell.predictive, 0);
        let segment = &cell.segments[0];
        assert!(segment.prev_active && segment.prev_learning);
        assert!(!segment.active && !segment.learning);
        assert_eq!(segment.activity, 0);
    }

    #[test]
    fn test_forget_updates_unpins_segment() {
        let mut r = region();
        let cell = &mut r.columns[0].cells[0];
        cell.segments.push(segment_with_targets(0, &[4], 0.5));
        cell.segments[0].pending = 1;
        cell.updates.push(Update {
            cycle: 0,
            segment: Some(0),
            active: vec![],
            inactive: vec![],
            added: vec![],
        });
        forget_updates_columns(&mut r.columns, 50, 50);
        let cell = &r.columns[0].cells[0];
        assert!(cell.updates.is_empty());
        assert_eq!(cell.segments[0].pending, 0);
    }

    #[test]
    fn test_forget_keeps_fresh_updates() {
        let mut r = region();
        r.columns[0].cells[0].updates.push(Update {
            cycle: 30,
            segment: None,
            active: vec![],
            inactive: vec![],
            added: vec![],
        });
        forget_updates_columns(&mut r.columns, 50, 50);
        assert_eq!(r.columns[0].cells[0].updates.len(), 1);
    }

    #[test]
    fn test_forget_segments_spares_pinned() {
        let mut r = region();
        let cell = &mut r.columns[0].cells[0];
        let mut stale = segment_with_targets(0, &[4], 0.0);
        stale.active_cycle = 0;
        stale.pending = 1;
        cell.segments.push(stale);
        forget_segments_columns(&mut r.columns, 100, 50);
        let cell = &r.columns[0].cells[0];
        // pinned: neither the segment nor its dead connection is touched
        assert_eq!(cell.segments.len(), 1);
        assert_eq!(cell.segments[0].connections.len(), 1);
    }

    #[test]
    fn test_forget_segments_removes_stale_and_dead() {
        let mut r = region();
        let cell = &mut r.columns[0].cells[0];
        let mut stale = segment_with_targets(0, &[4], 0.5);
        stale.active_cycle = 0;
        cell.segments.push(stale);
        let mut fresh = segment_with_targets(1, &[5, 6], 0.5);
        fresh.active_cycle = 90;
        fresh.connections[0].active_cycle = 90;
        fresh.connections[1].active_cycle = 90;
        fresh.connections[1].perm = 0.0;
        cell.segments.push(fresh);
        forget_segments_columns(&mut r.columns, 100, 50);
        let cell = &r.columns[0].cells[0];
        assert_eq!(cell.segments.len(), 1);
        assert_eq!(cell.segments[0].id, 1);
        // the zero-permanence connection was shed
        assert_eq!(cell.segments[0].connections.len(), 1);
        assert_eq!(cell.segments[0].connections[0].target, 5);
    }

    #[test]
    fn test_reset_prediction_collapses_to_one() {
        let mut r = region();
        r.columns[0].cells[0].predictive = 3;
        r.columns[0].cells[1].predictive = 0;
        reset_prediction(&mut r);
        assert_eq!(r.columns[0].cells[0].predictive, 1);
        assert_eq!(r.columns[0].cells[1].predictive, 0);
    }

    #[test]
    fn test_overlap_score() {
        let mut r = region();
        r.columns[0].cells[0].predictive = 1;
        r.columns[0].cells[1].predictive = 1;
        r.prev[0].predictive = 1;
        let score = overlap_score(&mut r);
        assert!((score - 0.5).abs() < 1e-12);
        assert_eq!(r.overlap, score);
    }

    #[test]
    fn test_overlap_score_nan_when_nothing_predicted() {
        let mut r = region();
        assert!(overlap_score(&mut r).is_nan());
    }

    #[test]
    fn test_add_new_connections_respects_quota() {
        let p = params();
        let r = region();
        let mut prev = vec![PrevState::default(); r.total_cells()];
        for s in prev.iter_mut() {
            s.learning = 1;
        }
        let mut rng = StdRng::seed_from_u64(1);
        let mut update = Update {
            cycle: 0,
            segment: None,
            active: Vec::new(),
            inactive: Vec::new(),
            added: Vec::new(),
        };
        add_new_connections(&prev, 1, 0, 4, 2, 0, &mut rng, &p, 2, &mut update);
        assert_eq!(update.added.len(), 2);
        let mut targets: Vec<usize> = update.added.iter().map(|c| c.target).collect();
        targets.sort_unstable();
        targets.dedup();
        assert_eq!(targets.len(), 2);
    }
}
