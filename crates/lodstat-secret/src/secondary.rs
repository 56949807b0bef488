//! Secondary suppression.
//!
//! A lane holding exactly one withheld cell leaks it: the margin minus the
//! disclosed cells gives it back. Each pass gives such lanes a second
//! withheld cell, the smallest disclosed one. Because a new cell in a row
//! can leave its column with a single withheld cell, passes alternate
//! between orientations until neither adds anything.

use crate::cell::{Axis, Reason};
use crate::extremum::{find_extremum, Zero};
use crate::table::Table;

/// Lanes this short (data cells plus margin) have no safe second cell.
const EXEMPT_LANE_LEN: usize = 3;

/// Outcome of running secondary suppression to its fixed point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Convergence {
    /// Row-pass/column-pass rounds run, including the final quiet one.
    pub iterations: usize,
    /// Cells withheld across all rounds.
    pub suppressed: usize,
}

/// Enforces the at-least-two rule on every lane.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecondarySuppressor;

impl SecondarySuppressor {
    /// Whether lanes along `axis` are too short for secondary suppression.
    #[must_use]
    pub fn is_exempt(table: &Table, axis: Axis) -> bool {
        // lane_len excludes the margin
        table.lane_len(axis) < EXEMPT_LANE_LEN
    }

    /// One pass over every data lane along `axis`. Returns the number of
    /// cells withheld by this pass.
    pub fn pass(table: &mut Table, axis: Axis) -> usize {
        if Self::is_exempt(table, axis) {
            return 0;
        }

        let mut suppressed = 0;
        for lane in 0..table.lane_count(axis) {
            suppressed += Self::complete_lane(table, axis, lane);
        }
        suppressed
    }

    fn complete_lane(table: &mut Table, axis: Axis, lane: usize) -> usize {
        let (first, len) = {
            let view = table.lane(axis, lane);
            if view.suppressed_count() != 1 {
                return 0;
            }
            (
                find_extremum(view.cells(), 0..view.len(), Zero::Include),
                view.len(),
            )
        };

        let Some(position) = first else {
            return 0;
        };
        let value = table.lane(axis, lane).get(position).original();
        if !table.suppress(axis, lane, position, Reason::Secondary, None) {
            return 0;
        }

        // A withheld zero protects nothing on its own
        if value != 0.0 {
            return 1;
        }
        let next = find_extremum(table.lane(axis, lane).cells(), 0..len, Zero::Exclude);
        match next {
            Some(position) if table.suppress(axis, lane, position, Reason::Secondary, None) => 2,
            _ => 1,
        }
    }

    /// Row pass then column pass, repeated until a round withholds nothing.
    pub fn converge(table: &mut Table) -> Convergence {
        let mut outcome = Convergence::default();
        loop {
            outcome.iterations += 1;
            let rows = Self::pass(table, Axis::Row);
            let columns = Self::pass(table, Axis::Column);
            tracing::debug!(
                "Secondary round {}: {} by row, {} by column",
                outcome.iterations,
                rows,
                columns
            );
            outcome.suppressed += rows + columns;
            if rows + columns == 0 {
                return outcome;
            }
        }
    }
}
