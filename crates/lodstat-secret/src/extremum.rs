//! Minimum search over a lane.

use crate::cell::Cell;
use std::ops::Range;

/// Whether zero values may be picked as the minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zero {
    /// A zero is an acceptable minimum.
    Include,
    /// Skip zero values.
    Exclude,
}

/// Position of the smallest disclosed value among `cells[range]`.
///
/// Suppressed cells are skipped, as are zeros under [`Zero::Exclude`].
/// On ties the first position wins. Positions are absolute, not relative
/// to `range.start`.
pub fn find_extremum<'a, I>(cells: I, range: Range<usize>, zero: Zero) -> Option<usize>
where
    I: IntoIterator<Item = &'a Cell>,
{
    let mut best: Option<(usize, f64)> = None;

    for (position, cell) in cells
        .into_iter()
        .enumerate()
        .skip(range.start)
        .take(range.len())
    {
        let Some(value) = cell.value() else {
            continue;
        };
        if zero == Zero::Exclude && value == 0.0 {
            continue;
        }
        if best.map_or(true, |(_, min)| value < min) {
            best = Some((position, value));
        }
    }

    best.map(|(position, _)| position)
}
