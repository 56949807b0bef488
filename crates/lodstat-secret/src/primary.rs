//! Primary suppression.
//!
//! Two interchangeable strategies sweep the data cells lane by lane. The
//! simple-threshold strategy withholds every small non-zero value. The
//! marginality-aware strategy also weighs the lane minimum against the lane
//! margin, and withholds any cell that alone makes up its margin.

use crate::cell::{Axis, Reason};
use crate::extremum::{find_extremum, Zero};
use crate::table::Table;

/// Disclosure-risk factor applied to `marginality - 1`.
const MARGINALITY_FACTOR: f64 = 3.0;

/// How primary suppression decides which cells are disclosive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryStrategy {
    /// Withhold every cell with `0 < value < threshold`.
    SimpleThreshold,
    /// Withhold using the lane margin and minimum as well as the threshold.
    MarginalityAware,
}

impl PrimaryStrategy {
    /// Marginality-aware when more than one rule applies to a pivot.
    #[must_use]
    pub fn select(rule_cardinality: usize, pivoted: bool) -> Self {
        if pivoted && rule_cardinality > 1 {
            Self::MarginalityAware
        } else {
            Self::SimpleThreshold
        }
    }
}

/// Whether a value is small enough to be withheld on its own.
#[must_use]
pub fn under_threshold(value: f64, threshold: f64) -> bool {
    0.0 < value && value < threshold
}

/// Runs one primary strategy over a table.
#[derive(Debug, Clone, Copy)]
pub struct PrimarySuppressor {
    strategy: PrimaryStrategy,
    threshold: f64,
}

impl PrimarySuppressor {
    /// Create a suppressor for `strategy` at `threshold`.
    #[must_use]
    pub fn new(strategy: PrimaryStrategy, threshold: f64) -> Self {
        Self {
            strategy,
            threshold,
        }
    }

    /// The strategy in use.
    #[must_use]
    pub fn strategy(&self) -> PrimaryStrategy {
        self.strategy
    }

    /// Sweep every data lane along `axis`. Returns the number of cells
    /// suppressed.
    pub fn sweep(&self, table: &mut Table, axis: Axis) -> usize {
        let mut suppressed = 0;
        for lane in 0..table.lane_count(axis) {
            let targets = match self.strategy {
                PrimaryStrategy::SimpleThreshold => self.threshold_targets(table, axis, lane),
                PrimaryStrategy::MarginalityAware => self.marginality_targets(table, axis, lane),
            };
            for position in targets {
                if table.suppress(axis, lane, position, Reason::Primary, None) {
                    suppressed += 1;
                }
            }
        }
        tracing::debug!(
            "Primary {:?} sweep over {:?} lanes suppressed {} cells",
            self.strategy,
            axis,
            suppressed
        );
        suppressed
    }

    /// Row sweep then column sweep. Either may be skipped, e.g. when lanes
    /// in that orientation run across reference periods.
    pub fn apply(&self, table: &mut Table, rows: bool, columns: bool) -> usize {
        let mut suppressed = 0;
        if rows {
            suppressed += self.sweep(table, Axis::Row);
        }
        if columns {
            suppressed += self.sweep(table, Axis::Column);
        }
        suppressed
    }

    fn threshold_targets(&self, table: &Table, axis: Axis, lane: usize) -> Vec<usize> {
        table
            .lane(axis, lane)
            .cells()
            .enumerate()
            .filter_map(|(position, cell)| {
                cell.value()
                    .filter(|v| under_threshold(*v, self.threshold))
                    .map(|_| position)
            })
            .collect()
    }

    fn marginality_targets(&self, table: &Table, axis: Axis, lane: usize) -> Vec<usize> {
        let view = table.lane(axis, lane);
        let marginality = view.margin();
        let min = lane_minimum(table, axis, lane);

        view.cells()
            .enumerate()
            .filter_map(|(position, cell)| {
                let value = cell.value()?;
                let alone = marginality > 0.0 && value == marginality;
                let risky = under_threshold(value, self.threshold)
                    && (min <= (marginality - 1.0) * MARGINALITY_FACTOR || min == marginality);
                (alone || risky).then_some(position)
            })
            .collect()
    }
}

/// Smallest disclosed value of a lane, looking past a zero minimum.
fn lane_minimum(table: &Table, axis: Axis, lane: usize) -> f64 {
    let view = table.lane(axis, lane);
    let range = 0..view.len();
    let value_at = |position: usize| view.get(position).original();

    match find_extremum(view.cells(), range.clone(), Zero::Include).map(value_at) {
        Some(min) if min == 0.0 => find_extremum(view.cells(), range, Zero::Exclude)
            .map(value_at)
            .unwrap_or(0.0),
        Some(min) => min,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodstat_core::DimensionKey;

    fn keys(labels: &[&str]) -> Vec<DimensionKey> {
        labels
            .iter()
            .map(|l| DimensionKey::new(vec![(*l).to_string()]))
            .collect()
    }

    fn table(values: &[Vec<f64>]) -> Table {
        let rows: Vec<String> = (0..values.len()).map(|r| format!("r{r}")).collect();
        let columns: Vec<String> = (0..values[0].len()).map(|c| format!("c{c}")).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
        Table::new(
            vec!["row".to_string()],
            vec!["column".to_string()],
            "value".to_string(),
            keys(&rows),
            keys(&columns),
            values,
        )
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(
            PrimaryStrategy::select(1, true),
            PrimaryStrategy::SimpleThreshold
        );
        assert_eq!(
            PrimaryStrategy::select(2, true),
            PrimaryStrategy::MarginalityAware
        );
        assert_eq!(
            PrimaryStrategy::select(3, false),
            PrimaryStrategy::SimpleThreshold
        );
    }

    #[test]
    fn test_simple_threshold() {
        let mut t = table(&[vec![1.0, 5.0], vec![2.0, 2.0], vec![10.0, 10.0]]);
        let suppressor = PrimarySuppressor::new(PrimaryStrategy::SimpleThreshold, 3.0);
        let count = suppressor.apply(&mut t, true, true);

        assert_eq!(count, 3);
        assert!(t.cell(0, 0).is_suppressed());
        assert!(t.cell(1, 0).is_suppressed());
        assert!(t.cell(1, 1).is_suppressed());
        assert!(!t.cell(0, 1).is_suppressed());
    }

    #[test]
    fn test_simple_threshold_respected() {
        let mut t = table(&[vec![0.0, 3.0, 2.9], vec![7.0, 0.5, 0.0]]);
        PrimarySuppressor::new(PrimaryStrategy::SimpleThreshold, 3.0).apply(&mut t, true, true);

        for lane in t.rows() {
            for cell in lane.cells() {
                if let Some(v) = cell.value() {
                    assert!(v == 0.0 || v >= 3.0, "disclosed {v} under threshold");
                }
            }
        }
        assert!(!t.cell(0, 0).is_suppressed());
        assert!(t.cell(0, 2).is_suppressed());
    }

    #[test]
    fn test_margins_never_suppressed() {
        let mut t = table(&[vec![1.0, 1.0], vec![1.0, 1.0]]);
        PrimarySuppressor::new(PrimaryStrategy::MarginalityAware, 3.0).apply(&mut t, true, true);

        for r in 0..=t.data_rows() {
            assert!(!t.cell(r, t.data_columns()).is_suppressed());
        }
        for c in 0..=t.data_columns() {
            assert!(!t.cell(t.data_rows(), c).is_suppressed());
        }
    }

    #[test]
    fn test_marginality_cell_equal_to_margin() {
        // Row 0 is all in one cell: value 20 equals the row margin
        let mut t = table(&[vec![20.0, 0.0], vec![15.0, 30.0]]);
        let suppressor = PrimarySuppressor::new(PrimaryStrategy::MarginalityAware, 3.0);
        suppressor.sweep(&mut t, Axis::Row);

        assert!(t.cell(0, 0).is_suppressed());
        assert!(!t.cell(0, 1).is_suppressed());
        assert!(!t.cell(1, 0).is_suppressed());
    }

    #[test]
    fn test_marginality_small_value_with_small_margin() {
        // Row margin 3, min (excluding the zero) 1 <= (3 - 1) * 3
        let mut t = table(&[vec![1.0, 2.0, 0.0], vec![40.0, 50.0, 60.0]]);
        let suppressor = PrimarySuppressor::new(PrimaryStrategy::MarginalityAware, 3.0);
        let count = suppressor.sweep(&mut t, Axis::Row);

        assert_eq!(count, 2);
        assert!(t.cell(0, 0).is_suppressed());
        assert!(t.cell(0, 1).is_suppressed());
        assert!(!t.cell(0, 2).is_suppressed());
    }

    #[test]
    fn test_marginality_zero_row_untouched() {
        let mut t = table(&[vec![0.0, 0.0], vec![4.0, 9.0]]);
        let suppressor = PrimarySuppressor::new(PrimaryStrategy::MarginalityAware, 3.0);
        assert_eq!(suppressor.sweep(&mut t, Axis::Row), 0);

        // Down the columns each non-zero value is its column's whole margin
        assert_eq!(suppressor.sweep(&mut t, Axis::Column), 2);
        assert!(!t.cell(0, 0).is_suppressed());
    }

    #[test]
    fn test_lane_minimum_skips_zero() {
        let t = table(&[vec![0.0, 4.0, 2.0]]);
        assert!((lane_minimum(&t, Axis::Row, 0) - 2.0).abs() < f64::EPSILON);

        let all_zero = table(&[vec![0.0, 0.0]]);
        assert!(lane_minimum(&all_zero, Axis::Row, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_skipped_orientation() {
        let mut t = table(&[vec![1.0, 5.0], vec![6.0, 7.0]]);
        let suppressor = PrimarySuppressor::new(PrimaryStrategy::SimpleThreshold, 3.0);
        assert_eq!(suppressor.apply(&mut t, false, false), 0);
        assert_eq!(suppressor.apply(&mut t, false, true), 1);
        assert_eq!(t.cell(0, 0).reason(), Some(Reason::Primary));
    }
}
