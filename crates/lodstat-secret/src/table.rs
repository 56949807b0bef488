//! Pivoted table with margins and axis-agnostic lane views.
//!
//! Cells live in a single row-major grid of `(rows + 1) x (columns + 1)`
//! entries. The last row holds column totals, the last column holds row
//! totals and the bottom-right cell is the grand total. Suppression passes
//! never address the grid directly: they walk [`Lane`]s along an [`Axis`],
//! so each pass is written once and run in both orientations.

use crate::cell::{Axis, Cell, Reason};
use lodstat_core::DimensionKey;

/// A cross-tabulated table with a total row and a total column.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    row_dimensions: Vec<String>,
    column_dimensions: Vec<String>,
    measure: String,
    row_labels: Vec<DimensionKey>,
    column_labels: Vec<DimensionKey>,
    cells: Vec<Cell>,
}

impl Table {
    /// Build a table from data values and append the margins.
    ///
    /// `values` holds one vector per row label, each with one value per
    /// column label.
    #[must_use]
    pub fn new(
        row_dimensions: Vec<String>,
        column_dimensions: Vec<String>,
        measure: String,
        row_labels: Vec<DimensionKey>,
        column_labels: Vec<DimensionKey>,
        values: &[Vec<f64>],
    ) -> Self {
        let rows = row_labels.len();
        let columns = column_labels.len();
        let width = columns + 1;
        let mut grid = vec![0.0_f64; (rows + 1) * width];

        for (r, row) in values.iter().take(rows).enumerate() {
            for (c, value) in row.iter().take(columns).enumerate() {
                grid[r * width + c] = *value;
                grid[r * width + columns] += *value;
                grid[rows * width + c] += *value;
                grid[rows * width + columns] += *value;
            }
        }

        Self {
            row_dimensions,
            column_dimensions,
            measure,
            row_labels,
            column_labels,
            cells: grid.into_iter().map(Cell::Value).collect(),
        }
    }

    /// Number of data rows (margin excluded).
    #[must_use]
    pub fn data_rows(&self) -> usize {
        self.row_labels.len()
    }

    /// Number of data columns (margin excluded).
    #[must_use]
    pub fn data_columns(&self) -> usize {
        self.column_labels.len()
    }

    /// Names of the dimensions laid out down the rows.
    #[must_use]
    pub fn row_dimensions(&self) -> &[String] {
        &self.row_dimensions
    }

    /// Names of the dimensions laid out across the columns.
    #[must_use]
    pub fn column_dimensions(&self) -> &[String] {
        &self.column_dimensions
    }

    /// Name of the aggregated measure.
    #[must_use]
    pub fn measure(&self) -> &str {
        &self.measure
    }

    /// Labels of the data rows.
    #[must_use]
    pub fn row_labels(&self) -> &[DimensionKey] {
        &self.row_labels
    }

    /// Labels of the data columns.
    #[must_use]
    pub fn column_labels(&self) -> &[DimensionKey] {
        &self.column_labels
    }

    /// Cell at grid coordinates. `row == data_rows()` addresses the total
    /// row and `column == data_columns()` the total column.
    ///
    /// # Panics
    /// Panics if the coordinates fall outside the grid.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        assert!(row <= self.data_rows() && column <= self.data_columns());
        &self.cells[row * (self.data_columns() + 1) + column]
    }

    /// The bottom-right cell.
    #[must_use]
    pub fn grand_total(&self) -> f64 {
        self.cell(self.data_rows(), self.data_columns()).original()
    }

    /// Number of data lanes along `axis`.
    #[must_use]
    pub fn lane_count(&self, axis: Axis) -> usize {
        match axis {
            Axis::Row => self.data_rows(),
            Axis::Column => self.data_columns(),
        }
    }

    /// Number of data cells in each lane along `axis`.
    #[must_use]
    pub fn lane_len(&self, axis: Axis) -> usize {
        self.lane_count(axis.transposed())
    }

    /// View of one data lane.
    ///
    /// # Panics
    /// Panics if `index` is not a data lane.
    #[must_use]
    pub fn lane(&self, axis: Axis, index: usize) -> Lane<'_> {
        assert!(index < self.lane_count(axis), "lane {index} out of range");
        Lane {
            table: self,
            axis,
            index,
        }
    }

    /// All data lanes along `axis`, margin lane excluded.
    pub fn lanes(&self, axis: Axis) -> impl Iterator<Item = Lane<'_>> + '_ {
        (0..self.lane_count(axis)).map(move |index| self.lane(axis, index))
    }

    /// Data rows.
    pub fn rows(&self) -> impl Iterator<Item = Lane<'_>> + '_ {
        self.lanes(Axis::Row)
    }

    /// Data columns.
    pub fn columns(&self) -> impl Iterator<Item = Lane<'_>> + '_ {
        self.lanes(Axis::Column)
    }

    fn grid_index(&self, axis: Axis, lane: usize, position: usize) -> usize {
        let width = self.data_columns() + 1;
        match axis {
            Axis::Row => lane * width + position,
            Axis::Column => position * width + lane,
        }
    }

    /// Withhold the data cell at `position` of `lane`.
    ///
    /// Returns `false` without touching anything when the cell is already
    /// suppressed or when `position` addresses the margin.
    pub fn suppress(
        &mut self,
        axis: Axis,
        lane: usize,
        position: usize,
        reason: Reason,
        note: Option<String>,
    ) -> bool {
        if lane >= self.lane_count(axis) || position >= self.lane_len(axis) {
            return false;
        }

        let index = self.grid_index(axis, lane, position);
        match self.cells[index] {
            Cell::Value(original) => {
                self.cells[index] = Cell::Suppressed {
                    original,
                    reason,
                    axis,
                    note,
                };
                true
            }
            Cell::Suppressed { .. } => false,
        }
    }

    /// Number of suppressed cells in the whole grid.
    #[must_use]
    pub fn suppressed_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_suppressed()).count()
    }

    /// Coordinates of the suppressed data cells in row-major order.
    #[must_use]
    pub fn suppressed_cells(&self) -> Vec<(usize, usize)> {
        self.rows()
            .flat_map(|lane| {
                let row = lane.index();
                lane.cells()
                    .enumerate()
                    .filter(|(_, cell)| cell.is_suppressed())
                    .map(move |(column, _)| (row, column))
            })
            .collect()
    }
}

/// One data row or data column of a [`Table`].
#[derive(Debug, Clone, Copy)]
pub struct Lane<'a> {
    table: &'a Table,
    axis: Axis,
    index: usize,
}

impl<'a> Lane<'a> {
    /// Orientation of this lane.
    #[must_use]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Position of this lane among the data lanes.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of data cells, margin excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lane_len(self.axis)
    }

    /// Whether the lane has no data cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Data cell at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> &'a Cell {
        &self.table.cells[self.table.grid_index(self.axis, self.index, position)]
    }

    /// Data cells in order, margin excluded.
    pub fn cells(&self) -> impl Iterator<Item = &'a Cell> + 'a {
        let lane = *self;
        (0..lane.len()).map(move |position| lane.get(position))
    }

    /// The margin total governing this lane.
    #[must_use]
    pub fn margin(&self) -> f64 {
        self.table
            .cells[self.table.grid_index(self.axis, self.index, self.len())]
            .original()
    }

    /// Label of this lane.
    #[must_use]
    pub fn label(&self) -> &'a DimensionKey {
        match self.axis {
            Axis::Row => &self.table.row_labels[self.index],
            Axis::Column => &self.table.column_labels[self.index],
        }
    }

    /// Number of suppressed data cells.
    #[must_use]
    pub fn suppressed_count(&self) -> usize {
        self.cells().filter(|c| c.is_suppressed()).count()
    }
}

/// Which margins survive into the published table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    /// Publish the column-total row.
    pub total_row: bool,
    /// Publish the row-total column.
    pub total_column: bool,
}

impl Margins {
    /// Publish both margins.
    #[must_use]
    pub fn all() -> Self {
        Self {
            total_row: true,
            total_column: true,
        }
    }

    /// Publish no margin.
    #[must_use]
    pub fn none() -> Self {
        Self {
            total_row: false,
            total_column: false,
        }
    }

    /// Drop a margin that would only repeat a single data lane.
    #[must_use]
    pub fn collapsed(table: &Table) -> Self {
        Self {
            total_row: table.data_rows() > 1,
            total_column: table.data_columns() > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(label: &str) -> DimensionKey {
        DimensionKey::new(vec![label.to_string()])
    }

    fn sample() -> Table {
        Table::new(
            vec!["comune".to_string()],
            vec!["sesso".to_string()],
            "residenti".to_string(),
            vec![key("A"), key("B"), key("C")],
            vec![key("X"), key("Y")],
            &[vec![1.0, 5.0], vec![2.0, 2.0], vec![10.0, 10.0]],
        )
    }

    #[test]
    fn test_margins_are_sums() {
        let table = sample();
        let row_totals: Vec<f64> = table.rows().map(|lane| lane.margin()).collect();
        let column_totals: Vec<f64> = table.columns().map(|lane| lane.margin()).collect();
        assert_eq!(row_totals, vec![6.0, 4.0, 20.0]);
        assert_eq!(column_totals, vec![13.0, 17.0]);
        assert!((table.grand_total() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_lane_views_share_storage() {
        let mut table = sample();
        assert!(table.suppress(Axis::Column, 1, 0, Reason::Primary, None));

        // Column 1, position 0 is row 0, position 1
        assert!(table.lane(Axis::Row, 0).get(1).is_suppressed());
        assert_eq!(table.lane(Axis::Row, 0).suppressed_count(), 1);
        assert_eq!(table.lane(Axis::Column, 1).suppressed_count(), 1);
        assert_eq!(table.suppressed_count(), 1);
        assert_eq!(table.suppressed_cells(), vec![(0, 1)]);
    }

    #[test]
    fn test_suppress_refuses_margin_and_repeats() {
        let mut table = sample();
        // Position 2 on a row is the row-total column
        assert!(!table.suppress(Axis::Row, 0, 2, Reason::Primary, None));
        // Lane 3 on rows is the total row
        assert!(!table.suppress(Axis::Row, 3, 0, Reason::Primary, None));

        assert!(table.suppress(Axis::Row, 0, 0, Reason::Primary, None));
        assert!(!table.suppress(Axis::Row, 0, 0, Reason::Secondary, None));
        assert_eq!(table.cell(0, 0).reason(), Some(Reason::Primary));
    }

    #[test]
    fn test_lane_lengths() {
        let table = sample();
        assert_eq!(table.lane_count(Axis::Row), 3);
        assert_eq!(table.lane_len(Axis::Row), 2);
        assert_eq!(table.lane_count(Axis::Column), 2);
        assert_eq!(table.lane_len(Axis::Column), 3);
        assert_eq!(table.lane(Axis::Column, 1).label(), &key("Y"));
    }

    #[test]
    fn test_collapsed_margins() {
        let single_column = Table::new(
            vec!["comune".to_string()],
            vec!["anno".to_string()],
            "residenti".to_string(),
            vec![key("A"), key("B")],
            vec![key("2014")],
            &[vec![4.0], vec![6.0]],
        );
        let margins = Margins::collapsed(&single_column);
        assert!(margins.total_row);
        assert!(!margins.total_column);

        assert_eq!(Margins::collapsed(&sample()), Margins::all());
    }
}
