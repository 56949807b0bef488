//! Display strings for a protected table.

use crate::builder::ResultSet;
use crate::cell::{Axis, Cell, Reason};
use crate::table::{Margins, Table};
use lodstat_core::{ClassRange, SecretConfig};
use serde::{Deserialize, Serialize};

/// Largest magnitude printed as an integer.
const INTEGRAL_LIMIT: f64 = 1e15;

/// How suppressed cells and margins are displayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Annotate suppressed cells with their original value and reason.
    pub debug: bool,
    /// Publish constraint-suppressed cells as class ranges.
    pub ranges: bool,
    /// Classes used when `ranges` is set.
    pub class_ranges: Vec<ClassRange>,
    /// Marker shown in place of a suppressed value.
    pub marker: String,
    /// Label of the margin row and column.
    pub total_label: String,
    /// Header of the column naming the measure of each band.
    pub measure_label: String,
}

impl RenderOptions {
    /// Options from the `[secret]` configuration section.
    #[must_use]
    pub fn from_config(config: &SecretConfig) -> Self {
        Self {
            debug: config.debug,
            ranges: false,
            class_ranges: config.class_ranges.clone(),
            marker: config.marker.clone(),
            total_label: config.total_label.clone(),
            measure_label: "Measure".to_string(),
        }
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from_config(&SecretConfig::default())
    }
}

/// A table as strings: one header row and the body rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedTable {
    /// Row dimension names, column labels, then the total label if shown.
    pub headers: Vec<String>,
    /// Row labels followed by cell strings.
    pub rows: Vec<Vec<String>>,
    /// Number of leading label columns in every row.
    pub labels: usize,
}

/// Format a number, dropping the fraction of integral values.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < INTEGRAL_LIMIT {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Render `table`, publishing only the margins in `margins`.
#[must_use]
pub fn render_table(table: &Table, margins: Margins, options: &RenderOptions) -> RenderedTable {
    let labels = table.row_dimensions().len();
    RenderedTable {
        headers: header_row(table, margins, options),
        rows: band_rows(table, margins, options, None),
        labels,
    }
}

/// Render measure bands stacked one under the other.
///
/// With several bands a column naming the measure follows the row labels,
/// and each band carries its own total row.
#[must_use]
pub fn render_bands(bands: &[Table], margins: Margins, options: &RenderOptions) -> RenderedTable {
    match bands {
        [] => RenderedTable {
            headers: Vec::new(),
            rows: Vec::new(),
            labels: 0,
        },
        [table] => render_table(table, margins, options),
        [first, ..] => {
            let dims = first.row_dimensions().len();
            let mut headers = header_row(first, margins, options);
            headers.insert(dims, options.measure_label.clone());
            RenderedTable {
                headers,
                rows: bands
                    .iter()
                    .flat_map(|band| band_rows(band, margins, options, Some(band.measure())))
                    .collect(),
                labels: dims + 1,
            }
        }
    }
}

/// Render an untouched result set, every column as received.
#[must_use]
pub fn render_listing(result: &ResultSet) -> RenderedTable {
    RenderedTable {
        headers: result.headers.clone(),
        rows: result
            .rows
            .iter()
            .map(|row| row.iter().map(lodstat_core::Scalar::to_label).collect())
            .collect(),
        labels: result.headers.len(),
    }
}

fn header_row(table: &Table, margins: Margins, options: &RenderOptions) -> Vec<String> {
    let mut headers: Vec<String> = table.row_dimensions().to_vec();
    headers.extend(table.column_labels().iter().map(ToString::to_string));
    if margins.total_column {
        headers.push(options.total_label.clone());
    }
    headers
}

fn band_rows(
    table: &Table,
    margins: Margins,
    options: &RenderOptions,
    measure: Option<&str>,
) -> Vec<Vec<String>> {
    let dims = table.row_dimensions().len();
    let last_column = if margins.total_column {
        table.data_columns()
    } else {
        table.data_columns().saturating_sub(1)
    };
    let mut rows = Vec::with_capacity(table.data_rows() + 1);

    for r in 0..table.data_rows() {
        let label = &table.row_labels()[r];
        let mut row: Vec<String> = (0..dims)
            .map(|k| label.part(k).unwrap_or_default().to_string())
            .collect();
        row.extend(measure.map(str::to_string));
        row.extend((0..=last_column).map(|c| render_cell(table.cell(r, c), options)));
        rows.push(row);
    }

    if margins.total_row {
        let mut row: Vec<String> = (0..dims)
            .map(|k| {
                if k == 0 {
                    options.total_label.clone()
                } else {
                    String::new()
                }
            })
            .collect();
        row.extend(measure.map(str::to_string));
        row.extend(
            (0..=last_column).map(|c| render_cell(table.cell(table.data_rows(), c), options)),
        );
        rows.push(row);
    }

    rows
}

fn render_cell(cell: &Cell, options: &RenderOptions) -> String {
    let Cell::Suppressed {
        original,
        reason,
        axis,
        note,
    } = cell
    else {
        return format_value(cell.original());
    };

    let mut text = match reason {
        Reason::Constraint if options.ranges => options
            .class_ranges
            .iter()
            .find(|range| range.contains(*original))
            .map_or_else(|| options.marker.clone(), ClassRange::label),
        _ => options.marker.clone(),
    };

    if options.debug {
        let value = format_value(*original);
        let tag = match (reason, axis) {
            (Reason::Primary, _) => format!("P({value})"),
            (Reason::Secondary, Axis::Row) => format!("R({value})"),
            (Reason::Secondary, Axis::Column) => format!("C({value})"),
            (Reason::Constraint, _) => match note {
                Some(note) => format!("K({value}, {note})"),
                None => format!("K({value})"),
            },
        };
        text.push_str(&tag);
    }

    text
}
