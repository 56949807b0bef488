//! Turns a flat result set into [`Table`]s with margins.
//!
//! The pivot is a cross-tabulation with `sum` as the reducer: every distinct
//! row-dimension tuple becomes a row, every distinct column-dimension tuple a
//! column, and combinations missing from the input are zero. Axes are sorted
//! by [`DimensionKey`] ordering. Each measure gets its own band, a table
//! sharing the row and column labels of the others.

use crate::error::{Result, SecretError};
use crate::table::Table;
use lodstat_core::{DimensionKey, Scalar};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A rectangular warehouse result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    /// Column names.
    pub headers: Vec<String>,
    /// Rows, each with one value per header.
    pub rows: Vec<Vec<Scalar>>,
}

impl ResultSet {
    /// Position of a column by name.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Which columns go down the rows, across the columns, and into the cells.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotSpec {
    /// Row dimensions.
    pub rows: Vec<String>,
    /// Column dimensions.
    pub columns: Vec<String>,
    /// Measures summed into the cells, one band each.
    pub measures: Vec<String>,
}

/// An input value left out of the table because it is not numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedRow {
    /// Zero-based position in the result set.
    pub row: usize,
    /// Column holding the bad value.
    pub column: String,
    /// The offending value as text.
    pub value: String,
}

/// A built flat table plus the rows that could not be used.
#[derive(Debug, Clone)]
pub struct Built {
    /// The table with margins.
    pub table: Table,
    /// Rows excluded from the table.
    pub malformed: Vec<MalformedRow>,
}

/// Pivoted bands plus the values that could not be aggregated.
#[derive(Debug, Clone)]
pub struct Pivoted {
    /// One table per measure, in the requested order.
    pub bands: Vec<Table>,
    /// Values excluded from aggregation.
    pub malformed: Vec<MalformedRow>,
}

/// Builds pivoted and plain tables from result sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableBuilder;

impl TableBuilder {
    /// Cross-tabulate `result` according to `layout`.
    ///
    /// A non-numeric value only drops that measure's contribution; the row
    /// still feeds the other measures.
    ///
    /// # Errors
    /// - [`SecretError::EmptyResult`] if `result` has no rows
    /// - [`SecretError::PivotShape`] if the names do not partition the header
    pub fn pivot(result: &ResultSet, layout: &PivotSpec) -> Result<Pivoted> {
        if result.rows.is_empty() {
            return Err(SecretError::EmptyResult);
        }
        if layout.rows.is_empty() {
            return Err(SecretError::PivotShape("missing row dimensions".to_string()));
        }
        if layout.columns.is_empty() {
            return Err(SecretError::PivotShape(
                "missing column dimensions".to_string(),
            ));
        }
        if layout.measures.is_empty() {
            return Err(SecretError::PivotShape("missing measure".to_string()));
        }
        check_disjoint(layout)?;

        let row_idx = resolve(result, &layout.rows)?;
        let col_idx = resolve(result, &layout.columns)?;
        let measure_idx = resolve(result, &layout.measures)?;

        let mut sums: BTreeMap<DimensionKey, BTreeMap<DimensionKey, Vec<f64>>> = BTreeMap::new();
        let mut column_keys: BTreeSet<DimensionKey> = BTreeSet::new();
        let mut malformed = Vec::new();

        for (r, row) in result.rows.iter().enumerate() {
            let Some(row_key) = key_of(row, &row_idx) else {
                tracing::debug!("Row {} dropped: null row dimension", r);
                continue;
            };
            let Some(column_key) = key_of(row, &col_idx) else {
                tracing::debug!("Row {} dropped: null column dimension", r);
                continue;
            };

            let mut values = Vec::with_capacity(measure_idx.len());
            for (&i, measure) in measure_idx.iter().zip(&layout.measures) {
                match measure_of(row, i) {
                    Ok(value) => values.push(Some(value.unwrap_or(0.0))),
                    Err(raw) => {
                        tracing::warn!(
                            "Row {} excluded from {}: non-numeric value '{}'",
                            r,
                            measure,
                            raw
                        );
                        malformed.push(MalformedRow {
                            row: r,
                            column: measure.clone(),
                            value: raw,
                        });
                        values.push(None);
                    }
                }
            }
            if values.iter().all(Option::is_none) {
                continue;
            }

            column_keys.insert(column_key.clone());
            let cell = sums
                .entry(row_key)
                .or_default()
                .entry(column_key)
                .or_insert_with(|| vec![0.0; measure_idx.len()]);
            for (sum, value) in cell.iter_mut().zip(values) {
                *sum += value.unwrap_or(0.0);
            }
        }

        if sums.is_empty() {
            return Err(SecretError::PivotShape(
                "no row has a value for every dimension".to_string(),
            ));
        }

        let column_labels: Vec<DimensionKey> = column_keys.into_iter().collect();
        let row_labels: Vec<DimensionKey> = sums.keys().cloned().collect();

        let bands: Vec<Table> = layout
            .measures
            .iter()
            .enumerate()
            .map(|(m, measure)| {
                let values: Vec<Vec<f64>> = sums
                    .values()
                    .map(|by_column| {
                        column_labels
                            .iter()
                            .map(|c| by_column.get(c).map_or(0.0, |cell| cell[m]))
                            .collect()
                    })
                    .collect();
                Table::new(
                    layout.rows.clone(),
                    layout.columns.clone(),
                    measure.clone(),
                    row_labels.clone(),
                    column_labels.clone(),
                    &values,
                )
            })
            .collect();

        tracing::debug!(
            "Pivoted {} input rows into {} band(s) of {}x{} cells",
            result.rows.len(),
            bands.len(),
            row_labels.len(),
            column_labels.len()
        );

        Ok(Pivoted { bands, malformed })
    }

    /// Build a flat table: one row per input row, one data column per
    /// measure, margins appended.
    ///
    /// # Errors
    /// - [`SecretError::EmptyResult`] if `result` has no rows
    /// - [`SecretError::PivotShape`] if no measure is given, a name is
    ///   missing from the header or a measure is also listed as a dimension
    pub fn plain(result: &ResultSet, dimensions: &[String], measures: &[String]) -> Result<Built> {
        if result.rows.is_empty() {
            return Err(SecretError::EmptyResult);
        }
        if measures.is_empty() {
            return Err(SecretError::PivotShape("missing measure".to_string()));
        }
        if let Some(measure) = measures.iter().find(|m| dimensions.contains(*m)) {
            return Err(SecretError::PivotShape(format!(
                "column '{measure}' is both a dimension and a measure"
            )));
        }

        let dim_idx = resolve(result, dimensions)?;
        let measure_idx = resolve(result, measures)?;

        let mut row_labels = Vec::with_capacity(result.rows.len());
        let mut values = Vec::with_capacity(result.rows.len());
        let mut malformed = Vec::new();

        'rows: for (r, row) in result.rows.iter().enumerate() {
            let mut row_values = Vec::with_capacity(measure_idx.len());
            for (&i, measure) in measure_idx.iter().zip(measures) {
                match measure_of(row, i) {
                    Ok(value) => row_values.push(value.unwrap_or(0.0)),
                    Err(raw) => {
                        tracing::warn!("Row {} excluded: non-numeric value '{}' in {}", r, raw, measure);
                        malformed.push(MalformedRow {
                            row: r,
                            column: measure.clone(),
                            value: raw,
                        });
                        continue 'rows;
                    }
                }
            }
            let labels: Vec<Scalar> = dim_idx
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Scalar::Null))
                .collect();
            row_labels.push(DimensionKey::from_scalars(&labels));
            values.push(row_values);
        }

        Ok(Built {
            table: Table::new(
                dimensions.to_vec(),
                Vec::new(),
                measures.join(","),
                row_labels,
                measures
                    .iter()
                    .map(|m| DimensionKey::new(vec![m.clone()]))
                    .collect(),
                &values,
            ),
            malformed,
        })
    }
}

fn check_disjoint(layout: &PivotSpec) -> Result<()> {
    let mut seen = HashSet::new();
    for name in layout
        .rows
        .iter()
        .chain(&layout.columns)
        .chain(&layout.measures)
    {
        if !seen.insert(name.as_str()) {
            return Err(SecretError::PivotShape(format!(
                "column '{name}' is used more than once"
            )));
        }
    }
    Ok(())
}

fn resolve(result: &ResultSet, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            result
                .column_index(name)
                .ok_or_else(|| SecretError::PivotShape(format!("unknown column '{name}'")))
        })
        .collect()
}

fn key_of(row: &[Scalar], indices: &[usize]) -> Option<DimensionKey> {
    let mut parts = Vec::with_capacity(indices.len());
    for &i in indices {
        match row.get(i) {
            None | Some(Scalar::Null) => return None,
            Some(value) => parts.push(value.to_label()),
        }
    }
    Some(DimensionKey::new(parts))
}

/// `Ok(None)` for NULL, `Err(raw text)` for a value that is not a number.
fn measure_of(row: &[Scalar], index: usize) -> std::result::Result<Option<f64>, String> {
    match row.get(index) {
        None | Some(Scalar::Null) => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| value.to_label()),
    }
}
