//! Protection of flat, single-measure tables.

use crate::cell::Axis;
use crate::primary::{PrimaryStrategy, PrimarySuppressor};
use crate::secondary::SecondarySuppressor;
use crate::table::Table;

/// Tables with this many rows or fewer, total row included, are released.
const EXEMPT_ROWS: usize = 3;

/// Applies primary and secondary suppression down the measure column of a
/// flat table.
#[derive(Debug, Clone, Copy)]
pub struct PlainTableProtector {
    threshold: f64,
}

impl PlainTableProtector {
    /// Create a protector for `threshold`.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Whether the table is too short to protect.
    #[must_use]
    pub fn is_exempt(table: &Table) -> bool {
        table.data_rows() < EXEMPT_ROWS
    }

    /// Simple-threshold sweep down the column, then one secondary pass.
    /// Returns the number of cells suppressed.
    pub fn protect(&self, table: &mut Table) -> usize {
        if Self::is_exempt(table) {
            tracing::debug!(
                "Plain table with {} rows is exempt from suppression",
                table.data_rows()
            );
            return 0;
        }

        let primary = PrimarySuppressor::new(PrimaryStrategy::SimpleThreshold, self.threshold)
            .sweep(table, Axis::Column);
        let secondary = SecondarySuppressor::pass(table, Axis::Column);
        tracing::debug!(
            "Plain table: {} primary, {} secondary suppressions",
            primary,
            secondary
        );
        primary + secondary
    }
}
