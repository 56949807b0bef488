//! Column sensitivity metadata attached to a query.

use serde::{Deserialize, Serialize};

/// Sensitivity attributes of one result column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnRule {
    /// Column name as it appears in the result header.
    pub name: String,
    /// The column is covered by statistical secret.
    pub secret: bool,
    /// Primary suppression threshold declared on the column.
    pub threshold: Option<f64>,
    /// Reference constraint, e.g. `strutture.posti_letto<3`.
    pub constraint: Option<String>,
    /// The column is a reference period (year, month, ...).
    pub ref_period: bool,
}

/// A column whose secrecy comes from a referenced secret table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretRef {
    /// Referencing column.
    pub column: String,
    /// Referenced secret table.
    pub table: String,
}

/// Every sensitivity rule that applies to a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityRules {
    /// Per-column attributes, in result column order.
    pub columns: Vec<ColumnRule>,
    /// Secret-reference columns.
    pub secret_refs: Vec<SecretRef>,
}

impl SensitivityRules {
    /// Columns flagged secret.
    pub fn secret_columns(&self) -> impl Iterator<Item = &ColumnRule> {
        self.columns.iter().filter(|c| c.secret)
    }

    /// Columns carrying a reference constraint.
    pub fn constraint_columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .filter_map(|c| c.constraint.as_deref().map(|expr| (c.name.as_str(), expr)))
    }

    /// `|secret columns| + |secret refs| + |constraint columns|`.
    #[must_use]
    pub fn cardinality(&self) -> usize {
        self.secret_columns().count() + self.secret_refs.len() + self.constraint_columns().count()
    }

    /// Whether any rule applies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    /// Threshold for the band of `measure` among `measures`.
    ///
    /// A threshold declared on the measure column itself wins. Otherwise the
    /// first one declared on a column that is not a measure applies, and
    /// `default` when there is none.
    #[must_use]
    pub fn measure_threshold(&self, measure: &str, measures: &[String], default: f64) -> f64 {
        if let Some(own) = self
            .columns
            .iter()
            .find(|c| c.name == measure)
            .and_then(|c| c.threshold)
        {
            return own;
        }
        let declared: Vec<f64> = self
            .columns
            .iter()
            .filter(|c| !measures.contains(&c.name))
            .filter_map(|c| c.threshold)
            .collect();
        if declared.len() > 1 {
            tracing::debug!(
                "{} thresholds declared, using the first ({})",
                declared.len(),
                declared[0]
            );
        }
        declared.first().copied().unwrap_or(default)
    }

    /// Whether any of `dimensions` is a reference period.
    #[must_use]
    pub fn has_ref_period(&self, dimensions: &[String]) -> bool {
        self.columns
            .iter()
            .any(|c| c.ref_period && dimensions.iter().any(|d| *d == c.name))
    }
}
