//! Table cells and suppression tags.

use serde::{Deserialize, Serialize};

/// Orientation of a lane through the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Lanes are table rows; positions run across columns.
    Row,
    /// Lanes are table columns; positions run down rows.
    Column,
}

impl Axis {
    /// The other orientation.
    #[must_use]
    pub fn transposed(self) -> Self {
        match self {
            Self::Row => Self::Column,
            Self::Column => Self::Row,
        }
    }
}

/// Why a cell was withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    /// The cell's own value, or its relation to the margin, is disclosive.
    Primary,
    /// Withheld so a primary cell cannot be recomputed from the margin.
    Secondary,
    /// An external reference population behind the cell is too small.
    Constraint,
}

impl Reason {
    /// Constraint suppression counts as primary for every later pass.
    #[must_use]
    pub fn is_primary(self) -> bool {
        matches!(self, Self::Primary | Self::Constraint)
    }
}

/// One cell of a [`Table`](crate::table::Table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    /// A disclosed value.
    Value(f64),
    /// A withheld value. The original is kept for debug rendering only.
    Suppressed {
        /// Value before suppression.
        original: f64,
        /// Why it was withheld.
        reason: Reason,
        /// Pass orientation that withheld it.
        axis: Axis,
        /// Extra context, e.g. the reference count behind a constraint.
        note: Option<String>,
    },
}

impl Cell {
    /// Whether the cell is withheld.
    #[must_use]
    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed { .. })
    }

    /// The disclosed value, `None` when suppressed.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Suppressed { .. } => None,
        }
    }

    /// The underlying value whether or not it is disclosed.
    #[must_use]
    pub fn original(&self) -> f64 {
        match self {
            Self::Value(v) | Self::Suppressed { original: v, .. } => *v,
        }
    }

    /// Suppression reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<Reason> {
        match self {
            Self::Value(_) => None,
            Self::Suppressed { reason, .. } => Some(*reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppressed_keeps_original() {
        let cell = Cell::Suppressed {
            original: 2.0,
            reason: Reason::Secondary,
            axis: Axis::Row,
            note: None,
        };
        assert!(cell.is_suppressed());
        assert_eq!(cell.value(), None);
        assert!((cell.original() - 2.0).abs() < f64::EPSILON);
        assert_eq!(cell.reason(), Some(Reason::Secondary));
    }

    #[test]
    fn test_constraint_counts_as_primary() {
        assert!(Reason::Primary.is_primary());
        assert!(Reason::Constraint.is_primary());
        assert!(!Reason::Secondary.is_primary());
    }

    #[test]
    fn test_axis_transposed() {
        assert_eq!(Axis::Row.transposed(), Axis::Column);
        assert_eq!(Axis::Column.transposed(), Axis::Row);
    }
}
