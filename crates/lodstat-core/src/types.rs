//! Shared types used across Lodstat.
//!
//! This module defines the scalar values produced by the warehouse and the
//! ordered label tuples used to address pivot rows and columns.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One value of a warehouse result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// SQL NULL
    Null,
    /// Integer column value
    Integer(i64),
    /// Decimal or floating point column value
    Float(f64),
    /// Anything else, as text
    Text(String),
}

impl Scalar {
    /// Whether this is SQL NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric reading of the value.
    ///
    /// Text is accepted when it parses as a number (decimal columns often
    /// arrive as strings). Returns `None` for NULL and for non-numeric text.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        }
    }

    /// Label used when the value is a dimension member.
    #[must_use]
    pub fn to_label(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            other => write!(f, "{}", other.to_label()),
        }
    }
}

/// Ordered tuple of dimension labels identifying a pivot row or column.
///
/// Ordering is numeric-aware per component: numeric labels sort before
/// text, numbers compare by value, and ties fall back to the raw text so
/// the ordering stays consistent with equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionKey(Vec<String>);

impl DimensionKey {
    /// Create a key from label components.
    #[must_use]
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    /// Create a key from dimension values.
    #[must_use]
    pub fn from_scalars(values: &[Scalar]) -> Self {
        Self(values.iter().map(Scalar::to_label).collect())
    }

    /// Label components.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Component at `index`.
    #[must_use]
    pub fn part(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn compare_label(a: &str, b: &str) -> Ordering {
    let parsed = (a.parse::<f64>(), b.parse::<f64>());
    match parsed {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

impl Ord for DimensionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.0.iter().zip(&other.0) {
            let ord = compare_label(a, b);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl PartialOrd for DimensionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DimensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_deserialization() {
        let row: Vec<Scalar> =
            serde_json::from_str(r#"[null, 12, 2.5, "Rovereto"]"#).expect("parse scalar row");
        assert_eq!(
            row,
            vec![
                Scalar::Null,
                Scalar::Integer(12),
                Scalar::Float(2.5),
                Scalar::Text("Rovereto".to_string()),
            ]
        );
    }

    #[test]
    fn test_scalar_numeric_reading() {
        assert_eq!(Scalar::Integer(7).as_f64(), Some(7.0));
        assert_eq!(Scalar::Text(" 42.50 ".to_string()).as_f64(), Some(42.5));
        assert_eq!(Scalar::Text("n.d.".to_string()).as_f64(), None);
        assert_eq!(Scalar::Text("NaN".to_string()).as_f64(), None);
        assert_eq!(Scalar::Null.as_f64(), None);
    }

    #[test]
    fn test_dimension_key_numeric_ordering() {
        let mut keys = vec![
            DimensionKey::new(vec!["10".to_string()]),
            DimensionKey::new(vec!["9".to_string()]),
            DimensionKey::new(vec!["Arco".to_string()]),
            DimensionKey::new(vec!["100".to_string()]),
        ];
        keys.sort();
        let labels: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["9", "10", "100", "Arco"]);
    }

    #[test]
    fn test_dimension_key_component_ordering() {
        let a = DimensionKey::new(vec!["2014".to_string(), "Trento".to_string()]);
        let b = DimensionKey::new(vec!["2014".to_string(), "Arco".to_string()]);
        let c = DimensionKey::new(vec!["2013".to_string(), "Zambana".to_string()]);
        let mut keys = vec![a.clone(), b.clone(), c.clone()];
        keys.sort();
        assert_eq!(keys, vec![c, b, a]);
    }

    #[test]
    fn test_numerically_equal_labels_stay_distinct() {
        let a = DimensionKey::new(vec!["1".to_string()]);
        let b = DimensionKey::new(vec!["1.0".to_string()]);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }
}
