//! Constraint suppression against external reference counts.
//!
//! A column constraint such as `strutture.posti_letto<3` says that a cell
//! must be withheld when the reference population behind it (here the
//! number of bed places in the `strutture` table for the same dimension
//! labels) falls under the limit. Several clauses joined by `AND` must all
//! hold. Reference counts come from a [`ReferenceSource`].
//!
//! Reference lookups fail open: an error or an empty answer leaves the
//! column unsuppressed and is logged.

use crate::builder::ResultSet;
use crate::cell::{Axis, Reason};
use crate::error::{Result, SecretError};
use crate::render::format_value;
use crate::rules::SensitivityRules;
use crate::table::Table;
use lodstat_core::LodstatError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

static CLAUSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\s*(<=|>=|<|>|=)\s*(-?[0-9]+(?:\.[0-9]+)?)\s*$")
        .expect("valid constraint clause regex")
});

static AND_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+AND\s+").expect("valid constraint conjunction regex"));

/// Comparison between a reference count and a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `=`
    Equal,
}

impl Operator {
    /// Whether `count OP limit` holds.
    #[must_use]
    pub fn holds(self, count: f64, limit: f64) -> bool {
        match self {
            Self::Less => count < limit,
            Self::LessOrEqual => count <= limit,
            Self::Greater => count > limit,
            Self::GreaterOrEqual => count >= limit,
            Self::Equal => (count - limit).abs() < f64::EPSILON,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Equal => "=",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "<" => Ok(Self::Less),
            "<=" => Ok(Self::LessOrEqual),
            ">" => Ok(Self::Greater),
            ">=" => Ok(Self::GreaterOrEqual),
            "=" => Ok(Self::Equal),
            other => Err(format!("unknown operator '{other}'")),
        }
    }
}

/// One `table.column OP limit` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Reference table.
    pub table: String,
    /// Count column in the reference table.
    pub column: String,
    /// Comparison applied to the count.
    pub operator: Operator,
    /// Right-hand side of the comparison.
    pub limit: f64,
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}{}",
            self.table,
            self.column,
            self.operator.symbol(),
            format_value(self.limit)
        )
    }
}

/// The clauses of one column constraint, all of which must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintSet {
    clauses: Vec<Clause>,
}

impl ConstraintSet {
    /// Parse `table.column OP limit [AND table.column OP limit ...]`.
    ///
    /// # Errors
    /// [`SecretError::InvalidConstraint`] when a clause does not match.
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: String| SecretError::InvalidConstraint {
            expression: expression.to_string(),
            reason,
        };

        if expression.trim().is_empty() {
            return Err(invalid("empty expression".to_string()));
        }

        let mut clauses = Vec::new();
        for part in AND_PATTERN.split(expression) {
            let caps = CLAUSE_PATTERN
                .captures(part)
                .ok_or_else(|| invalid(format!("'{}' is not table.column OP number", part.trim())))?;
            let operator = caps[3].parse::<Operator>().map_err(invalid)?;
            let limit = caps[4]
                .parse::<f64>()
                .map_err(|e| invalid(format!("bad limit: {e}")))?;
            clauses.push(Clause {
                table: caps[1].to_string(),
                column: caps[2].to_string(),
                operator,
                limit,
            });
        }

        Ok(Self { clauses })
    }

    /// Clauses in declaration order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }
}

impl FromStr for ConstraintSet {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Restricts a reference query to some labels of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFilter {
    /// Filtered column.
    pub column: String,
    /// Accepted labels.
    pub values: Vec<String>,
}

/// Ask a reference table for counts grouped by dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceQuery {
    /// Reference table.
    pub table: String,
    /// Column summed into the count.
    pub count_column: String,
    /// Dimensions to group by. Sources may return a subset.
    pub dimensions: Vec<String>,
    /// Filters carried over from the originating query.
    pub filters: Vec<ReferenceFilter>,
}

/// One grouped reference count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRow {
    /// Labels, one per returned header.
    pub labels: Vec<String>,
    /// Summed count.
    pub count: f64,
}

/// Grouped reference counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceResult {
    /// Dimensions the counts are grouped by.
    pub headers: Vec<String>,
    /// One row per label combination.
    pub rows: Vec<ReferenceRow>,
}

impl ReferenceResult {
    /// Whether no counts came back.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Provider of reference counts for constraint suppression.
pub trait ReferenceSource {
    /// Run one grouped count query.
    fn reference_counts(&self, query: &ReferenceQuery) -> lodstat_core::Result<ReferenceResult>;
}

/// A source with no reference tables. Every query answers empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferenceSource;

impl ReferenceSource for NoReferenceSource {
    fn reference_counts(&self, _query: &ReferenceQuery) -> lodstat_core::Result<ReferenceResult> {
        Ok(ReferenceResult::default())
    }
}

/// Reference tables held in memory, grouped and filtered on demand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticReferenceSource {
    tables: BTreeMap<String, ResultSet>,
}

impl StaticReferenceSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a reference table.
    pub fn insert(&mut self, name: impl Into<String>, table: ResultSet) {
        self.tables.insert(name.into(), table);
    }

    /// Load tables from a JSON object mapping table names to result sets.
    ///
    /// # Errors
    /// [`LodstatError::Validation`] when the JSON does not describe tables.
    pub fn from_json(json: &str) -> lodstat_core::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| LodstatError::Validation(format!("reference tables: {e}")))
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl ReferenceSource for StaticReferenceSource {
    fn reference_counts(&self, query: &ReferenceQuery) -> lodstat_core::Result<ReferenceResult> {
        let table = self.tables.get(&query.table).ok_or_else(|| {
            LodstatError::Metadata(format!("unknown reference table '{}'", query.table))
        })?;
        let count_idx = table.column_index(&query.count_column).ok_or_else(|| {
            LodstatError::Query(format!(
                "reference table '{}' has no column '{}'",
                query.table, query.count_column
            ))
        })?;

        let (headers, dim_idx): (Vec<String>, Vec<usize>) = query
            .dimensions
            .iter()
            .filter_map(|d| table.column_index(d).map(|i| (d.clone(), i)))
            .unzip();
        let filters: Vec<(usize, &ReferenceFilter)> = query
            .filters
            .iter()
            .filter_map(|f| table.column_index(&f.column).map(|i| (i, f)))
            .collect();

        let mut groups: BTreeMap<Vec<String>, f64> = BTreeMap::new();
        'rows: for row in &table.rows {
            for (i, filter) in &filters {
                let label = row.get(*i).map(lodstat_core::Scalar::to_label).unwrap_or_default();
                if !filter.values.contains(&label) {
                    continue 'rows;
                }
            }

            let mut labels = Vec::with_capacity(dim_idx.len());
            for &i in &dim_idx {
                match row.get(i) {
                    None | Some(lodstat_core::Scalar::Null) => continue 'rows,
                    Some(value) => labels.push(value.to_label()),
                }
            }

            let count = match row.get(count_idx) {
                None | Some(lodstat_core::Scalar::Null) => 0.0,
                Some(value) => value.as_f64().ok_or_else(|| {
                    LodstatError::Query(format!(
                        "non-numeric count '{}' in {}.{}",
                        value, query.table, query.count_column
                    ))
                })?,
            };
            *groups.entry(labels).or_insert(0.0) += count;
        }

        Ok(ReferenceResult {
            headers,
            rows: groups
                .into_iter()
                .map(|(labels, count)| ReferenceRow { labels, count })
                .collect(),
        })
    }
}

/// Where a reference dimension sits in the table.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Row(usize),
    Column(usize),
}

/// Reference counts projected onto the table's dimensions.
struct Counts {
    slots: Vec<Slot>,
    by_labels: HashMap<Vec<String>, f64>,
}

impl Counts {
    fn project(table: &Table, result: &ReferenceResult) -> Self {
        let mut slots = Vec::new();
        let mut keep = Vec::new();
        for (h, name) in result.headers.iter().enumerate() {
            let slot = if let Some(k) = table.row_dimensions().iter().position(|d| d == name) {
                Slot::Row(k)
            } else if let Some(k) = table.column_dimensions().iter().position(|d| d == name) {
                Slot::Column(k)
            } else {
                continue;
            };
            slots.push(slot);
            keep.push(h);
        }

        let mut by_labels = HashMap::new();
        for row in &result.rows {
            let labels: Vec<String> = keep
                .iter()
                .map(|&h| row.labels.get(h).cloned().unwrap_or_default())
                .collect();
            *by_labels.entry(labels).or_insert(0.0) += row.count;
        }

        Self { slots, by_labels }
    }

    /// Count behind a data cell. Unreturned dimensions match every label.
    fn at(&self, table: &Table, row: usize, column: usize) -> Option<f64> {
        let labels: Vec<String> = self
            .slots
            .iter()
            .map(|slot| match *slot {
                Slot::Row(k) => table.row_labels()[row].part(k).unwrap_or_default().to_string(),
                Slot::Column(k) => table.column_labels()[column]
                    .part(k)
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect();
        self.by_labels.get(&labels).copied()
    }
}

/// Withholds cells whose reference counts fall under a column constraint.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintSuppressor;

impl ConstraintSuppressor {
    /// Apply every constraint in `rules` to `table`. Returns the number of
    /// cells suppressed.
    ///
    /// # Errors
    /// [`SecretError::InvalidConstraint`] for an unparsable constraint.
    /// Reference failures do not error.
    pub fn apply(
        table: &mut Table,
        rules: &SensitivityRules,
        source: &dyn ReferenceSource,
        filters: &[ReferenceFilter],
    ) -> Result<usize> {
        let mut dimensions = table.row_dimensions().to_vec();
        dimensions.extend_from_slice(table.column_dimensions());

        let mut suppressed = 0;
        'columns: for (column, expression) in rules.constraint_columns() {
            let constraint = ConstraintSet::parse(expression)?;

            let mut counts = Vec::with_capacity(constraint.clauses().len());
            for clause in constraint.clauses() {
                let query = ReferenceQuery {
                    table: clause.table.clone(),
                    count_column: clause.column.clone(),
                    dimensions: dimensions.clone(),
                    filters: filters.to_vec(),
                };
                match source.reference_counts(&query) {
                    Ok(result) if result.is_empty() => {
                        tracing::warn!(
                            "Constraint {} on {}: reference query returned no rows, column left unsuppressed",
                            clause,
                            column
                        );
                        continue 'columns;
                    }
                    Ok(result) => counts.push(Counts::project(table, &result)),
                    Err(e) => {
                        tracing::warn!(
                            "Constraint {} on {}: reference query failed ({}), column left unsuppressed",
                            clause,
                            column,
                            e
                        );
                        continue 'columns;
                    }
                }
            }

            let mut hits = Vec::new();
            for r in 0..table.data_rows() {
                for c in 0..table.data_columns() {
                    if let Some(note) = Self::violation(table, &constraint, &counts, r, c) {
                        hits.push((r, c, note));
                    }
                }
            }

            let mut count = 0;
            for (r, c, note) in hits {
                if table.suppress(Axis::Row, r, c, Reason::Constraint, Some(note)) {
                    count += 1;
                }
            }
            tracing::debug!("Constraint on {} suppressed {} cells", column, count);
            suppressed += count;
        }

        Ok(suppressed)
    }

    /// The debug note for a cell every clause holds for, `None` otherwise.
    fn violation(
        table: &Table,
        constraint: &ConstraintSet,
        counts: &[Counts],
        row: usize,
        column: usize,
    ) -> Option<String> {
        let mut notes = Vec::with_capacity(counts.len());
        for (clause, counts) in constraint.clauses().iter().zip(counts) {
            let count = counts.at(table, row, column)?;
            if !(count > 0.0 && clause.operator.holds(count, clause.limit)) {
                return None;
            }
            notes.push(format!("{}={}", clause.column, format_value(count)));
        }
        Some(notes.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ColumnRule;
    use lodstat_core::{DimensionKey, Scalar};

    fn text(s: &str) -> Scalar {
        Scalar::Text(s.to_string())
    }

    fn key(label: &str) -> DimensionKey {
        DimensionKey::new(vec![label.to_string()])
    }

    fn table() -> Table {
        Table::new(
            vec!["comune".to_string()],
            vec!["anno".to_string()],
            "presenze".to_string(),
            vec![key("Arco"), key("Riva"), key("Trento")],
            vec![key("2014"), key("2015")],
            &[vec![10.0, 12.0], vec![30.0, 35.0], vec![80.0, 90.0]],
        )
    }

    fn strutture() -> ResultSet {
        ResultSet {
            headers: vec![
                "comune".to_string(),
                "categoria".to_string(),
                "posti_letto".to_string(),
            ],
            rows: vec![
                vec![text("Arco"), text("hotel"), Scalar::Integer(1)],
                vec![text("Arco"), text("camping"), Scalar::Integer(1)],
                vec![text("Riva"), text("hotel"), Scalar::Integer(40)],
                vec![text("Trento"), text("hotel"), Scalar::Integer(0)],
            ],
        }
    }

    fn source() -> StaticReferenceSource {
        let mut source = StaticReferenceSource::new();
        source.insert("strutture", strutture());
        source
    }

    fn rules(constraint: &str) -> SensitivityRules {
        SensitivityRules {
            columns: vec![ColumnRule {
                name: "presenze".to_string(),
                constraint: Some(constraint.to_string()),
                ..ColumnRule::default()
            }],
            secret_refs: Vec::new(),
        }
    }

    struct FailingSource;

    impl ReferenceSource for FailingSource {
        fn reference_counts(&self, _query: &ReferenceQuery) -> lodstat_core::Result<ReferenceResult> {
            Err(LodstatError::Query("connection refused".to_string()))
        }
    }

    #[test]
    fn test_parse_single_clause() {
        let set = ConstraintSet::parse("strutture.posti_letto<3").expect("parse");
        assert_eq!(set.clauses().len(), 1);
        let clause = &set.clauses()[0];
        assert_eq!(clause.table, "strutture");
        assert_eq!(clause.column, "posti_letto");
        assert_eq!(clause.operator, Operator::Less);
        assert!((clause.limit - 3.0).abs() < f64::EPSILON);
        assert_eq!(clause.to_string(), "strutture.posti_letto<3");
    }

    #[test]
    fn test_parse_conjunction() {
        let set: ConstraintSet = "strutture.posti_letto <= 10 AND strutture.camere>=2"
            .parse()
            .expect("parse");
        let ops: Vec<Operator> = set.clauses().iter().map(|c| c.operator).collect();
        assert_eq!(ops, vec![Operator::LessOrEqual, Operator::GreaterOrEqual]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "posti_letto<3", "strutture.posti_letto<", "strutture.posti_letto!3"] {
            assert!(
                matches!(ConstraintSet::parse(bad), Err(SecretError::InvalidConstraint { .. })),
                "accepted '{bad}'"
            );
        }
    }

    #[test]
    fn test_operator_holds() {
        assert!(Operator::Less.holds(2.0, 3.0));
        assert!(!Operator::Less.holds(3.0, 3.0));
        assert!(Operator::LessOrEqual.holds(3.0, 3.0));
        assert!(Operator::Greater.holds(4.0, 3.0));
        assert!(Operator::GreaterOrEqual.holds(3.0, 3.0));
        assert!(Operator::Equal.holds(3.0, 3.0));
    }

    #[test]
    fn test_static_source_groups_and_filters() {
        let query = ReferenceQuery {
            table: "strutture".to_string(),
            count_column: "posti_letto".to_string(),
            dimensions: vec!["comune".to_string(), "anno".to_string()],
            filters: vec![ReferenceFilter {
                column: "categoria".to_string(),
                values: vec!["hotel".to_string()],
            }],
        };
        let result = source().reference_counts(&query).expect("counts");

        // `anno` is not in the reference table
        assert_eq!(result.headers, vec!["comune".to_string()]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0].labels, vec!["Arco".to_string()]);
        assert!((result.rows[0].count - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_static_source_unknown_table() {
        let query = ReferenceQuery {
            table: "alberghi".to_string(),
            count_column: "posti_letto".to_string(),
            dimensions: Vec::new(),
            filters: Vec::new(),
        };
        assert!(matches!(
            source().reference_counts(&query),
            Err(LodstatError::Metadata(_))
        ));
    }

    #[test]
    fn test_missing_dimension_is_wildcard() {
        let mut t = table();
        let count =
            ConstraintSuppressor::apply(&mut t, &rules("strutture.posti_letto<3"), &source(), &[])
                .expect("apply");

        // Arco has 2 bed places: both years go. Trento's 0 is not a population.
        assert_eq!(count, 2);
        assert_eq!(t.cell(0, 0).reason(), Some(Reason::Constraint));
        assert!(t.cell(0, 1).is_suppressed());
        assert!(!t.cell(2, 0).is_suppressed());
        match t.cell(0, 0) {
            crate::cell::Cell::Suppressed { note, .. } => {
                assert_eq!(note.as_deref(), Some("posti_letto=2"));
            }
            crate::cell::Cell::Value(_) => unreachable!(),
        }
    }

    #[test]
    fn test_every_clause_must_hold() {
        let mut t = table();
        let count = ConstraintSuppressor::apply(
            &mut t,
            &rules("strutture.posti_letto<3 AND strutture.posti_letto>1"),
            &source(),
            &[],
        )
        .expect("apply");
        assert_eq!(count, 2);

        let mut t = table();
        let count = ConstraintSuppressor::apply(
            &mut t,
            &rules("strutture.posti_letto<3 AND strutture.posti_letto>2"),
            &source(),
            &[],
        )
        .expect("apply");
        assert_eq!(count, 0);
    }

    #[test]
    fn test_fails_open() {
        let mut t = table();
        let rules = rules("strutture.posti_letto<3");

        assert_eq!(
            ConstraintSuppressor::apply(&mut t, &rules, &FailingSource, &[]).expect("apply"),
            0
        );
        assert_eq!(
            ConstraintSuppressor::apply(&mut t, &rules, &NoReferenceSource, &[]).expect("apply"),
            0
        );
        assert_eq!(t.suppressed_count(), 0);
    }

    #[test]
    fn test_invalid_constraint_is_an_error() {
        let mut t = table();
        let result = ConstraintSuppressor::apply(&mut t, &rules("posti_letto<3"), &source(), &[]);
        assert!(matches!(result, Err(SecretError::InvalidConstraint { .. })));
    }

    #[test]
    fn test_source_from_json() {
        let source = StaticReferenceSource::from_json(
            r#"{"strutture": {"headers": ["comune", "posti_letto"], "rows": [["Arco", 2]]}}"#,
        )
        .expect("load");
        assert_eq!(source.len(), 1);
        assert!(StaticReferenceSource::from_json("[1, 2]").is_err());
    }
}
