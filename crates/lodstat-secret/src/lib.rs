//! Lodstat Secret - Statistical disclosure control for published tables
//!
//! This crate takes a rectangular query result, cross-tabulates it, and
//! withholds enough cells that no confidential value can be read off the
//! table or recomputed from its row and column totals.
//!
//! ## Architecture
//!
//! The [`orchestrator`] picks a path for each request and runs the passes in
//! order:
//!
//! - **Table building**: flat tuples are pivoted into one grid per measure,
//!   each with a total row and a total column
//! - **Constraint suppression**: cells whose external reference population
//!   is too small are withheld first
//! - **Primary suppression**: simple-threshold or marginality-aware,
//!   depending on how many sensitivity rules apply
//! - **Secondary suppression**: every row and column with a withheld cell
//!   gets at least two, iterated to a fixed point
//! - **Rendering**: withheld cells become a marker, a debug annotation or a
//!   class range
//!
//! Every pass is written once against an [`Axis`] and runs over rows and
//! columns alike.
//!
//! ## Example
//!
//! ```rust
//! use lodstat_core::{Scalar, SecretConfig};
//! use lodstat_secret::{
//!     apply_stat_secret, ColumnRule, NoReferenceSource, PivotSpec, ProtectionRequest,
//!     RenderOptions, ResultSet, SensitivityRules,
//! };
//!
//! let rows = [("A", "X", 1), ("A", "Y", 5), ("B", "X", 2), ("B", "Y", 2), ("C", "X", 10), ("C", "Y", 10)];
//! let request = ProtectionRequest {
//!     result: ResultSet {
//!         headers: vec!["comune".into(), "sesso".into(), "residenti".into()],
//!         rows: rows
//!             .iter()
//!             .map(|(r, c, n)| vec![Scalar::Text((*r).into()), Scalar::Text((*c).into()), Scalar::Integer(*n)])
//!             .collect(),
//!     },
//!     pivot: Some(PivotSpec {
//!         rows: vec!["comune".into()],
//!         columns: vec!["sesso".into()],
//!         measures: vec!["residenti".into()],
//!     }),
//!     rules: SensitivityRules {
//!         columns: vec![ColumnRule { name: "residenti".into(), secret: true, ..ColumnRule::default() }],
//!         secret_refs: Vec::new(),
//!     },
//!     ..ProtectionRequest::default()
//! };
//!
//! let protected = apply_stat_secret(&request, &NoReferenceSource, &SecretConfig::default())?;
//! let rendered = protected.render(&RenderOptions::default());
//! assert_eq!(rendered.rows[0], vec!["A", "*", "*", "6"]);
//! assert_eq!(rendered.rows[2], vec!["C", "10", "10", "20"]);
//! # Ok::<(), lodstat_secret::SecretError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

/// Pivoted and flat table construction.
pub mod builder;
/// Table cells and suppression tags.
pub mod cell;
/// Constraint suppression against reference counts.
pub mod constraint;
/// Error types for disclosure control.
pub mod error;
/// Minimum search over a lane.
pub mod extremum;
/// Request-level entry points.
pub mod orchestrator;
/// Flat single-measure tables.
pub mod plain;
/// Primary suppression strategies.
pub mod primary;
/// Display strings for protected tables.
pub mod render;
/// Column sensitivity metadata.
pub mod rules;
/// Secondary suppression to a fixed point.
pub mod secondary;
/// The cell grid and its lanes.
pub mod table;

pub use builder::{Built, MalformedRow, PivotSpec, Pivoted, ResultSet, TableBuilder};
pub use cell::{Axis, Cell, Reason};
pub use constraint::{
    Clause, ConstraintSet, ConstraintSuppressor, NoReferenceSource, Operator, ReferenceFilter,
    ReferenceQuery, ReferenceResult, ReferenceRow, ReferenceSource, StaticReferenceSource,
};
pub use error::{Result, SecretError};
pub use extremum::{find_extremum, Zero};
pub use orchestrator::{
    apply_stat_secret, apply_stat_secret_plain, ProtectedTable, ProtectionOptions,
    ProtectionRequest, Release, PRESERVE_SECRET_WARNING,
};
pub use plain::PlainTableProtector;
pub use primary::{PrimaryStrategy, PrimarySuppressor};
pub use render::{
    format_value, render_bands, render_listing, render_table, RenderOptions, RenderedTable,
};
pub use rules::{ColumnRule, SecretRef, SensitivityRules};
pub use secondary::{Convergence, SecondarySuppressor};
pub use table::{Lane, Margins, Table};
