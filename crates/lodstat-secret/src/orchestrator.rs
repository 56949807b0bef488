//! Entry points that decide how a query result is protected.
//!
//! A pivoted result runs constraint, primary and secondary suppression on
//! each measure band. A flat result is released as received when no column
//! is sensitive, goes through [`PlainTableProtector`] when it has a single
//! measure, and is refused otherwise.

use crate::builder::{MalformedRow, PivotSpec, ResultSet, TableBuilder};
use crate::constraint::{ConstraintSuppressor, ReferenceFilter, ReferenceSource};
use crate::error::{Result, SecretError};
use crate::plain::PlainTableProtector;
use crate::primary::{PrimaryStrategy, PrimarySuppressor};
use crate::render::{render_bands, render_listing, RenderOptions, RenderedTable};
use crate::rules::SensitivityRules;
use crate::secondary::SecondarySuppressor;
use crate::table::{Margins, Table};
use lodstat_core::SecretConfig;
use serde::{Deserialize, Serialize};

/// Legend shown under a table with suppressed cells.
pub const PRESERVE_SECRET_WARNING: &str =
    "Some values are asterisked to preserve the statistical secret";

/// Per-request switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionOptions {
    /// Annotate suppressed cells. Forces suppression even when `visible`.
    pub debug: bool,
    /// Skip suppression; the caller is entitled to see every value.
    pub visible: bool,
    /// Publish constraint-suppressed cells as class ranges.
    pub ranges: bool,
}

impl ProtectionOptions {
    /// Rendering options for this request on top of `config`.
    #[must_use]
    pub fn render_options(&self, config: &SecretConfig) -> RenderOptions {
        RenderOptions {
            debug: self.debug || config.debug,
            ranges: self.ranges,
            ..RenderOptions::from_config(config)
        }
    }
}

/// Everything needed to protect one query result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionRequest {
    /// The flat query result.
    pub result: ResultSet,
    /// Pivot layout, `None` for a flat table.
    pub pivot: Option<PivotSpec>,
    /// Label columns of a flat table.
    pub dimensions: Vec<String>,
    /// Measure columns of a flat table.
    pub measures: Vec<String>,
    /// Column sensitivity metadata.
    pub rules: SensitivityRules,
    /// Filters of the originating query, forwarded to reference lookups.
    pub filters: Vec<ReferenceFilter>,
    /// Per-request switches.
    pub options: ProtectionOptions,
}

/// What a request publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum Release {
    /// Tables with margins, one band per measure, sharing their labels.
    Bands(Vec<Table>),
    /// A flat result with no sensitive column, published as received.
    Listing(ResultSet),
}

/// A table ready for publication.
#[derive(Debug, Clone)]
pub struct ProtectedTable {
    /// The published content, suppressed cells tagged.
    pub release: Release,
    /// Margins to publish.
    pub margins: Margins,
    /// Whether any cell is withheld.
    pub suppressed: bool,
    /// Legend to show with the table.
    pub warning: Option<String>,
    /// Input values left out of aggregation.
    pub malformed: Vec<MalformedRow>,
    /// Secondary suppression rounds of the slowest band, 0 when not run.
    pub iterations: usize,
}

impl ProtectedTable {
    fn new(
        bands: Vec<Table>,
        margins: Margins,
        malformed: Vec<MalformedRow>,
        iterations: usize,
    ) -> Self {
        let suppressed = bands.iter().any(|band| band.suppressed_count() > 0);
        Self {
            release: Release::Bands(bands),
            margins,
            suppressed,
            warning: suppressed.then(|| PRESERVE_SECRET_WARNING.to_string()),
            malformed,
            iterations,
        }
    }

    fn listing(result: ResultSet) -> Self {
        Self {
            release: Release::Listing(result),
            margins: Margins::none(),
            suppressed: false,
            warning: None,
            malformed: Vec::new(),
            iterations: 0,
        }
    }

    /// Measure bands, empty for a released listing.
    #[must_use]
    pub fn bands(&self) -> &[Table] {
        match &self.release {
            Release::Bands(bands) => bands,
            Release::Listing(_) => &[],
        }
    }

    /// The first band, the whole table for a single measure.
    #[must_use]
    pub fn table(&self) -> Option<&Table> {
        self.bands().first()
    }

    /// Display strings for publication.
    #[must_use]
    pub fn render(&self, options: &RenderOptions) -> RenderedTable {
        match &self.release {
            Release::Bands(bands) => render_bands(bands, self.margins, options),
            Release::Listing(result) => render_listing(result),
        }
    }
}

/// Protect a query result.
///
/// # Errors
/// - [`SecretError::EmptyResult`] / [`SecretError::PivotShape`] when the
///   table cannot be built
/// - [`SecretError::InvalidConstraint`] for an unparsable column constraint
/// - [`SecretError::FlatTableNotProtectable`] for a sensitive flat table
///   with several measures
pub fn apply_stat_secret(
    request: &ProtectionRequest,
    source: &dyn ReferenceSource,
    config: &SecretConfig,
) -> Result<ProtectedTable> {
    let rules = &request.rules;
    let cardinality = rules.cardinality();

    let Some(layout) = &request.pivot else {
        if cardinality == 0 {
            tracing::info!(
                "Flat result with {} rows released as received, no sensitive columns",
                request.result.rows.len()
            );
            return Ok(ProtectedTable::listing(request.result.clone()));
        }
        return match request.measures.as_slice() {
            [measure] => apply_stat_secret_plain(
                &request.result,
                &request.dimensions,
                measure,
                rules,
                source,
                &request.filters,
                config,
            ),
            measures => Err(SecretError::FlatTableNotProtectable {
                measures: measures.len(),
            }),
        };
    };

    let pivoted = TableBuilder::pivot(&request.result, layout)?;
    let mut bands = pivoted.bands;
    let margins = bands.first().map_or_else(Margins::all, Margins::collapsed);

    if request.options.visible && !request.options.debug {
        tracing::info!("Pivot released in visible mode, suppression skipped");
        return Ok(ProtectedTable::new(bands, margins, pivoted.malformed, 0));
    }
    if cardinality == 0 {
        tracing::info!("Pivot has no sensitive columns, suppression skipped");
        return Ok(ProtectedTable::new(bands, margins, pivoted.malformed, 0));
    }

    let strategy = PrimaryStrategy::select(cardinality, true);
    let row_sweep = !rules.has_ref_period(&layout.columns);
    let column_sweep = !rules.has_ref_period(&layout.rows);
    if !row_sweep {
        tracing::debug!("Reference period across the columns, row sweep skipped");
    }
    if !column_sweep {
        tracing::debug!("Reference period down the rows, column sweep skipped");
    }

    let mut iterations = 0;
    for table in &mut bands {
        let threshold =
            rules.measure_threshold(table.measure(), &layout.measures, config.default_threshold);
        let constrained = ConstraintSuppressor::apply(table, rules, source, &request.filters)?;
        let primary = PrimarySuppressor::new(strategy, threshold);
        let primary_count = primary.apply(table, row_sweep, column_sweep);
        let convergence = SecondarySuppressor::converge(table);
        iterations = iterations.max(convergence.iterations);

        tracing::info!(
            "Protected {}x{} pivot on {}: {} constraint, {} primary ({:?}, threshold {}), {} secondary in {} rounds",
            table.data_rows(),
            table.data_columns(),
            table.measure(),
            constrained,
            primary_count,
            strategy,
            threshold,
            convergence.suppressed,
            convergence.iterations
        );
    }

    Ok(ProtectedTable::new(
        bands,
        margins,
        pivoted.malformed,
        iterations,
    ))
}

/// Protect a flat table with a single measure column.
///
/// # Errors
/// Same as [`apply_stat_secret`] for building and constraint parsing.
pub fn apply_stat_secret_plain(
    result: &ResultSet,
    dimensions: &[String],
    measure: &str,
    rules: &SensitivityRules,
    source: &dyn ReferenceSource,
    filters: &[ReferenceFilter],
    config: &SecretConfig,
) -> Result<ProtectedTable> {
    let measures = [measure.to_string()];
    let built = TableBuilder::plain(result, dimensions, &measures)?;
    let mut table = built.table;

    let constrained = ConstraintSuppressor::apply(&mut table, rules, source, filters)?;
    let threshold = rules.measure_threshold(measure, &measures, config.default_threshold);
    let protected = PlainTableProtector::new(threshold).protect(&mut table);
    let margins = Margins::collapsed(&table);

    tracing::info!(
        "Protected flat table on {} ({} rows): {} constraint, {} threshold/secondary",
        measure,
        table.data_rows(),
        constrained,
        protected
    );
    Ok(ProtectedTable::new(vec![table], margins, built.malformed, 0))
}
