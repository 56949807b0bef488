use thiserror::Error;

/// Error types for disclosure-control operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// The query produced no rows, so there is nothing to pivot.
    #[error("cannot pivot the table: the query returned an empty result set")]
    EmptyResult,

    /// Requested row/column/measure names do not partition the header.
    #[error("cannot pivot the table: {0}")]
    PivotShape(String),

    /// A column constraint could not be parsed.
    #[error("invalid constraint '{expression}': {reason}")]
    InvalidConstraint {
        /// The raw constraint text.
        expression: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Sensitive flat tables are only released through the single-measure path.
    #[error("flat table with {measures} measures and sensitive columns cannot be released")]
    FlatTableNotProtectable {
        /// Number of measure columns requested.
        measures: usize,
    },

    /// Error raised by a shared collaborator.
    #[error(transparent)]
    Core(#[from] lodstat_core::LodstatError),
}

/// Result type alias for disclosure-control operations.
pub type Result<T> = std::result::Result<T, SecretError>;
