//! Errors raised while aggregating results into the store.

use std::path::PathBuf;

use crate::parser::ParseError;

/// Fatal aggregation errors. Any of these aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Expected exactly one {dimension} token but found {found:?} in label {label}")]
    AmbiguousDimension {
        dimension: &'static str,
        found: Vec<String>,
        label: String,
    },

    #[error("Load distribution {distribution} needs exactly one {parameter}= parameter but found {found:?} in label {label}")]
    MissingCompanionParameter {
        distribution: String,
        parameter: &'static str,
        found: Vec<String>,
        label: String,
    },

    #[error("Parameter {parameter} has non-integer value {value:?} in label {label}")]
    InvalidParameter {
        parameter: &'static str,
        value: String,
        label: String,
    },

    #[error("Solar start offset {offset} is out of range for base year {year} in label {label}")]
    InvalidTimestamp { offset: i64, year: i32, label: String },

    #[error("Module path {module} has no [node] index")]
    MissingNodeIndex { module: String },

    #[error("{file}: label {label} uses parameter {column} which is not a column of the table created from the first file (force it as an extra column)")]
    UnknownParameterColumn {
        file: PathBuf,
        label: String,
        column: String,
    },

    #[error("Invalid SQL identifier {0:?}")]
    InvalidIdentifier(String),
}
