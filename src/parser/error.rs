//! Errors raised while discovering and parsing results files.

use std::path::PathBuf;

/// Every variant is fatal: the file and the whole run are abandoned.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("No results files named {filename} found in {root}")]
    NoFilesFound { root: PathBuf, filename: String },

    #[error("Failed to scan {root}: {source}")]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line_number}: line did not start with {sentinel}: {line:?}")]
    MissingSentinel {
        path: PathBuf,
        line_number: usize,
        sentinel: &'static str,
        line: String,
    },

    #[error("{path}:{line_number}: unrecognised line {line:?}")]
    UnrecognisedLine {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    #[error("{path}:{line_number}: cannot parse {what} from {token:?} in line {line:?}")]
    InvalidNumber {
        path: PathBuf,
        line_number: usize,
        what: &'static str,
        token: String,
        line: String,
    },

    #[error("{path}:{line_number}: {what} seen before {missing} in line {line:?}")]
    MissingContext {
        path: PathBuf,
        line_number: usize,
        what: &'static str,
        missing: &'static str,
        line: String,
    },
}
