//! Parser for Castalia simulation results files.
//!
//! Turns each `results.txt` found under a directory into a [`ResultTree`] of
//! scalar outputs and a [`HistogramTree`] of histogram buckets, both keyed by
//! run label and repeat index.

pub mod discovery;
pub mod error;
pub mod log_parser;
pub mod patterns;
pub mod types;

pub use discovery::{find_results_files, ResultFiles};
pub use error::ParseError;
pub use log_parser::{parse_results_file, parse_str, ParseContext};
pub use types::*;
