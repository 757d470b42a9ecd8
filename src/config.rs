use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::aggregate::schema::FIXED_COLUMNS;
use crate::aggregate::{ColumnDef, ColumnType, LoadOptions, DEFAULT_TRACE_DATA_DIR};
use crate::parser::{MeasureFilter, UNNAMED_SUB_KEY};
use crate::utils::sql::is_plain_identifier;

fn default_database() -> PathBuf {
    PathBuf::from("castalia-results.db")
}

fn default_table() -> String {
    "results".to_string()
}

fn default_results_file() -> String {
    "results.txt".to_string()
}

fn default_trace_data_dir() -> String {
    DEFAULT_TRACE_DATA_DIR.to_string()
}

fn default_sub_key() -> String {
    UNNAMED_SUB_KEY.to_string()
}

/// Results loader configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Backing SQLite file
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Destination table
    #[serde(default = "default_table")]
    pub table: String,
    /// Root of the simulation output tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infolder: Option<PathBuf>,
    /// File name searched for under `infolder`
    #[serde(default = "default_results_file")]
    pub results_file: String,
    /// Year of the solar radiation data. Defaults to 2007 with a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_year: Option<i32>,
    #[serde(default = "default_trace_data_dir")]
    pub trace_data_dir: String,
    /// Outputs to load. Empty loads everything.
    #[serde(default)]
    pub measures: Vec<Measure>,
    /// Parameter columns created even if the first file lacks them
    #[serde(default)]
    pub forced_columns: Vec<ColumnDef>,
}

/// One `(output name, sub-key)` entry. A sub-key of `"*"` matches any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Measure {
    pub output: String,
    #[serde(default = "default_sub_key")]
    pub sub_key: String,
}

impl Measure {
    /// Parse `name|subkey`; a missing `|subkey` means the unnamed sub-key
    pub fn parse(arg: &str) -> Self {
        match arg.split_once('|') {
            Some((output, sub_key)) => Self {
                output: output.to_string(),
                sub_key: sub_key.to_string(),
            },
            None => Self {
                output: arg.to_string(),
                sub_key: default_sub_key(),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            table: default_table(),
            infolder: None,
            results_file: default_results_file(),
            base_year: None,
            trace_data_dir: default_trace_data_dir(),
            measures: Vec::new(),
            forced_columns: Vec::new(),
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.database.as_os_str().is_empty() {
            return Err(ValidationError::InvalidStore("database path cannot be empty".to_string()));
        }
        if !is_plain_identifier(&self.table) {
            return Err(ValidationError::InvalidStore(format!(
                "table name {:?} must match [A-Za-z_][A-Za-z0-9_]*",
                self.table
            )));
        }
        if self.results_file.is_empty() {
            return Err(ValidationError::InvalidInput("results_file cannot be empty".to_string()));
        }
        if self.trace_data_dir.is_empty() {
            return Err(ValidationError::InvalidInput("trace_data_dir cannot be empty".to_string()));
        }

        for measure in &self.measures {
            if measure.output.is_empty() {
                return Err(ValidationError::InvalidMeasure(format!(
                    "output name cannot be empty (sub-key {:?})",
                    measure.sub_key
                )));
            }
        }

        let mut seen = HashSet::new();
        for column in &self.forced_columns {
            if !is_plain_identifier(&column.name) {
                return Err(ValidationError::InvalidColumn(format!(
                    "column name {:?} must match [A-Za-z_][A-Za-z0-9_]*",
                    column.name
                )));
            }
            if column.column_type == ColumnType::Integer {
                return Err(ValidationError::InvalidColumn(format!(
                    "column {} must be TEXT or REAL",
                    column.name
                )));
            }
            // SQLite column names are case-insensitive
            let folded = column.name.to_ascii_lowercase();
            if FIXED_COLUMNS.iter().any(|(fixed, _)| fixed.eq_ignore_ascii_case(&column.name)) {
                return Err(ValidationError::InvalidColumn(format!(
                    "column {} clashes with a fixed column",
                    column.name
                )));
            }
            if !seen.insert(folded) {
                return Err(ValidationError::InvalidColumn(format!(
                    "column {} is forced more than once",
                    column.name
                )));
            }
        }

        Ok(())
    }

    pub fn measure_filter(&self) -> MeasureFilter {
        if self.measures.is_empty() {
            MeasureFilter::all()
        } else {
            MeasureFilter::from_pairs(
                self.measures
                    .iter()
                    .map(|m| (m.output.as_str(), m.sub_key.as_str())),
            )
        }
    }

    /// Options for one load, or `None` if no input folder is set
    pub fn load_options(&self) -> Option<LoadOptions> {
        let infolder = self.infolder.as_ref()?;
        let mut options = LoadOptions::new(infolder.clone(), self.results_file.clone());
        options.measures = self.measure_filter();
        options.base_year = self.base_year;
        options.trace_data_dir = self.trace_data_dir.clone();
        options.forced_columns = self.forced_columns.clone();
        Some(options)
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid store configuration: {0}")]
    InvalidStore(String),
    #[error("Invalid input configuration: {0}")]
    InvalidInput(String),
    #[error("Invalid measure: {0}")]
    InvalidMeasure(String),
    #[error("Invalid forced column: {0}")]
    InvalidColumn(String),
}
