//! Loading parsed results files into the results table.
//!
//! Two phases: the schema is inferred from the first file's labels (plus any
//! forced columns) and the table recreated, then every file's values are
//! flattened into rows. Files are parsed and drained one at a time.

use std::path::PathBuf;

use super::dimensions::DimensionResolver;
use super::error::AggregateError;
use super::module_path::{node_index, short_name};
use super::schema::{infer_schema, ColumnDef, TableSchema};
use super::store::{AggregatedRow, ResultStore, StoreWriter};
use crate::parser::{MeasureFilter, ParseError, ParsedFile, ResultFiles};

/// Year used for solar start timestamps when none is configured
pub const DEFAULT_BASE_YEAR: i32 = 2007;

/// Directory of the solar radiation traces referenced by `traceFile=`
pub const DEFAULT_TRACE_DATA_DIR: &str = "PANGEA";

/// Inputs of one aggregation run
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub infolder: PathBuf,
    pub filename: String,
    pub measures: MeasureFilter,
    /// Year of the solar radiation data fed to the simulation
    pub base_year: Option<i32>,
    pub trace_data_dir: String,
    /// Columns to create even if the first file's labels lack them
    pub forced_columns: Vec<ColumnDef>,
}

impl LoadOptions {
    pub fn new(infolder: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            infolder: infolder.into(),
            filename: filename.into(),
            measures: MeasureFilter::all(),
            base_year: None,
            trace_data_dir: DEFAULT_TRACE_DATA_DIR.to_string(),
            forced_columns: Vec::new(),
        }
    }
}

/// What a completed load did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub files: usize,
    pub runs: usize,
    pub rows: usize,
    pub parameter_columns: Vec<String>,
}

/// Parse every results file under `options.infolder` and load it into the store.
pub fn load_from_folder(store: &mut ResultStore, options: &LoadOptions) -> Result<LoadSummary, AggregateError> {
    let files = ResultFiles::open(&options.infolder, &options.filename, &options.measures)?;
    aggregate_files(store, files, options)
}

/// Load already-discovered files. Stops at the first error; nothing is
/// committed unless every file succeeds.
pub fn aggregate_files<I>(
    store: &mut ResultStore,
    files: I,
    options: &LoadOptions,
) -> Result<LoadSummary, AggregateError>
where
    I: IntoIterator<Item = Result<ParsedFile, ParseError>>,
{
    let base_year = options.base_year.unwrap_or_else(|| {
        log::warn!("Using default year for solar radiation - {}", DEFAULT_BASE_YEAR);
        DEFAULT_BASE_YEAR
    });

    let mut resolver = DimensionResolver::new(base_year, options.trace_data_dir.clone());
    let mut writer = store.writer()?;
    let mut summary = LoadSummary::default();

    for parsed in files {
        let parsed = parsed?;

        if writer.schema().is_none() {
            let schema = infer_schema(
                parsed.results.keys().map(|key| key.label.as_str()),
                &options.forced_columns,
            );
            log::info!(
                "Found params {:?}",
                schema.parameter_names().collect::<Vec<_>>()
            );
            summary.parameter_columns = schema.parameter_names().map(str::to_string).collect();
            writer.recreate_table(schema)?;
        }

        summary.runs += load_file(&mut writer, &mut resolver, &parsed)?;
        summary.files += 1;
    }

    summary.rows = writer.commit()?;
    Ok(summary)
}

/// Insert the rows of one parsed file, returning the number of runs
fn load_file(
    writer: &mut StoreWriter<'_>,
    resolver: &mut DimensionResolver,
    parsed: &ParsedFile,
) -> Result<usize, AggregateError> {
    for (key, modules) in &parsed.results {
        let dimensions = resolver.resolve(&key.label)?;

        if let Some(schema) = writer.schema() {
            check_parameter_columns(schema, &dimensions.parameters, parsed, &key.label)?;
        }

        for (module, outputs) in modules {
            let node = node_index(module)?;
            log::trace!("{} node {} module {}", key, node, short_name(module));

            for (simple_output_name, values) in outputs {
                for (indexed_output_name, value) in values {
                    writer.insert(&AggregatedRow {
                        dimensions: &dimensions,
                        repeat: key.repeat,
                        node,
                        simple_output_name,
                        indexed_output_name,
                        value: *value,
                    })?;
                }
            }
        }
    }

    Ok(parsed.results.len())
}

fn check_parameter_columns(
    schema: &TableSchema,
    parameters: &std::collections::BTreeMap<String, String>,
    parsed: &ParsedFile,
    label: &str,
) -> Result<(), AggregateError> {
    match parameters.keys().find(|name| !schema.has_parameter(name)) {
        Some(column) => Err(AggregateError::UnknownParameterColumn {
            file: parsed.path.clone(),
            label: label.to_string(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}
