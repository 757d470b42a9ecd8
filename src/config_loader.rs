use crate::aggregate::ColumnDef;
use crate::config::{Config, Measure};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<Config> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)?;
    let config: Config = serde_yaml::from_reader(file)?;

    config.validate()?;

    Ok(config)
}

/// Load the configuration file if one was given, defaults otherwise
pub fn load_or_default(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

/// CLI arguments that override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub infolder: Option<PathBuf>,
    pub results_file: Option<String>,
    pub database: Option<PathBuf>,
    pub table: Option<String>,
    pub base_year: Option<i32>,
    /// `name:TYPE` entries
    pub force_columns: Vec<String>,
    /// `name|subkey` entries; replace the configured measures when present
    pub measures: Vec<String>,
}

/// Parse a `name:TYPE` forced column argument
pub fn parse_forced_column(arg: &str) -> Result<ColumnDef> {
    let (name, ty) = arg
        .split_once(':')
        .ok_or_else(|| eyre!("Forced column {:?} must be written name:TYPE", arg))?;
    let column_type = ty.parse().map_err(|e: String| eyre!(e))?;
    Ok(ColumnDef::new(name, column_type))
}

/// Apply CLI overrides to a configuration
pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) -> Result<()> {
    if let Some(infolder) = &overrides.infolder {
        config.infolder = Some(infolder.clone());
    }
    if let Some(results_file) = &overrides.results_file {
        config.results_file = results_file.clone();
    }
    if let Some(database) = &overrides.database {
        config.database = database.clone();
    }
    if let Some(table) = &overrides.table {
        config.table = table.clone();
    }
    if let Some(year) = overrides.base_year {
        config.base_year = Some(year);
    }

    for arg in &overrides.force_columns {
        let column = parse_forced_column(arg)?;
        config.forced_columns.retain(|c| c.name != column.name);
        config.forced_columns.push(column);
    }

    if !overrides.measures.is_empty() {
        info!("Using {} measures from the command line", overrides.measures.len());
        config.measures = overrides.measures.iter().map(|m| Measure::parse(m)).collect();
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}
