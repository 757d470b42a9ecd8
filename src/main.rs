use castalia_results::aggregate::{self, OutputQuery, ResultStore, StoredRow};
use castalia_results::config::Config;
use castalia_results::config_loader::{self, CliOverrides};
use castalia_results::runtimes::{self, DEFAULT_GROUP_POSITIONS};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, eyre, Context};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

/// Load Castalia simulation results into SQLite and inspect them
#[derive(Parser, Debug)]
#[command(name = "castalia-results")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides the configuration)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Results table name (overrides the configuration)
    #[arg(long, global = true)]
    table: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse every results file under a folder and (re)load the results table
    Load {
        /// Folder containing the simulation output tree
        #[arg(short, long)]
        infolder: Option<PathBuf>,

        /// Results file name to search for
        #[arg(short, long)]
        file: Option<String>,

        /// Year of the solar radiation data
        #[arg(long)]
        base_year: Option<i32>,

        /// Extra parameter column, as name:TYPE (TEXT or REAL)
        #[arg(long = "force-column")]
        force_columns: Vec<String>,

        /// Output to load, as "name|subkey" ("*" for every sub-key)
        #[arg(long = "measure")]
        measures: Vec<String>,
    },

    /// Print stored rows for one output name
    Query {
        /// Simple output name
        #[arg(short, long)]
        output: String,

        /// Sub-key ("*" for every sub-key)
        #[arg(short, long, default_value = "")]
        sub_key: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the distinct output names found in the results files
    Outputs {
        #[arg(short, long)]
        infolder: PathBuf,

        #[arg(short, long)]
        file: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Summarise simulation run times from castalia.log files
    Runtimes {
        #[arg(short, long)]
        infolder: PathBuf,

        /// Label token positions to group runs by
        #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_GROUP_POSITIONS.to_vec())]
        group: Vec<usize>,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&cli.log_level)).init();

    let mut config = config_loader::load_or_default(cli.config.as_deref())?;
    let mut overrides = CliOverrides {
        database: cli.database.clone(),
        table: cli.table.clone(),
        ..Default::default()
    };

    match cli.command {
        Commands::Load {
            infolder,
            file,
            base_year,
            force_columns,
            measures,
        } => {
            overrides.infolder = infolder;
            overrides.results_file = file;
            overrides.base_year = base_year;
            overrides.force_columns = force_columns;
            overrides.measures = measures;
            config_loader::apply_overrides(&mut config, &overrides)?;
            run_load(&config)
        }
        Commands::Query { output, sub_key, json } => {
            config_loader::apply_overrides(&mut config, &overrides)?;
            run_query(&config, &output, &sub_key, json)
        }
        Commands::Outputs { infolder, file, json } => {
            overrides.results_file = file;
            config_loader::apply_overrides(&mut config, &overrides)?;
            let inventory = aggregate::collect_outputs(&infolder, &config.results_file)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&inventory.report())?);
            } else {
                print!("{}", inventory.render_text());
            }
            Ok(())
        }
        Commands::Runtimes { infolder, group, json } => {
            let summaries = runtimes::analyse_run_times(&infolder, &group)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                print!("{}", runtimes::render_table(&summaries));
            }
            Ok(())
        }
    }
}

fn run_load(config: &Config) -> Result<()> {
    let options = config
        .load_options()
        .ok_or_else(|| eyre!("No input folder given (use --infolder or set infolder in the configuration)"))?;

    info!("Results folder: {:?}", options.infolder);
    info!("Database: {:?} table {}", config.database, config.table);

    let mut store = ResultStore::open(&config.database, &config.table)
        .with_context(|| format!("Failed to open database {}", config.database.display()))?;
    let summary = aggregate::load_from_folder(&mut store, &options)?;

    println!("Files loaded:       {}", summary.files);
    println!("Runs:               {}", summary.runs);
    println!("Rows inserted:      {}", summary.rows);
    println!("Parameter columns:  {}", summary.parameter_columns.join(", "));
    Ok(())
}

fn run_query(config: &Config, output: &str, sub_key: &str, json: bool) -> Result<()> {
    let store = ResultStore::open(&config.database, &config.table)?;
    if !store.table_exists()? {
        bail!("Table {} does not exist in {}", config.table, config.database.display());
    }

    let rows = store.query(&OutputQuery::new(output, sub_key))?;
    info!("{} rows for {}|{}", rows.len(), output, sub_key);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print_rows(&rows);
    }
    Ok(())
}

fn print_rows(rows: &[StoredRow]) {
    for row in rows {
        let value = row
            .value
            .map(|v| v.to_string())
            .unwrap_or_else(|| "NULL".to_string());
        let parameters: Vec<String> = row
            .parameters
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!(
            "{}\t{}\t{}\t{}\t{} {}\trepeat {}\tnode {}\t{}|{}\t{}\t{}",
            row.location,
            row.climate,
            row.protocol,
            row.loaddistribution,
            row.monthname,
            row.datetime,
            row.repeat,
            row.node,
            row.simple_output_name,
            row.indexed_output_name,
            value,
            parameters.join(",")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "castalia-results",
            "--database", "energy.db",
            "load",
            "-i", "/runs",
            "--base-year", "2008",
            "--force-column", "batchP:TEXT",
            "--measure", "Energy breakdown|Harvested",
        ]);

        assert_eq!(cli.database, Some(PathBuf::from("energy.db")));
        assert_eq!(cli.log_level, "info");
        match cli.command {
            Commands::Load {
                infolder,
                base_year,
                force_columns,
                measures,
                ..
            } => {
                assert_eq!(infolder, Some(PathBuf::from("/runs")));
                assert_eq!(base_year, Some(2008));
                assert_eq!(force_columns, vec!["batchP:TEXT"]);
                assert_eq!(measures, vec!["Energy breakdown|Harvested"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_query_defaults_to_unnamed_sub_key() {
        let cli = Cli::parse_from(["castalia-results", "query", "--output", "Consumed Energy"]);
        match cli.command {
            Commands::Query { output, sub_key, json } => {
                assert_eq!(output, "Consumed Energy");
                assert_eq!(sub_key, "");
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_runtimes_group_positions() {
        let cli = Cli::parse_from(["castalia-results", "runtimes", "-i", "logs"]);
        match cli.command {
            Commands::Runtimes { group, .. } => assert_eq!(group, vec![0, 7, 8]),
            other => panic!("unexpected command {:?}", other),
        }

        let cli = Cli::parse_from(["castalia-results", "runtimes", "-i", "logs", "--group", "0,2"]);
        match cli.command {
            Commands::Runtimes { group, .. } => assert_eq!(group, vec![0, 2]),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
