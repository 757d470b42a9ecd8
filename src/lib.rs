//! # Castalia results - Loading Castalia simulation output into SQLite
//!
//! This library parses the text results files written by the Castalia
//! wireless sensor network simulator and flattens them into a single
//! SQLite table for later analysis.
//!
//! ## Overview
//!
//! A simulation campaign produces one `results.txt` per batch of runs. Each
//! file holds, per run label and repeat, the scalar outputs and histograms
//! reported by every module of every node. The run label encodes the
//! experimental dimensions (protocol, location, load distribution) and the
//! swept parameters (`cellSize=2,capSize=40,...`).
//!
//! ## Architecture
//!
//! - `parser`: line-oriented results file parser and file discovery
//! - `aggregate`: dimension extraction, schema inference, and the SQLite store
//! - `config`: YAML configuration structures and validation
//! - `config_loader`: configuration loading and CLI overrides
//! - `runtimes`: run-time summary over simulator logs
//! - `utils`: SQL identifier helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use castalia_results::aggregate::{load_from_folder, LoadOptions, ResultStore};
//!
//! let mut store = ResultStore::open(Path::new("castalia-results.db"), "results")?;
//! let mut options = LoadOptions::new("simulations/lerwick", "results.txt");
//! options.base_year = Some(2007);
//!
//! let summary = load_from_folder(&mut store, &options)?;
//! println!("Loaded {} rows from {} files", summary.rows, summary.files);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! database: castalia-results.db
//! table: results
//! results_file: results.txt
//! base_year: 2007
//! measures:
//!   - output: "Energy breakdown"
//!     sub_key: "*"
//!   - output: "Consumed Energy"
//! forced_columns:
//!   - name: batchP
//!     type: TEXT
//! ```

pub mod aggregate;
pub mod config;
pub mod config_loader;
pub mod parser;
pub mod runtimes;
pub mod utils;
