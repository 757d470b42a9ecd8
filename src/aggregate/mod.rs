//! Aggregation of parsed results into a flat SQLite table.
//!
//! Each scalar value becomes one row carrying the run's experimental
//! dimensions (location, climate, protocol, load distribution, solar start
//! time), the swept parameters from its label, the node index, and the
//! output name and sub-key.

pub mod dimensions;
pub mod error;
pub mod label;
pub mod module_path;
pub mod outputs;
pub mod pipeline;
pub mod rules;
pub mod schema;
pub mod store;

pub use dimensions::{DimensionResolver, RunDimensions};
pub use error::AggregateError;
pub use outputs::{collect_outputs, InventoryReport, OutputInventory};
pub use pipeline::{aggregate_files, load_from_folder, LoadOptions, LoadSummary, DEFAULT_BASE_YEAR, DEFAULT_TRACE_DATA_DIR};
pub use schema::{infer_schema, ColumnDef, ColumnType, TableSchema};
pub use store::{AggregatedRow, OutputQuery, ResultStore, StoreWriter, StoredRow};
