//! Table schema inference.
//!
//! The parameter columns of the results table are decided once, from the
//! labels of the first results file plus any columns the caller forces.
//! This is a pure function of its inputs; the store only executes the
//! resulting definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::label::{Label, BATCH_P_PARAM, TRACE_FILE_PARAM};
use crate::utils::sql::quote_ident;

/// SQLite column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Real,
    Integer,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Real => "REAL",
            ColumnType::Integer => "INTEGER",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TEXT" => Ok(ColumnType::Text),
            "REAL" => Ok(ColumnType::Real),
            "INTEGER" => Ok(ColumnType::Integer),
            other => Err(format!("Unknown column type {} (expected TEXT, REAL or INTEGER)", other)),
        }
    }
}

/// A named column definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Dimension and value columns present in every results table, in order
pub const FIXED_COLUMNS: &[(&str, ColumnType)] = &[
    ("location", ColumnType::Text),
    ("climate", ColumnType::Text),
    ("protocol", ColumnType::Text),
    ("loaddistribution", ColumnType::Text),
    ("datetime", ColumnType::Integer),
    ("monthnumber", ColumnType::Integer),
    ("monthname", ColumnType::Text),
    ("repeat", ColumnType::Integer),
    ("node", ColumnType::Integer),
    ("simpleOutputName", ColumnType::Text),
    ("indexedOutputName", ColumnType::Text),
    ("value", ColumnType::Real),
];

/// Column type for a discovered parameter: batch probabilities carry
/// compound values and are stored as text, everything else as numbers
pub fn parameter_column_type(name: &str) -> ColumnType {
    if name == BATCH_P_PARAM {
        ColumnType::Text
    } else {
        ColumnType::Real
    }
}

/// Parameter columns of a results table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    /// Sorted by name, which is also the column order
    parameters: BTreeMap<String, ColumnType>,
}

impl TableSchema {
    pub fn parameters(&self) -> &BTreeMap<String, ColumnType> {
        &self.parameters
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(|k| k.as_str())
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Every column in table order
    pub fn columns(&self) -> Vec<ColumnDef> {
        FIXED_COLUMNS
            .iter()
            .map(|(name, ty)| ColumnDef::new(*name, *ty))
            .chain(
                self.parameters
                    .iter()
                    .map(|(name, ty)| ColumnDef::new(name.clone(), *ty)),
            )
            .collect()
    }

    /// `CREATE TABLE` statement for this schema
    pub fn create_table_sql(&self, table: &str) -> String {
        let columns: Vec<String> = self
            .columns()
            .iter()
            .map(|c| format!("{} {}", quote_ident(&c.name), c.column_type))
            .collect();
        format!("CREATE TABLE {} ({})", quote_ident(table), columns.join(", "))
    }
}

/// Infer the table schema from run labels and forced extra columns.
///
/// Every `name=value` token names a parameter column, except the trace
/// file, which is folded into the location. Forced columns are added with
/// their declared type unless the labels already provide them.
pub fn infer_schema<'a, I>(labels: I, forced: &[ColumnDef]) -> TableSchema
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parameters = BTreeMap::new();

    for raw in labels {
        let label = Label::parse(raw);
        for name in label.parameter_names() {
            if name == TRACE_FILE_PARAM {
                continue;
            }
            parameters
                .entry(name.to_string())
                .or_insert_with(|| parameter_column_type(name));
        }
    }

    for column in forced {
        if !parameters.contains_key(&column.name) {
            parameters.insert(column.name.clone(), column.column_type);
        }
    }

    TableSchema { parameters }
}
