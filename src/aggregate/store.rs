//! SQLite-backed results table.
//!
//! A load runs inside a single transaction: the table is dropped and
//! recreated, every row is inserted, and the transaction is committed once.
//! If anything fails before [`StoreWriter::commit`] the transaction is rolled
//! back and the previous table is left untouched.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Transaction};
use serde::Serialize;

use super::dimensions::RunDimensions;
use super::error::AggregateError;
use super::schema::{TableSchema, FIXED_COLUMNS};
use crate::parser::SubKeyPattern;
use crate::utils::sql::{is_plain_identifier, quote_ident};

/// One flattened output value, ready to insert
#[derive(Debug, Clone, Copy)]
pub struct AggregatedRow<'a> {
    pub dimensions: &'a RunDimensions,
    pub repeat: i64,
    pub node: i64,
    pub simple_output_name: &'a str,
    pub indexed_output_name: &'a str,
    pub value: f64,
}

/// Row read back from the results table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRow {
    pub location: String,
    pub climate: String,
    pub protocol: String,
    pub loaddistribution: String,
    pub datetime: i64,
    pub monthnumber: i64,
    pub monthname: String,
    pub repeat: i64,
    pub node: i64,
    #[serde(rename = "simpleOutputName")]
    pub simple_output_name: String,
    #[serde(rename = "indexedOutputName")]
    pub indexed_output_name: String,
    /// NaN values are stored by SQLite as NULL
    pub value: Option<f64>,
    /// Parameter columns; NULL where the run did not set the parameter
    pub parameters: BTreeMap<String, serde_json::Value>,
}

/// Selection of rows by output name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputQuery {
    pub simple_output_name: String,
    pub indexed_output_name: SubKeyPattern,
}

impl OutputQuery {
    /// `sub_key` of `"*"` selects every sub-key of the output
    pub fn new(simple_output_name: impl Into<String>, sub_key: &str) -> Self {
        Self {
            simple_output_name: simple_output_name.into(),
            indexed_output_name: SubKeyPattern::parse(sub_key),
        }
    }
}

/// Handle on the results database and its table
pub struct ResultStore {
    conn: Connection,
    table: String,
}

impl ResultStore {
    /// Open (or create) the database file
    pub fn open(path: &Path, table: &str) -> Result<Self, AggregateError> {
        check_table_name(table)?;
        let conn = Connection::open(path)?;
        log::debug!("Opened results database {}", path.display());
        Ok(Self {
            conn,
            table: table.to_string(),
        })
    }

    pub fn open_in_memory(table: &str) -> Result<Self, AggregateError> {
        check_table_name(table)?;
        Ok(Self {
            conn: Connection::open_in_memory()?,
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Start a load. Nothing is visible to readers until it is committed.
    pub fn writer(&mut self) -> Result<StoreWriter<'_>, AggregateError> {
        let tx = self.conn.transaction()?;
        Ok(StoreWriter {
            tx,
            table: self.table.clone(),
            schema: None,
            rows: 0,
        })
    }

    pub fn table_exists(&self) -> Result<bool, AggregateError> {
        table_exists(&self.conn, &self.table)
    }

    /// Column names of the table, in order
    pub fn columns(&self) -> Result<Vec<String>, AggregateError> {
        let sql = format!("PRAGMA table_info({})", quote_ident(&self.table));
        let mut stmt = self.conn.prepare(&sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn row_count(&self) -> Result<usize, AggregateError> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Rows matching an output name and sub-key (or every sub-key)
    pub fn query(&self, query: &OutputQuery) -> Result<Vec<StoredRow>, AggregateError> {
        let mut sql = format!(
            "SELECT * FROM {} WHERE {} = ?1",
            quote_ident(&self.table),
            quote_ident("simpleOutputName")
        );
        let mut bound = vec![Value::Text(query.simple_output_name.clone())];
        if let SubKeyPattern::Exact(sub_key) = &query.indexed_output_name {
            sql.push_str(&format!(" AND {} = ?2", quote_ident("indexedOutputName")));
            bound.push(Value::Text(sub_key.clone()));
        }
        sql.push_str(" ORDER BY rowid");
        log::debug!("{}", sql);

        let mut stmt = self.conn.prepare(&sql)?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let parameter_columns: Vec<(usize, String)> = column_names
            .into_iter()
            .enumerate()
            .filter(|(_, name)| !FIXED_COLUMNS.iter().any(|(fixed, _)| fixed == name))
            .collect();

        let rows = stmt.query_map(params_from_iter(bound.iter()), |row| {
            let mut parameters = BTreeMap::new();
            for (idx, name) in &parameter_columns {
                parameters.insert(name.clone(), to_json(row.get::<_, Value>(*idx)?));
            }
            Ok(StoredRow {
                location: row.get("location")?,
                climate: row.get("climate")?,
                protocol: row.get("protocol")?,
                loaddistribution: row.get("loaddistribution")?,
                datetime: row.get("datetime")?,
                monthnumber: row.get("monthnumber")?,
                monthname: row.get("monthname")?,
                repeat: row.get("repeat")?,
                node: row.get("node")?,
                simple_output_name: row.get("simpleOutputName")?,
                indexed_output_name: row.get("indexedOutputName")?,
                value: row.get("value")?,
                parameters,
            })
        })?;

        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

/// An open load transaction
pub struct StoreWriter<'c> {
    tx: Transaction<'c>,
    table: String,
    schema: Option<TableSchema>,
    rows: usize,
}

impl StoreWriter<'_> {
    /// Drop the table if it exists and create it with `schema`
    pub fn recreate_table(&mut self, schema: TableSchema) -> Result<(), AggregateError> {
        if table_exists(&self.tx, &self.table)? {
            log::info!("Dropping table {}", self.table);
            self.tx
                .execute_batch(&format!("DROP TABLE {}", quote_ident(&self.table)))?;
        }

        let sql = schema.create_table_sql(&self.table);
        log::info!("Creating table {}", self.table);
        log::debug!("{}", sql);
        self.tx.execute_batch(&sql)?;

        self.schema = Some(schema);
        Ok(())
    }

    pub fn schema(&self) -> Option<&TableSchema> {
        self.schema.as_ref()
    }

    /// Insert one row. Parameter values are bound as text and converted by
    /// the column's declared type.
    pub fn insert(&mut self, row: &AggregatedRow<'_>) -> Result<(), AggregateError> {
        let dims = row.dimensions;

        let mut columns: Vec<&str> = FIXED_COLUMNS.iter().map(|(name, _)| *name).collect();
        columns.extend(dims.parameters.keys().map(|k| k.as_str()));

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table),
            quoted.join(", "),
            placeholders.join(", ")
        );

        let mut values = vec![
            Value::Text(dims.location.clone()),
            Value::Text(dims.climate.clone()),
            Value::Text(dims.protocol.clone()),
            Value::Text(dims.load_distribution.clone()),
            Value::Integer(dims.datetime),
            Value::Integer(dims.month_number as i64),
            Value::Text(dims.month_name.clone()),
            Value::Integer(row.repeat),
            Value::Integer(row.node),
            Value::Text(row.simple_output_name.to_string()),
            Value::Text(row.indexed_output_name.to_string()),
            Value::Real(row.value),
        ];
        values.extend(dims.parameters.values().map(|v| Value::Text(v.clone())));

        let mut stmt = self.tx.prepare_cached(&sql)?;
        stmt.execute(params_from_iter(values.iter()))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows inserted so far
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Commit the load, returning the number of rows inserted
    pub fn commit(self) -> Result<usize, AggregateError> {
        self.tx.commit()?;
        log::info!("Committed {} rows to {}", self.rows, self.table);
        Ok(self.rows)
    }
}

fn check_table_name(table: &str) -> Result<(), AggregateError> {
    if is_plain_identifier(table) {
        Ok(())
    } else {
        Err(AggregateError::InvalidIdentifier(table.to_string()))
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, AggregateError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => serde_json::Value::from(i),
        Value::Real(f) => serde_json::Value::from(f),
        Value::Text(s) => serde_json::Value::from(s),
        Value::Blob(b) => serde_json::Value::from(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::schema::{infer_schema, ColumnDef, ColumnType};

    fn dims(parameters: &[(&str, &str)]) -> RunDimensions {
        RunDimensions {
            location: "LER".to_string(),
            climate: "Cfb".to_string(),
            protocol: "CtpRicer".to_string(),
            load_distribution: "Uniform".to_string(),
            datetime: 0,
            month_number: 0,
            month_name: "Unknown".to_string(),
            parameters: parameters
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn row<'a>(dims: &'a RunDimensions, output: &'a str, sub_key: &'a str, value: f64) -> AggregatedRow<'a> {
        AggregatedRow {
            dimensions: dims,
            repeat: 0,
            node: 3,
            simple_output_name: output,
            indexed_output_name: sub_key,
            value,
        }
    }

    #[test]
    fn test_insert_and_query() {
        let mut store = ResultStore::open_in_memory("results").unwrap();
        let d = dims(&[("batchP", "0.3"), ("cellSize", "2")]);

        let mut writer = store.writer().unwrap();
        writer
            .recreate_table(infer_schema(vec!["CtpRicer,cellSize=2,batchP=0.3"], &[]))
            .unwrap();
        writer.insert(&row(&d, "Energy breakdown", "Harvested", 1.5)).unwrap();
        writer.insert(&row(&d, "Energy breakdown", "Initial", 1.08e7)).unwrap();
        writer.insert(&row(&d, "Disabled time %", "", 0.25)).unwrap();
        assert_eq!(writer.commit().unwrap(), 3);

        let harvested = store.query(&OutputQuery::new("Energy breakdown", "Harvested")).unwrap();
        assert_eq!(harvested.len(), 1);
        assert_eq!(harvested[0].value, Some(1.5));
        assert_eq!(harvested[0].node, 3);
        assert_eq!(harvested[0].parameters["cellSize"], serde_json::json!(2.0));
        assert_eq!(harvested[0].parameters["batchP"], serde_json::json!("0.3"));

        let all = store.query(&OutputQuery::new("Energy breakdown", "*")).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(store.row_count().unwrap(), 3);
    }

    #[test]
    fn test_uncommitted_writer_rolls_back() {
        let mut store = ResultStore::open_in_memory("results").unwrap();
        let d = dims(&[]);

        {
            let mut writer = store.writer().unwrap();
            writer.recreate_table(infer_schema(Vec::<&str>::new(), &[])).unwrap();
            writer.insert(&row(&d, "TXed pkts", "TX pkts", 4.0)).unwrap();
            writer.commit().unwrap();
        }
        {
            let mut writer = store.writer().unwrap();
            writer.recreate_table(infer_schema(Vec::<&str>::new(), &[])).unwrap();
            // dropped without commit
        }

        assert_eq!(store.row_count().unwrap(), 1);
    }

    #[test]
    fn test_insert_unknown_column_fails() {
        let mut store = ResultStore::open_in_memory("results").unwrap();
        let d = dims(&[("batchP", "0.3")]);

        let mut writer = store.writer().unwrap();
        writer
            .recreate_table(infer_schema(vec!["CtpRicer,cellSize=2"], &[]))
            .unwrap();
        assert!(matches!(
            writer.insert(&row(&d, "TXed pkts", "TX pkts", 4.0)),
            Err(AggregateError::Store(_))
        ));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        assert!(matches!(
            ResultStore::open_in_memory("results; DROP TABLE x"),
            Err(AggregateError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_columns_follow_schema() {
        let mut store = ResultStore::open_in_memory("results").unwrap();
        let forced = vec![ColumnDef::new("batchP", ColumnType::Text)];

        let mut writer = store.writer().unwrap();
        writer
            .recreate_table(infer_schema(vec!["CtpRicer,cellSize=2"], &forced))
            .unwrap();
        writer.commit().unwrap();

        let columns = store.columns().unwrap();
        assert_eq!(columns.len(), FIXED_COLUMNS.len() + 2);
        assert_eq!(&columns[columns.len() - 2..], &["batchP".to_string(), "cellSize".to_string()]);
        assert!(store.table_exists().unwrap());
    }
}
