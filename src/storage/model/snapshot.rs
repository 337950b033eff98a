//! Snapshot: one timestamped capture of the server's runtime state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::value::{Row, Value};

/// Size and fragmentation figures for one table.
///
/// Source: `information_schema.tables`. Numeric columns are NULL for views
/// and some storage engines, hence the options.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TableStat {
    pub schema: String,
    pub name: String,
    pub engine: Option<String>,
    pub rows: Option<i64>,
    pub data_length: Option<i64>,
    pub index_length: Option<i64>,
    pub data_free: Option<i64>,
    pub create_time: Option<Value>,
    pub update_time: Option<Value>,
}

impl TableStat {
    /// Builds a table entry from an `information_schema.tables` row.
    ///
    /// Returns `None` when the schema or table name column is missing.
    pub fn from_row(row: &Row) -> Option<Self> {
        let text = |col: &str| row.get(col).and_then(|v| v.as_str()).map(str::to_string);
        let int = |col: &str| row.get(col).and_then(Value::as_i64);
        let time = |col: &str| row.get(col).filter(|v| !v.is_null()).cloned();

        Some(Self {
            schema: text("TABLE_SCHEMA")?,
            name: text("TABLE_NAME")?,
            engine: text("ENGINE"),
            rows: int("TABLE_ROWS"),
            data_length: int("DATA_LENGTH"),
            index_length: int("INDEX_LENGTH"),
            data_free: int("DATA_FREE"),
            create_time: time("CREATE_TIME"),
            update_time: time("UPDATE_TIME"),
        })
    }

    /// Key used in [`Snapshot::tables`].
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Data plus index bytes; missing columns count as zero. Saturates on
    /// corrupt metadata.
    pub fn total_bytes(&self) -> i64 {
        self.data_length
            .unwrap_or(0)
            .saturating_add(self.index_length.unwrap_or(0))
    }
}

/// A complete capture of the server's counters and auxiliary views.
///
/// Immutable once stored; the snapshot store hands out `Arc<Snapshot>`
/// so collectors can read while the next capture is in flight.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Snapshot {
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// `SHOW GLOBAL STATUS` keyed by variable name.
    pub global: BTreeMap<String, Value>,
    /// Table statistics keyed by `schema.table`.
    pub tables: BTreeMap<String, TableStat>,
    /// `SHOW PROCESSLIST` rows in server order.
    pub processes: Vec<Row>,
    /// Results of auxiliary queries (e.g. replica status).
    pub custom: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            global: BTreeMap::new(),
            tables: BTreeMap::new(),
            processes: Vec::new(),
            custom: BTreeMap::new(),
        }
    }

    /// Adds a global status counter from its raw text form.
    pub fn with_counter(mut self, name: &str, raw: &str) -> Self {
        self.global.insert(name.to_string(), Value::from_text(raw));
        self
    }

    /// Adds a table entry.
    pub fn with_table(mut self, stat: TableStat) -> Self {
        self.tables.insert(stat.key(), stat);
        self
    }

    /// Adds a process list row.
    pub fn with_process(mut self, row: Row) -> Self {
        self.processes.push(row);
        self
    }

    /// Numeric value of a global status counter, if present and numeric.
    pub fn counter(&self, name: &str) -> Option<f64> {
        self.global.get(name).and_then(Value::as_f64)
    }

    /// `SHOW GLOBAL VARIABLES` subset captured by the auxiliary query, if any.
    pub fn variables(&self) -> Option<&BTreeMap<String, Value>> {
        self.custom.get("global_variables").and_then(Value::as_map)
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables().and_then(|vars| vars.get(name))
    }

    /// Replica status row captured by the auxiliary query, if any.
    pub fn replica_status(&self) -> Option<&BTreeMap<String, Value>> {
        self.custom.get("replica_status").and_then(Value::as_map)
    }
}
