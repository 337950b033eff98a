//! Data models for captured server state.
//!
//! - [`value`]: closed value type for counters, rows and custom data
//! - [`snapshot`]: one timestamped capture (global status, tables, process list)
//!
//! ```text
//! Snapshot
//!   ├── global:    Variable_name -> Value   (SHOW GLOBAL STATUS)
//!   ├── tables:    "schema.table" -> TableStat
//!   ├── processes: Vec<Row>                 (SHOW PROCESSLIST)
//!   └── custom:    key -> Value             (auxiliary queries)
//! ```

mod snapshot;
mod value;

pub use snapshot::{Snapshot, TableStat};
pub use value::{Row, Value};
