//! Snapshot model and bounded in-memory history.

pub mod model;
pub mod store;

pub use model::{Row, Snapshot, TableStat, Value};
pub use store::{CaptureError, CaptureStage, SnapshotStore};
