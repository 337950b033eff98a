//! Metric collectors.
//!
//! Two kinds, one trait each:
//! - [`Classifier`]: classifies a single [`Snapshot`](crate::storage::Snapshot)
//! - [`DeltaClassifier`]: turns two time-separated [`RawSample`]s into rates
//!
//! Built-in collectors, in registration (and report) order:
//!
//! | name          | kind      | reads                          |
//! |---------------|-----------|--------------------------------|
//! | `base`        | stateless | `Uptime`                       |
//! | `connection`  | stateless | `Threads_*`, aborted/errors    |
//! | `buffer_pool` | stateless | `Innodb_buffer_pool_*`         |
//! | `replication` | stateless | replica status query           |
//! | `table_space` | stateless | table statistics               |
//! | `sessions`    | stateless | process list                   |
//! | `slow_query`  | stateless | server variables query         |
//! | `performance` | delta     | `Questions`, `Com_*`, `Bytes_*`|

pub mod base;
pub mod buffer_pool;
pub mod connection;
pub mod performance;
pub mod registry;
pub mod replication;
pub mod sessions;
pub mod slow_query;
pub mod table_space;
mod traits;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::health::HealthLevel;
use crate::storage::Snapshot;

pub use registry::CollectorRegistry;
pub use traits::{Classifier, CollectorKind, DeltaClassifier, RawSample, RegisteredCollector};

/// Marks a metric that was expected but not collected. Never compared
/// against a threshold.
pub const UNAVAILABLE: f64 = -1.0;

/// Output of one collector invocation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CollectorResult {
    pub name: String,
    pub metrics: BTreeMap<String, f64>,
    pub level: HealthLevel,
    pub message: String,
}

impl CollectorResult {
    /// Empty OK result.
    pub fn ok(name: &str) -> Self {
        Self {
            name: name.to_string(),
            metrics: BTreeMap::new(),
            level: HealthLevel::Ok,
            message: String::new(),
        }
    }

    /// Neutral result for a delta collector that has no earlier sample yet.
    pub fn no_data(name: &str) -> Self {
        Self::ok(name).with_message("no data yet")
    }

    /// OK result pre-filled with global status counters; keys the snapshot
    /// lacks (or holds as non-numeric text) get the sentinel.
    pub fn with_expected(name: &str, snapshot: &Snapshot, keys: &[&str]) -> Self {
        let mut result = Self::ok(name);
        for key in keys {
            result.set_opt(key, snapshot.counter(key));
        }
        result
    }

    /// Records a metric. Non-finite values become the sentinel.
    pub fn set(&mut self, key: &str, value: f64) {
        let value = if value.is_finite() { value } else { UNAVAILABLE };
        self.metrics.insert(key.to_string(), value);
    }

    pub fn set_opt(&mut self, key: &str, value: Option<f64>) {
        self.set(key, value.unwrap_or(UNAVAILABLE));
    }

    /// Metric value, `None` when missing or unavailable.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics
            .get(key)
            .copied()
            .filter(|v| *v != UNAVAILABLE)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Raises the level (never lowers it) and appends `message`.
    pub fn raise(&mut self, level: HealthLevel, message: impl AsRef<str>) {
        self.level = self.level.max(level);
        let message = message.as_ref();
        if message.is_empty() {
            return;
        }
        if !self.message.is_empty() {
            self.message.push_str("; ");
        }
        self.message.push_str(message);
    }
}
