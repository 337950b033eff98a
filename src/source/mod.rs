//! Metric source abstraction.
//!
//! A [`MetricSource`] answers a small, closed set of [`MetricQuery`] kinds
//! with rows. Implementations are blocking (the MySQL driver is synchronous);
//! the engine runs every call through [`timeboxed`], which moves it onto the
//! blocking pool and enforces the per-call ceiling.
//!
//! ```text
//!   SnapshotStore / one-shot check
//!            │ timeboxed(query, timeout)
//!     ┌──────▼──────┐
//!     │ MetricSource│ (trait)
//!     └──────┬──────┘
//!      ┌─────┴──────┐
//!  MysqlSource   MockSource
//! ```

pub mod mock;
mod mysql_source;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::model::{Row, Value};

pub use mysql_source::MysqlSource;
pub use mock::MockSource;

/// Queries the engine issues against the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricQuery {
    /// Global status counters; rows carry `Variable_name` and `Value`.
    GlobalStatus,
    /// Per-table size statistics (`information_schema.tables` columns).
    TableStats,
    /// Current sessions (`SHOW PROCESSLIST` columns).
    ProcessList,
    /// Replica status; zero rows on a primary.
    ReplicaStatus,
    /// Server version; one row with a `version` column.
    ServerVersion,
    /// Selected server variables; rows carry `Variable_name` and `Value`.
    GlobalVariables,
}

impl MetricQuery {
    pub fn name(self) -> &'static str {
        match self {
            MetricQuery::GlobalStatus => "global_status",
            MetricQuery::TableStats => "table_stats",
            MetricQuery::ProcessList => "process_list",
            MetricQuery::ReplicaStatus => "replica_status",
            MetricQuery::ServerVersion => "server_version",
            MetricQuery::GlobalVariables => "global_variables",
        }
    }
}

impl fmt::Display for MetricQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for metric source calls.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The server could not be reached (connection refused, dropped, pool exhausted).
    Unavailable(String),
    /// The call did not complete within its time box.
    Timeout { query: &'static str, after: Duration },
    /// The server rejected the statement.
    Query(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {}", msg),
            SourceError::Timeout { query, after } => {
                write!(f, "{} timed out after {:.1}s", query, after.as_secs_f64())
            }
            SourceError::Query(msg) => write!(f, "query error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

/// A capability that answers metric queries.
///
/// Implementations must return `Ok(vec![])` for a query that succeeded with
/// no rows, and reserve errors for unavailable servers and failed statements.
/// `timeout` is a hint for driver-level timeouts; the hard ceiling is applied
/// by [`timeboxed`].
pub trait MetricSource: Send + Sync {
    fn query(&self, query: MetricQuery, timeout: Duration) -> Result<Vec<Row>, SourceError>;
}

/// Runs a blocking source call on the blocking pool, bounded by `timeout`.
///
/// On expiry the caller gets [`SourceError::Timeout`] immediately; the
/// blocking call is left to finish on its own thread and its result dropped.
pub async fn timeboxed<T, F>(label: &'static str, timeout: Duration, f: F) -> Result<T, SourceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SourceError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(SourceError::Unavailable(format!("{} task failed: {}", label, e))),
        Err(_) => Err(SourceError::Timeout {
            query: label,
            after: timeout,
        }),
    }
}

/// Time-boxed [`MetricSource::query`].
pub async fn query_timeboxed(
    source: Arc<dyn MetricSource>,
    query: MetricQuery,
    timeout: Duration,
) -> Result<Vec<Row>, SourceError> {
    timeboxed(query.name(), timeout, move || source.query(query, timeout)).await
}

/// Fetches the server version string.
pub async fn server_version(
    source: Arc<dyn MetricSource>,
    timeout: Duration,
) -> Result<String, SourceError> {
    let rows = query_timeboxed(source, MetricQuery::ServerVersion, timeout).await?;
    rows.first()
        .and_then(|row| row.get("version"))
        .map(|v| v.to_string())
        .ok_or_else(|| SourceError::Query("version query returned no rows".to_string()))
}

/// Turns `Variable_name`/`Value` rows into a counter map.
///
/// Text values are classified with [`Value::from_text`]; rows without a
/// variable name are skipped.
pub fn status_map(rows: &[Row]) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    for row in rows {
        let Some(name) = row.get("Variable_name").and_then(Value::as_str) else {
            continue;
        };
        let value = match row.get("Value") {
            Some(Value::Text(raw)) => Value::from_text(raw),
            Some(other) => other.clone(),
            None => Value::Null,
        };
        out.insert(name.to_string(), value);
    }
    out
}

/// Builds a `Variable_name`/`Value` row.
pub fn status_row(name: &str, value: &str) -> Row {
    let mut row = Row::new();
    row.insert("Variable_name".to_string(), Value::Text(name.to_string()));
    row.insert("Value".to_string(), Value::Text(value.to_string()));
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_map_classifies_values() {
        let rows = vec![
            status_row("Questions", "1500"),
            status_row("Innodb_buffer_pool_dump_status", "Dumping of buffer pool not started"),
        ];
        let map = status_map(&rows);
        assert_eq!(map.get("Questions"), Some(&Value::Int(1500)));
        assert!(matches!(
            map.get("Innodb_buffer_pool_dump_status"),
            Some(Value::Text(_))
        ));
    }

    #[test]
    fn status_map_skips_rows_without_name() {
        let mut row = Row::new();
        row.insert("Value".into(), "1".into());
        assert!(status_map(&[row]).is_empty());
    }

    #[tokio::test]
    async fn timeboxed_reports_timeout() {
        let result: Result<(), SourceError> =
            timeboxed("slow", Duration::from_millis(20), || {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .await;
        assert!(matches!(
            result,
            Err(SourceError::Timeout { query: "slow", .. })
        ));
    }

    #[tokio::test]
    async fn timeboxed_passes_errors_through() {
        let result: Result<(), SourceError> = timeboxed("q", Duration::from_secs(1), || {
            Err(SourceError::Query("denied".into()))
        })
        .await;
        assert_eq!(result, Err(SourceError::Query("denied".into())));
    }

    #[tokio::test]
    async fn server_version_reads_first_row() {
        let source: Arc<dyn MetricSource> = Arc::new(MockSource::new().with_version("8.0.36"));
        let version = server_version(source, Duration::from_secs(1)).await.unwrap();
        assert_eq!(version, "8.0.36");
    }
}
