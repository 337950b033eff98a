//! Scripted in-memory metric source for testing.
//!
//! `MockSource` serves canned rows per [`MetricQuery`]. Global status can be
//! scripted as a sequence of frames: each call consumes the next frame and
//! the last frame repeats, which lets tests drive counters forward between
//! captures. Failures and delays can be injected per query kind.
//!
//! ```
//! use std::time::Duration;
//! use mysql_inspector::source::{MetricQuery, MetricSource, MockSource};
//!
//! let source = MockSource::healthy_primary();
//! let rows = source.query(MetricQuery::GlobalStatus, Duration::from_secs(1)).unwrap();
//! assert!(!rows.is_empty());
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{MetricQuery, MetricSource, SourceError, status_row};
use crate::storage::model::{Row, Value};

#[derive(Default)]
struct MockState {
    status_frames: VecDeque<Vec<(String, String)>>,
    tables: Vec<Row>,
    processes: Vec<Row>,
    replica: Vec<Row>,
    variables: Vec<Row>,
    version: Option<String>,
    failures: BTreeMap<MetricQuery, SourceError>,
    fail_after: BTreeMap<MetricQuery, (usize, SourceError)>,
    delays: BTreeMap<MetricQuery, Duration>,
    calls: BTreeMap<MetricQuery, usize>,
}

/// In-memory [`MetricSource`] with scripted responses.
#[derive(Default)]
pub struct MockSource {
    state: Mutex<MockState>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one global status frame.
    pub fn with_status(self, pairs: &[(&str, &str)]) -> Self {
        self.push_status(pairs);
        self
    }

    /// Appends one global status frame through a shared reference.
    pub fn push_status(&self, pairs: &[(&str, &str)]) {
        let frame = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.lock().status_frames.push_back(frame);
    }

    pub fn with_table(self, schema: &str, name: &str, data: i64, index: i64, free: i64) -> Self {
        let mut row = Row::new();
        row.insert("TABLE_SCHEMA".into(), schema.into());
        row.insert("TABLE_NAME".into(), name.into());
        row.insert("ENGINE".into(), "InnoDB".into());
        row.insert("TABLE_ROWS".into(), Value::Int(0));
        row.insert("DATA_LENGTH".into(), Value::Int(data));
        row.insert("INDEX_LENGTH".into(), Value::Int(index));
        row.insert("DATA_FREE".into(), Value::Int(free));
        row.insert("CREATE_TIME".into(), Value::Null);
        row.insert("UPDATE_TIME".into(), Value::Null);
        self.lock().tables.push(row);
        self
    }

    pub fn with_process(self, id: i64, command: &str, time_secs: i64) -> Self {
        let mut row = Row::new();
        row.insert("Id".into(), Value::Int(id));
        row.insert("User".into(), "app".into());
        row.insert("Command".into(), command.into());
        row.insert("Time".into(), Value::Int(time_secs));
        row.insert("State".into(), Value::Null);
        self.lock().processes.push(row);
        self
    }

    /// Sets the replica status row (columns as text, like the server sends them).
    pub fn with_replica(self, columns: &[(&str, &str)]) -> Self {
        let row = columns
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Text(v.to_string())))
            .collect();
        self.lock().replica = vec![row];
        self
    }

    /// Sets the server variables returned for [`MetricQuery::GlobalVariables`].
    pub fn with_variables(self, pairs: &[(&str, &str)]) -> Self {
        self.lock().variables = pairs.iter().map(|(k, v)| status_row(k, v)).collect();
        self
    }

    pub fn with_version(self, version: &str) -> Self {
        self.lock().version = Some(version.to_string());
        self
    }

    /// Makes every call of `query` fail with `error`.
    pub fn fail_on(self, query: MetricQuery, error: SourceError) -> Self {
        self.set_failure(query, Some(error));
        self
    }

    /// Installs or clears a failure through a shared reference.
    pub fn set_failure(&self, query: MetricQuery, error: Option<SourceError>) {
        let mut state = self.lock();
        match error {
            Some(e) => state.failures.insert(query, e),
            None => state.failures.remove(&query),
        };
    }

    /// Lets the first `successes` calls of `query` through, then fails every
    /// later one with `error`.
    pub fn fail_after(self, query: MetricQuery, successes: usize, error: SourceError) -> Self {
        self.lock().fail_after.insert(query, (successes, error));
        self
    }

    /// Makes every call of `query` block for `delay` before answering.
    pub fn delay_on(self, query: MetricQuery, delay: Duration) -> Self {
        self.lock().delays.insert(query, delay);
        self
    }

    /// Number of calls received for `query`.
    pub fn calls(&self, query: MetricQuery) -> usize {
        self.lock().calls.get(&query).copied().unwrap_or(0)
    }

    fn next_status(state: &mut MockState) -> Vec<Row> {
        let frame = if state.status_frames.len() > 1 {
            state.status_frames.pop_front().unwrap_or_default()
        } else {
            state.status_frames.front().cloned().unwrap_or_default()
        };
        frame.iter().map(|(k, v)| status_row(k, v)).collect()
    }
}

impl MetricSource for MockSource {
    fn query(&self, query: MetricQuery, _timeout: Duration) -> Result<Vec<Row>, SourceError> {
        let delay = {
            let mut state = self.lock();
            *state.calls.entry(query).or_insert(0) += 1;
            state.delays.get(&query).copied()
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut state = self.lock();
        if let Some(err) = state.failures.get(&query) {
            return Err(err.clone());
        }
        let seen = state.calls.get(&query).copied().unwrap_or(0);
        if let Some((successes, err)) = state.fail_after.get(&query)
            && seen > *successes
        {
            return Err(err.clone());
        }
        let rows = match query {
            MetricQuery::GlobalStatus => Self::next_status(&mut state),
            MetricQuery::TableStats => state.tables.clone(),
            MetricQuery::ProcessList => state.processes.clone(),
            MetricQuery::ReplicaStatus => state.replica.clone(),
            MetricQuery::GlobalVariables => state.variables.clone(),
            MetricQuery::ServerVersion => match &state.version {
                Some(v) => {
                    let mut row = Row::new();
                    row.insert("version".into(), Value::Text(v.clone()));
                    vec![row]
                }
                None => Vec::new(),
            },
        };
        Ok(rows)
    }
}

// ============================================================
// Scenarios
// ============================================================

impl MockSource {
    /// A long-running primary with a warm buffer pool and light load.
    pub fn healthy_primary() -> Self {
        Self::new()
            .with_version("8.0.36")
            .with_variables(&[("slow_query_log", "ON"), ("long_query_time", "1.000000")])
            .with_status(&[
                ("Uptime", "864000"),
                ("Questions", "1000"),
                ("Com_commit", "10"),
                ("Com_rollback", "0"),
                ("Slow_queries", "0"),
                ("Bytes_sent", "500000"),
                ("Bytes_received", "100000"),
                ("Threads_connected", "12"),
                ("Threads_running", "2"),
                ("Max_used_connections", "40"),
                ("Aborted_connects", "1"),
                ("Connection_errors_internal", "0"),
                ("Innodb_buffer_pool_read_requests", "1000000"),
                ("Innodb_buffer_pool_reads", "1000"),
                ("Innodb_buffer_pool_pages_total", "8192"),
                ("Innodb_buffer_pool_pages_data", "8000"),
                ("Innodb_buffer_pool_pages_free", "192"),
                ("Innodb_page_size", "16384"),
            ])
            .with_table("shop", "orders", 64 * 1024 * 1024, 16 * 1024 * 1024, 0)
            .with_process(1, "Daemon", 864000)
            .with_process(10, "Sleep", 30)
            .with_process(11, "Query", 0)
    }

    /// A replica lagging ten minutes behind its source.
    pub fn lagging_replica() -> Self {
        Self::healthy_primary().with_replica(&[
            ("Replica_IO_Running", "Yes"),
            ("Replica_SQL_Running", "Yes"),
            ("Seconds_Behind_Source", "600"),
        ])
    }
}
