//! Bounded, ordered history of captured snapshots.
//!
//! Single writer (the capture path), many readers (inspection passes).
//! Appends and eviction happen under one write lock, so readers always see
//! a complete sequence.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, warn};

use super::model::{Snapshot, TableStat, Value};
use crate::config::QueryTimeouts;
use crate::source::{MetricQuery, MetricSource, SourceError, query_timeboxed, status_map};

/// Smallest retention that still allows a previous/latest pair.
const MIN_SNAPSHOTS: usize = 2;

/// Required capture sub-query that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureStage {
    GlobalStatus,
    TableStats,
    ProcessList,
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureStage::GlobalStatus => "global status",
            CaptureStage::TableStats => "table stats",
            CaptureStage::ProcessList => "process list",
        };
        f.write_str(name)
    }
}

/// A capture was aborted; nothing was stored.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureError {
    pub stage: CaptureStage,
    pub source: SourceError,
}

impl CaptureError {
    fn at(stage: CaptureStage) -> impl Fn(SourceError) -> CaptureError {
        move |source| CaptureError { stage, source }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture failed at {}: {}", self.stage, self.source)
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

pub struct SnapshotStore {
    source: Arc<dyn MetricSource>,
    timeouts: QueryTimeouts,
    max_snapshots: usize,
    query_replica: bool,
    query_variables: bool,
    history: RwLock<VecDeque<Arc<Snapshot>>>,
}

impl SnapshotStore {
    /// `max_snapshots` below 2 is raised to 2.
    pub fn new(source: Arc<dyn MetricSource>, timeouts: QueryTimeouts, max_snapshots: usize) -> Self {
        let max_snapshots = max_snapshots.max(MIN_SNAPSHOTS);
        Self {
            source,
            timeouts,
            max_snapshots,
            query_replica: true,
            query_variables: true,
            history: RwLock::new(VecDeque::with_capacity(max_snapshots + 1)),
        }
    }

    /// Enables or disables the best-effort replica status query.
    pub fn with_replica_status(mut self, enabled: bool) -> Self {
        self.query_replica = enabled;
        self
    }

    /// Enables or disables the best-effort server variables query.
    pub fn with_server_variables(mut self, enabled: bool) -> Self {
        self.query_variables = enabled;
        self
    }

    pub fn source(&self) -> Arc<dyn MetricSource> {
        Arc::clone(&self.source)
    }

    pub fn max_snapshots(&self) -> usize {
        self.max_snapshots
    }

    /// Captures one snapshot and appends it.
    ///
    /// The three required sub-queries run concurrently, each with its own
    /// ceiling. If any fails the whole capture is discarded.
    pub async fn capture(&self) -> Result<Arc<Snapshot>, CaptureError> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let t = self.timeouts;
        let src = || Arc::clone(&self.source);

        let replica = async {
            if self.query_replica {
                Some(query_timeboxed(src(), MetricQuery::ReplicaStatus, t.auxiliary).await)
            } else {
                None
            }
        };
        let variables = async {
            if self.query_variables {
                Some(query_timeboxed(src(), MetricQuery::GlobalVariables, t.auxiliary).await)
            } else {
                None
            }
        };
        let (global, tables, processes, replica, variables) = tokio::join!(
            query_timeboxed(src(), MetricQuery::GlobalStatus, t.global_status),
            query_timeboxed(src(), MetricQuery::TableStats, t.table_stats),
            query_timeboxed(src(), MetricQuery::ProcessList, t.process_list),
            replica,
            variables,
        );

        let global = global.map_err(CaptureError::at(CaptureStage::GlobalStatus))?;
        let tables = tables.map_err(CaptureError::at(CaptureStage::TableStats))?;
        let processes = processes.map_err(CaptureError::at(CaptureStage::ProcessList))?;

        let mut snapshot = Snapshot::new(timestamp);
        snapshot.global = status_map(&global);
        snapshot.tables = tables
            .iter()
            .filter_map(TableStat::from_row)
            .map(|stat| (stat.key(), stat))
            .collect();
        snapshot.processes = processes;

        match replica {
            Some(Ok(rows)) => {
                if let Some(row) = rows.into_iter().next() {
                    snapshot.custom.insert("replica_status".to_string(), Value::Map(row));
                }
            }
            Some(Err(e)) => {
                debug!(error = %e, "replica status query failed");
                snapshot
                    .custom
                    .insert("replica_status_error".to_string(), Value::Text(e.to_string()));
            }
            None => {}
        }

        match variables {
            Some(Ok(rows)) => {
                snapshot
                    .custom
                    .insert("global_variables".to_string(), Value::Map(status_map(&rows)));
            }
            Some(Err(e)) => {
                debug!(error = %e, "server variables query failed");
                snapshot
                    .custom
                    .insert("global_variables_error".to_string(), Value::Text(e.to_string()));
            }
            None => {}
        }

        debug!(
            counters = snapshot.global.len(),
            tables = snapshot.tables.len(),
            processes = snapshot.processes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot captured"
        );
        Ok(self.push(snapshot))
    }

    /// Appends a snapshot, evicting the oldest entries beyond the bound.
    pub fn push(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut history = self.history.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = history.back()
            && last.timestamp > snapshot.timestamp
        {
            warn!(
                last = %last.timestamp,
                new = %snapshot.timestamp,
                "snapshot timestamp went backwards"
            );
        }
        history.push_back(Arc::clone(&snapshot));
        while history.len() > self.max_snapshots {
            history.pop_front();
        }
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.read().back().cloned()
    }

    /// The snapshot immediately before [`latest`](Self::latest).
    pub fn previous(&self) -> Option<Arc<Snapshot>> {
        let history = self.read();
        let n = history.len();
        if n < 2 { None } else { history.get(n - 2).cloned() }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Retained snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<Arc<Snapshot>> {
        self.read().iter().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, VecDeque<Arc<Snapshot>>> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }
}
