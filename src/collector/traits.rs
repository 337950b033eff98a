use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::CollectorResult;
use crate::source::{MetricQuery, MetricSource, SourceError, status_map};
use crate::storage::{Row, Snapshot};

/// Classifies a single snapshot.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;
    fn classify(&self, snapshot: &Snapshot) -> CollectorResult;
}

/// Named counter values taken at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct RawSample {
    pub name: String,
    pub values: BTreeMap<String, f64>,
    pub time: DateTime<Utc>,
}

impl RawSample {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}

/// Computes rates from two samples.
///
/// Samples either come from the snapshot store ([`sample_from`]) or from a
/// direct query ([`sample`]) in one-shot mode.
///
/// [`sample_from`]: DeltaClassifier::sample_from
/// [`sample`]: DeltaClassifier::sample
pub trait DeltaClassifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Global status counters this collector reads.
    fn tracked_keys(&self) -> &'static [&'static str];

    /// `prev` must be the earlier sample. A non-positive interval yields a
    /// neutral result without rate metrics.
    fn delta(&self, prev: &RawSample, curr: &RawSample) -> CollectorResult;

    /// Sample from a captured snapshot's counters.
    fn sample_from(&self, snapshot: &Snapshot) -> RawSample {
        let values = self
            .tracked_keys()
            .iter()
            .filter_map(|k| snapshot.counter(k).map(|v| (k.to_string(), v)))
            .collect();
        RawSample {
            name: self.name().to_string(),
            values,
            time: snapshot.timestamp,
        }
    }

    /// Sample from raw `Variable_name`/`Value` rows.
    fn sample_at(&self, rows: &[Row], time: DateTime<Utc>) -> RawSample {
        let status = status_map(rows);
        let values = self
            .tracked_keys()
            .iter()
            .filter_map(|k| status.get(*k).and_then(|v| v.as_f64()).map(|v| (k.to_string(), v)))
            .collect();
        RawSample {
            name: self.name().to_string(),
            values,
            time,
        }
    }

    /// Queries global status directly. Blocking.
    fn sample(&self, source: &dyn MetricSource, timeout: Duration) -> Result<RawSample, SourceError> {
        let rows = source.query(MetricQuery::GlobalStatus, timeout)?;
        Ok(self.sample_at(&rows, Utc::now()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CollectorKind {
    Stateless,
    Delta,
}

impl fmt::Display for CollectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorKind::Stateless => f.write_str("stateless"),
            CollectorKind::Delta => f.write_str("delta"),
        }
    }
}

/// A registered collector, tagged by kind.
#[derive(Clone)]
pub enum RegisteredCollector {
    Stateless(Arc<dyn Classifier>),
    Delta(Arc<dyn DeltaClassifier>),
}

impl RegisteredCollector {
    pub fn name(&self) -> &'static str {
        match self {
            RegisteredCollector::Stateless(c) => c.name(),
            RegisteredCollector::Delta(c) => c.name(),
        }
    }

    pub fn kind(&self) -> CollectorKind {
        match self {
            RegisteredCollector::Stateless(_) => CollectorKind::Stateless,
            RegisteredCollector::Delta(_) => CollectorKind::Delta,
        }
    }
}

impl fmt::Debug for RegisteredCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self.name())
    }
}
