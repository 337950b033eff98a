use std::sync::Arc;
use std::time::Instant;

use tokio::time::{Instant as Deadline, sleep, timeout_at};
use tracing::{debug, info, warn};

use super::InspectorError;
use crate::collector::{CollectorRegistry, CollectorResult, DeltaClassifier, RawSample};
use crate::config::InspectorConfig;
use crate::health::AggregatedResult;
use crate::source::{MetricSource, server_version, timeboxed};
use crate::storage::SnapshotStore;

/// Runs every enabled collector once and returns the aggregate.
///
/// Stateless collectors classify a single fresh snapshot. When
/// `run_periodic` is set, delta collectors sample twice `period` apart.
/// The whole run is bounded by `total_timeout`: if it elapses after the
/// snapshot was taken, whatever finished is returned with `partial` set.
pub async fn check_once(
    source: Arc<dyn MetricSource>,
    registry: &CollectorRegistry,
    config: &InspectorConfig,
) -> Result<AggregatedResult, InspectorError> {
    let started = Instant::now();
    let deadline = Deadline::now() + config.total_timeout;
    let toggles = &config.collectors;

    let mut instance = config.instance_info();
    match timeout_at(
        deadline,
        server_version(Arc::clone(&source), config.timeouts.auxiliary),
    )
    .await
    {
        Ok(Ok(version)) => instance.version = Some(version),
        Ok(Err(e)) => debug!(error = %e, "server version unavailable"),
        Err(_) => return Err(InspectorError::DeadlineExceeded(config.total_timeout)),
    }

    let store = SnapshotStore::new(Arc::clone(&source), config.timeouts, 2)
        .with_replica_status(toggles.is_enabled("replication"))
        .with_server_variables(toggles.is_enabled("slow_query"));
    let snapshot = match timeout_at(deadline, store.capture()).await {
        Ok(captured) => captured.map_err(InspectorError::Startup)?,
        Err(_) => return Err(InspectorError::DeadlineExceeded(config.total_timeout)),
    };

    let mut result = AggregatedResult::new(instance);
    for collector in registry.enabled_stateless(toggles) {
        result.push(collector.classify(&snapshot));
    }

    let deltas = registry.enabled_delta(toggles);
    if config.run_periodic && !deltas.is_empty() {
        match sample_deltas(&source, &deltas, config, deadline).await {
            Some(details) => details.into_iter().for_each(|d| result.push(d)),
            None => {
                warn!(
                    total_timeout_s = config.total_timeout.as_secs_f64(),
                    "deadline reached, returning partial result"
                );
                result.partial = true;
            }
        }
    }

    result
        .details
        .sort_by_key(|d| registry.position(&d.name).unwrap_or(usize::MAX));
    result.finish(started.elapsed());

    info!(
        overall = %result.overall,
        collectors = result.details.len(),
        partial = result.partial,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "one-shot check completed"
    );
    Ok(result)
}

/// Samples, waits `period`, samples again. `None` when the deadline hit.
///
/// A collector whose sampling fails is skipped; the others still report.
async fn sample_deltas(
    source: &Arc<dyn MetricSource>,
    deltas: &[Arc<dyn DeltaClassifier>],
    config: &InspectorConfig,
    deadline: Deadline,
) -> Option<Vec<CollectorResult>> {
    let mut first = Vec::with_capacity(deltas.len());
    for collector in deltas {
        let sample = timeout_at(deadline, sample_one(source, collector, config)).await.ok()?;
        first.push((collector, sample));
    }

    timeout_at(deadline, sleep(config.period)).await.ok()?;

    let mut details = Vec::with_capacity(deltas.len());
    for (collector, prev) in first {
        let curr = timeout_at(deadline, sample_one(source, collector, config)).await.ok()?;
        if let (Some(prev), Some(curr)) = (prev, curr) {
            details.push(collector.delta(&prev, &curr));
        }
    }
    Some(details)
}

async fn sample_one(
    source: &Arc<dyn MetricSource>,
    collector: &Arc<dyn DeltaClassifier>,
    config: &InspectorConfig,
) -> Option<RawSample> {
    let timeout = config.timeouts.global_status;
    let (source, sampler) = (Arc::clone(source), Arc::clone(collector));
    match timeboxed(collector.name(), timeout, move || sampler.sample(&*source, timeout)).await {
        Ok(sample) => Some(sample),
        Err(e) => {
            warn!(collector = collector.name(), error = %e, "delta sampling failed, skipping");
            None
        }
    }
}
