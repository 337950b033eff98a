//! Scheduler: periodic capture and inspection.
//!
//! ```text
//!            start()                        stop()
//!  Stopped ───────────▶ Running ─────────────────────▶ Stopped
//!             │ capture now                   │ signal loop, join
//!             │ inspect now                   │ sink.stopped()
//!             ▼
//!      ┌────────────── dispatch loop ───────────────┐
//!      │ stop signal   → exit                        │
//!      │ capture tick  → store.capture()             │
//!      │ inspect tick  → collectors → sink.emit()    │
//!      └─────────────────────────────────────────────┘
//! ```
//!
//! Both ticks are observed by the same loop, so capture and inspection never
//! run concurrently for one inspector. [`check_once`] is the finite variant
//! used by one-shot checks.

mod oneshot;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use crate::collector::{CollectorRegistry, CollectorResult, RegisteredCollector};
use crate::config::{CollectorToggles, InspectorConfig};
use crate::health::{AggregatedResult, InstanceInfo};
use crate::report::OutputSink;
use crate::source::server_version;
use crate::storage::{CaptureError, SnapshotStore};

pub use oneshot::check_once;

// ============================================================
// Errors
// ============================================================

#[derive(Debug)]
pub enum InspectorError {
    /// The first capture failed; the source is unusable.
    Startup(CaptureError),
    /// A cadence of zero was requested.
    InvalidInterval { capture: Duration, inspect: Duration },
    /// The total deadline elapsed before anything was captured.
    DeadlineExceeded(Duration),
}

impl fmt::Display for InspectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectorError::Startup(e) => write!(f, "startup failed: {}", e),
            InspectorError::InvalidInterval { capture, inspect } => write!(
                f,
                "intervals must be positive (capture {:?}, inspect {:?})",
                capture, inspect
            ),
            InspectorError::DeadlineExceeded(after) => {
                write!(f, "no snapshot captured within {:.1}s", after.as_secs_f64())
            }
        }
    }
}

impl std::error::Error for InspectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InspectorError::Startup(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================
// Inspection pass
// ============================================================

/// State shared between the inspector handle and its loop task.
struct Shared {
    store: Arc<SnapshotStore>,
    registry: CollectorRegistry,
    sink: Arc<dyn OutputSink>,
    toggles: CollectorToggles,
    instance: RwLock<InstanceInfo>,
    version_timeout: Duration,
}

impl Shared {
    /// Runs enabled collectors against the latest/previous snapshots.
    fn inspect(&self) -> Option<AggregatedResult> {
        let Some(latest) = self.store.latest() else {
            warn!("inspection skipped: no snapshot captured yet");
            return None;
        };
        let previous = self.store.previous();
        let started = Instant::now();

        let instance = self
            .instance
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut result = AggregatedResult::new(instance);

        for collector in self.registry.enabled(&self.toggles) {
            let detail = match collector {
                RegisteredCollector::Stateless(c) => c.classify(&latest),
                RegisteredCollector::Delta(d) => match &previous {
                    Some(prev) => d.delta(&d.sample_from(prev), &d.sample_from(&latest)),
                    None => CollectorResult::no_data(d.name()),
                },
            };
            result.push(detail);
        }
        result.finish(started.elapsed());
        Some(result)
    }

    fn inspect_and_emit(&self) {
        let Some(result) = self.inspect() else {
            return;
        };
        debug!(
            overall = %result.overall,
            collectors = result.details.len(),
            "inspection pass completed"
        );
        if let Err(e) = self.sink.emit(&result) {
            warn!(error = %e, "output sink failed");
        }
    }

    async fn capture(&self) {
        if let Err(e) = self.store.capture().await {
            warn!(stage = %e.stage, error = %e.source, "snapshot capture failed");
        }
    }
}

// ============================================================
// Inspector
// ============================================================

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Dual-cadence scheduler over a [`SnapshotStore`].
pub struct Inspector {
    shared: Arc<Shared>,
    state: Mutex<Option<Running>>,
    running: AtomicBool,
}

impl Inspector {
    pub fn new(
        store: Arc<SnapshotStore>,
        registry: CollectorRegistry,
        sink: Arc<dyn OutputSink>,
        config: &InspectorConfig,
    ) -> Self {
        let shared = Shared {
            store,
            registry,
            sink,
            toggles: config.collectors.clone(),
            instance: RwLock::new(config.instance_info()),
            version_timeout: config.timeouts.auxiliary,
        };
        Self {
            shared: Arc::new(shared),
            state: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Captures and inspects once, then starts the dispatch loop.
    ///
    /// A no-op when already running. Fails without changing state when the
    /// first capture fails.
    pub async fn start(
        &self,
        capture_every: Duration,
        inspect_every: Duration,
    ) -> Result<(), InspectorError> {
        if capture_every.is_zero() || inspect_every.is_zero() {
            return Err(InspectorError::InvalidInterval {
                capture: capture_every,
                inspect: inspect_every,
            });
        }

        let mut state = self.state.lock().await;
        if state.is_some() {
            warn!("inspector already running, start ignored");
            return Ok(());
        }

        let shared = &self.shared;
        shared.store.capture().await.map_err(InspectorError::Startup)?;

        match server_version(shared.store.source(), shared.version_timeout).await {
            Ok(version) => {
                shared
                    .instance
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .version = Some(version);
            }
            Err(e) => debug!(error = %e, "server version unavailable"),
        }

        shared.inspect_and_emit();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(dispatch_loop(
            Arc::clone(shared),
            capture_every,
            inspect_every,
            stop_rx,
        ));
        *state = Some(Running { stop_tx, handle });
        self.running.store(true, Ordering::SeqCst);

        info!(
            capture_every_s = capture_every.as_secs_f64(),
            inspect_every_s = inspect_every.as_secs_f64(),
            "inspector started"
        );
        Ok(())
    }

    /// Stops the dispatch loop and waits for it to exit. A no-op when stopped.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        let Some(running) = state.take() else {
            info!("inspector not running, stop ignored");
            return;
        };

        // The loop may already have exited; a closed channel is fine.
        let _ = running.stop_tx.send(true);
        if let Err(e) = running.handle.await {
            error!(error = %e, "inspector loop terminated abnormally");
        }
        self.running.store(false, Ordering::SeqCst);
        self.shared.sink.stopped();
    }
}

async fn dispatch_loop(
    shared: Arc<Shared>,
    capture_every: Duration,
    inspect_every: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let now = tokio::time::Instant::now();
    let mut capture_tick = interval_at(now + capture_every, capture_every);
    capture_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut inspect_tick = interval_at(now + inspect_every, inspect_every);
    inspect_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = capture_tick.tick() => shared.capture().await,
            _ = inspect_tick.tick() => shared.inspect_and_emit(),
        }
    }
    debug!("dispatch loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::health::HealthLevel;
    use crate::report::SinkError;
    use crate::source::{MetricQuery, MetricSource, MockSource, SourceError};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingSink {
        results: StdMutex<Vec<AggregatedResult>>,
        stopped: AtomicUsize,
    }

    impl CountingSink {
        fn count(&self) -> usize {
            self.results.lock().unwrap().len()
        }
    }

    impl OutputSink for CountingSink {
        fn emit(&self, result: &AggregatedResult) -> Result<(), SinkError> {
            self.results.lock().unwrap().push(result.clone());
            Ok(())
        }
        fn stopped(&self) {
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn inspector(source: MockSource) -> (Inspector, Arc<CountingSink>) {
        let config = InspectorConfig::default();
        let source: Arc<dyn MetricSource> = Arc::new(source);
        let store = Arc::new(SnapshotStore::new(source, config.timeouts, 5));
        let sink = Arc::new(CountingSink::default());
        let inspector = Inspector::new(
            store,
            CollectorRegistry::with_defaults(&Thresholds::default()),
            sink.clone(),
            &config,
        );
        (inspector, sink)
    }

    const SLOW: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn first_pass_has_no_delta_data() {
        let (inspector, sink) = inspector(MockSource::healthy_primary());
        inspector.start(SLOW, SLOW).await.unwrap();
        assert!(inspector.is_running());

        let results = sink.results.lock().unwrap().clone();
        assert_eq!(results.len(), 1);
        let perf = results[0].detail("performance").unwrap();
        assert_eq!(perf.message, "no data yet");
        assert!(perf.metrics.is_empty());
        assert_eq!(results[0].instance.version.as_deref(), Some("8.0.36"));
        assert_eq!(results[0].overall, HealthLevel::Ok);

        inspector.stop().await;
        assert!(!inspector.is_running());
        assert_eq!(sink.stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn double_start_is_a_no_op() {
        let (inspector, sink) = inspector(MockSource::healthy_primary());
        inspector.start(SLOW, SLOW).await.unwrap();
        inspector.start(SLOW, SLOW).await.unwrap();
        assert!(inspector.is_running());
        assert_eq!(sink.count(), 1);
        inspector.stop().await;
    }

    #[tokio::test]
    async fn stop_before_start_is_a_no_op() {
        let (inspector, sink) = inspector(MockSource::healthy_primary());
        inspector.stop().await;
        assert!(!inspector.is_running());
        assert_eq!(sink.stopped.load(Ordering::SeqCst), 0);

        inspector.start(SLOW, SLOW).await.unwrap();
        inspector.stop().await;
        inspector.stop().await;
        assert!(!inspector.is_running());
        assert_eq!(sink.stopped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn startup_failure_leaves_inspector_stopped() {
        let source = MockSource::healthy_primary().fail_on(
            MetricQuery::GlobalStatus,
            SourceError::Unavailable("connection refused".into()),
        );
        let (inspector, sink) = inspector(source);
        let err = inspector.start(SLOW, SLOW).await.unwrap_err();
        assert!(matches!(err, InspectorError::Startup(_)));
        assert!(!inspector.is_running());
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test]
    async fn zero_interval_is_rejected() {
        let (inspector, _) = inspector(MockSource::healthy_primary());
        let err = inspector.start(Duration::ZERO, SLOW).await.unwrap_err();
        assert!(matches!(err, InspectorError::InvalidInterval { .. }));
        assert!(!inspector.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn periodic_passes_compute_rates_and_stop_cleanly() {
        let source = MockSource::healthy_primary()
            .with_status(&[("Uptime", "864010"), ("Questions", "1500"), ("Com_commit", "40")]);
        let (inspector, sink) = inspector(source);
        inspector
            .start(Duration::from_millis(20), Duration::from_millis(50))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        inspector.stop().await;

        let results = sink.results.lock().unwrap().clone();
        assert!(results.len() >= 2, "expected periodic passes, got {}", results.len());
        assert!(
            results[1..]
                .iter()
                .any(|r| r.detail("performance").is_some_and(|p| p.metrics.contains_key("qps")))
        );

        let after_stop = sink.count();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sink.count(), after_stop);
    }
}
