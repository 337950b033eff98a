use super::{Classifier, CollectorResult};
use crate::config::Thresholds;
use crate::fmt::format_number;
use crate::health::HealthLevel;
use crate::storage::Snapshot;

const EXPECTED: &[&str] = &[
    "Threads_connected",
    "Threads_running",
    "Max_used_connections",
    "Aborted_connects",
    "Connection_errors_internal",
];

/// Client connection counters.
pub struct ConnectionCollector {
    max_connections: f64,
}

impl ConnectionCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_connections: thresholds.max_connections,
        }
    }
}

impl Classifier for ConnectionCollector {
    fn name(&self) -> &'static str {
        "connection"
    }

    fn classify(&self, snapshot: &Snapshot) -> CollectorResult {
        let mut result = CollectorResult::with_expected(self.name(), snapshot, EXPECTED);

        match result.metric("Threads_connected") {
            Some(connected) if connected > self.max_connections => {
                result.raise(
                    HealthLevel::Warn,
                    format!(
                        "too many connections: {} > {}",
                        format_number(connected),
                        format_number(self.max_connections)
                    ),
                );
            }
            Some(connected) => {
                let running = result
                    .metric("Threads_running")
                    .map(format_number)
                    .unwrap_or_else(|| "?".to_string());
                result.message = format!("{} connected, {} running", format_number(connected), running);
            }
            None => result.message = "connection counters unavailable".to_string(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::UNAVAILABLE;
    use chrono::Utc;

    #[test]
    fn above_limit_warns() {
        let snap = Snapshot::new(Utc::now())
            .with_counter("Threads_connected", "501")
            .with_counter("Threads_running", "8");
        let r = ConnectionCollector::new(&Thresholds::default()).classify(&snap);
        assert_eq!(r.level, HealthLevel::Warn);
        assert!(r.message.contains("501 > 500"));
    }

    #[test]
    fn sentinel_is_never_compared() {
        let thresholds = Thresholds {
            max_connections: -5.0,
            ..Thresholds::default()
        };
        let snap = Snapshot::new(Utc::now());
        let r = ConnectionCollector::new(&thresholds).classify(&snap);
        assert_eq!(r.level, HealthLevel::Ok);
        for key in EXPECTED {
            assert_eq!(r.metrics[*key], UNAVAILABLE);
        }
    }

    #[test]
    fn normal_load_is_ok() {
        let snap = Snapshot::new(Utc::now())
            .with_counter("Threads_connected", "12")
            .with_counter("Threads_running", "2");
        let r = ConnectionCollector::new(&Thresholds::default()).classify(&snap);
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.message, "12 connected, 2 running");
    }
}
