use super::{Classifier, CollectorResult};
use crate::config::Thresholds;
use crate::fmt::format_duration;
use crate::health::HealthLevel;
use crate::storage::Snapshot;

/// Server uptime. A recent restart is a warning.
pub struct BaseCollector {
    uptime_floor_secs: f64,
}

impl BaseCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            uptime_floor_secs: thresholds.uptime_floor_secs,
        }
    }
}

impl Classifier for BaseCollector {
    fn name(&self) -> &'static str {
        "base"
    }

    fn classify(&self, snapshot: &Snapshot) -> CollectorResult {
        let mut result = CollectorResult::ok(self.name());
        let uptime = snapshot.counter("Uptime");

        result.set_opt("uptime_s", uptime);
        result.set_opt("uptime_hours", uptime.map(|u| u / 3600.0));
        result.set_opt("uptime_days", uptime.map(|u| u / 86400.0));

        match uptime {
            Some(u) if u < self.uptime_floor_secs => {
                result.raise(HealthLevel::Warn, "instance recently restarted");
            }
            Some(u) => result.message = format!("uptime {}", format_duration(u as i64)),
            None => result.message = "uptime unavailable".to_string(),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::UNAVAILABLE;
    use chrono::Utc;

    fn classify(uptime: &str) -> CollectorResult {
        let snap = Snapshot::new(Utc::now()).with_counter("Uptime", uptime);
        BaseCollector::new(&Thresholds::default()).classify(&snap)
    }

    #[test]
    fn uptime_boundary_is_inclusive() {
        let r = classify("299");
        assert_eq!(r.level, HealthLevel::Warn);
        assert_eq!(r.message, "instance recently restarted");

        let r = classify("300");
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.metrics["uptime_s"], 300.0);
    }

    #[test]
    fn derived_units() {
        let r = classify("172800");
        assert_eq!(r.metrics["uptime_hours"], 48.0);
        assert_eq!(r.metrics["uptime_days"], 2.0);
        assert_eq!(r.message, "uptime 2d 0h");
    }

    #[test]
    fn missing_uptime_is_unavailable_not_warned() {
        let snap = Snapshot::new(Utc::now());
        let r = BaseCollector::new(&Thresholds::default()).classify(&snap);
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.metrics["uptime_s"], UNAVAILABLE);
        assert_eq!(r.metric("uptime_days"), None);
    }
}
