use super::{CollectorResult, DeltaClassifier, RawSample};
use crate::config::Thresholds;
use crate::fmt::format_rate;
use crate::health::HealthLevel;

const TRACKED: &[&str] = &[
    "Questions",
    "Com_commit",
    "Com_rollback",
    "Slow_queries",
    "Bytes_sent",
    "Bytes_received",
];

/// Counter delta; `None` when missing from either side or on regression
/// (server restart resets counters).
fn delta(prev: &RawSample, curr: &RawSample, key: &str) -> Option<f64> {
    let (p, c) = (prev.get(key)?, curr.get(key)?);
    (c >= p).then_some(c - p)
}

/// Query, transaction and traffic rates.
pub struct PerformanceCollector {
    slow_qps: f64,
    max_qps: f64,
}

impl PerformanceCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            slow_qps: thresholds.slow_qps,
            max_qps: thresholds.max_qps,
        }
    }
}

impl DeltaClassifier for PerformanceCollector {
    fn name(&self) -> &'static str {
        "performance"
    }

    fn tracked_keys(&self) -> &'static [&'static str] {
        TRACKED
    }

    fn delta(&self, prev: &RawSample, curr: &RawSample) -> CollectorResult {
        let mut result = CollectorResult::ok(self.name());

        let elapsed = curr.time - prev.time;
        let dt = match elapsed.num_microseconds() {
            Some(us) => us as f64 / 1_000_000.0,
            None => elapsed.num_milliseconds() as f64 / 1000.0,
        };
        if dt <= 0.0 {
            return result.with_message(format!("no rates: sampling interval {}s is not positive", dt));
        }
        let per_sec = |d: Option<f64>| d.map(|d| d / dt);

        let qps = per_sec(delta(prev, curr, "Questions"));
        result.set_opt("qps", qps);

        // Rollback is optional; commits are required.
        let tps = delta(prev, curr, "Com_commit").and_then(|commits| {
            let rollbacks = match (prev.get("Com_rollback"), curr.get("Com_rollback")) {
                (Some(p), Some(c)) => (c >= p).then_some(c - p)?,
                _ => 0.0,
            };
            Some((commits + rollbacks) / dt)
        });
        result.set_opt("tps", tps);

        let slow_qps = per_sec(delta(prev, curr, "Slow_queries"));
        result.set_opt("slow_qps", slow_qps);
        result.set_opt("bytes_sent_per_s", per_sec(delta(prev, curr, "Bytes_sent")));
        result.set_opt("bytes_received_per_s", per_sec(delta(prev, curr, "Bytes_received")));

        if let Some(q) = qps
            && q > self.max_qps
        {
            result.raise(
                HealthLevel::Warn,
                format!("qps elevated: {} > {}", format_rate(q), format_rate(self.max_qps)),
            );
        }
        if let Some(s) = slow_qps
            && s > self.slow_qps
        {
            result.raise(
                HealthLevel::Warn,
                format!(
                    "slow queries elevated: {} > {}",
                    format_rate(s),
                    format_rate(self.slow_qps)
                ),
            );
        }
        if result.level == HealthLevel::Ok {
            let show = |v: Option<f64>| v.map(format_rate).unwrap_or_else(|| "N/A".to_string());
            result.message = format!("qps {}, tps {}", show(qps), show(tps));
        }
        result
    }
}
