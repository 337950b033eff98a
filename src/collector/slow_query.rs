use super::{Classifier, CollectorResult};
use crate::config::Thresholds;
use crate::health::HealthLevel;
use crate::storage::{Snapshot, Value};

/// Slow query log configuration.
///
/// Reads `slow_query_log` and `long_query_time` from the server variables
/// captured with the snapshot. The cumulative `Slow_queries` counter is
/// reported as a metric only; its rate is judged by `performance`.
pub struct SlowQueryCollector {
    max_long_query_time: f64,
}

impl SlowQueryCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_long_query_time: thresholds.max_long_query_time,
        }
    }
}

/// `ON`/`OFF` as the server prints them; `1`/`0` when set numerically.
fn switch(value: &Value) -> Option<bool> {
    if let Some(s) = value.as_str() {
        if s.eq_ignore_ascii_case("on") {
            return Some(true);
        }
        if s.eq_ignore_ascii_case("off") {
            return Some(false);
        }
    }
    value.as_i64().map(|v| v != 0)
}

impl Classifier for SlowQueryCollector {
    fn name(&self) -> &'static str {
        "slow_query"
    }

    fn classify(&self, snapshot: &Snapshot) -> CollectorResult {
        let mut result = CollectorResult::ok(self.name());
        result.set_opt("slow_queries", snapshot.counter("Slow_queries"));

        let enabled = snapshot.variable("slow_query_log").and_then(switch);
        let long_query_time = snapshot.variable("long_query_time").and_then(Value::as_f64);
        result.set_opt("slow_query_log", enabled.map(|on| if on { 1.0 } else { 0.0 }));
        result.set_opt("long_query_time", long_query_time);

        if snapshot.variables().is_none() {
            let message = match snapshot.custom.get("global_variables_error") {
                Some(err) => format!("server variables unavailable: {}", err),
                None => "server variables unavailable".to_string(),
            };
            return result.with_message(message);
        }

        if enabled == Some(false) {
            result.raise(HealthLevel::Warn, "slow query log disabled");
        }
        if let Some(t) = long_query_time
            && t > self.max_long_query_time
        {
            result.raise(
                HealthLevel::Warn,
                format!("long_query_time {}s > {}s", t, self.max_long_query_time),
            );
        }
        if result.level == HealthLevel::Ok {
            result.message = "slow query log enabled".to_string();
        }
        result
    }
}
