use std::collections::BTreeMap;

use super::{Classifier, CollectorResult};
use crate::config::Thresholds;
use crate::health::HealthLevel;
use crate::storage::{Snapshot, Value};

/// Replica lag and replication thread state.
///
/// Reads the replica status row captured with the snapshot. Column names
/// changed in MySQL 8.0.22 (`Source`/`Replica` instead of `Master`/`Slave`);
/// both spellings are accepted.
pub struct ReplicationCollector {
    max_lag_secs: f64,
}

impl ReplicationCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_lag_secs: thresholds.replica_lag_secs,
        }
    }
}

fn column<'a>(row: &'a BTreeMap<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| row.get(*n))
}

/// `Some(false)` only when the column is present and not `Yes`.
fn thread_running(row: &BTreeMap<String, Value>, names: &[&str]) -> Option<bool> {
    column(row, names).map(|v| v.as_str().is_some_and(|s| s.eq_ignore_ascii_case("yes")))
}

impl Classifier for ReplicationCollector {
    fn name(&self) -> &'static str {
        "replication"
    }

    fn classify(&self, snapshot: &Snapshot) -> CollectorResult {
        let result = CollectorResult::ok(self.name());

        let Some(row) = snapshot.replica_status() else {
            if let Some(err) = snapshot.custom.get("replica_status_error") {
                return result.with_message(format!("replica status unavailable: {}", err));
            }
            return result.with_message("primary or unconfigured");
        };

        let mut result = result.with_message("replica detected");

        let lag = column(row, &["Seconds_Behind_Source", "Seconds_Behind_Master"])
            .and_then(Value::as_f64);
        result.set_opt("seconds_behind_source", lag);

        let io = thread_running(row, &["Replica_IO_Running", "Slave_IO_Running"]);
        let sql = thread_running(row, &["Replica_SQL_Running", "Slave_SQL_Running"]);
        let flag = |running: Option<bool>| running.map(|r| if r { 1.0 } else { 0.0 });
        result.set_opt("io_running", flag(io));
        result.set_opt("sql_running", flag(sql));

        if io == Some(false) {
            result.raise(HealthLevel::Critical, "replica IO thread not running");
        }
        if sql == Some(false) {
            result.raise(HealthLevel::Critical, "replica SQL thread not running");
        }
        if let Some(lag) = lag
            && lag > self.max_lag_secs
        {
            result.raise(
                HealthLevel::Warn,
                format!("replication lag {}s > {}s", lag, self.max_lag_secs),
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::UNAVAILABLE;
    use chrono::Utc;

    fn replica(columns: &[(&str, &str)]) -> Snapshot {
        let row = columns
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Text(v.to_string())))
            .collect();
        let mut snap = Snapshot::new(Utc::now());
        snap.custom.insert("replica_status".into(), Value::Map(row));
        snap
    }

    fn classify(snap: &Snapshot) -> CollectorResult {
        ReplicationCollector::new(&Thresholds::default()).classify(snap)
    }

    #[test]
    fn no_rows_means_primary() {
        let r = classify(&Snapshot::new(Utc::now()));
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.message, "primary or unconfigured");
        assert!(r.metrics.is_empty());
    }

    #[test]
    fn lag_above_limit_warns() {
        let r = classify(&replica(&[
            ("Replica_IO_Running", "Yes"),
            ("Replica_SQL_Running", "Yes"),
            ("Seconds_Behind_Source", "600"),
        ]));
        assert_eq!(r.level, HealthLevel::Warn);
        assert!(r.message.starts_with("replica detected"));
        assert_eq!(r.metrics["seconds_behind_source"], 600.0);
    }

    #[test]
    fn small_lag_is_ok_with_legacy_columns() {
        let r = classify(&replica(&[
            ("Slave_IO_Running", "Yes"),
            ("Slave_SQL_Running", "Yes"),
            ("Seconds_Behind_Master", "3"),
        ]));
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.message, "replica detected");
        assert_eq!(r.metric("seconds_behind_source"), Some(3.0));
    }

    #[test]
    fn stopped_thread_is_critical() {
        let mut snap = replica(&[("Replica_IO_Running", "Yes"), ("Replica_SQL_Running", "No")]);
        if let Some(Value::Map(row)) = snap.custom.get_mut("replica_status") {
            row.insert("Seconds_Behind_Source".into(), Value::Null);
        }
        let r = classify(&snap);
        assert_eq!(r.level, HealthLevel::Critical);
        assert_eq!(r.metrics["seconds_behind_source"], UNAVAILABLE);
        assert_eq!(r.metrics["sql_running"], 0.0);
    }

    #[test]
    fn missing_thread_columns_are_unavailable() {
        let r = classify(&replica(&[("Seconds_Behind_Source", "12")]));
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.metrics["io_running"], UNAVAILABLE);
        assert_eq!(r.metrics["sql_running"], UNAVAILABLE);
        assert_eq!(r.metric("io_running"), None);
        assert_eq!(r.metric("seconds_behind_source"), Some(12.0));
    }

    #[test]
    fn running_threads_report_one() {
        let r = classify(&replica(&[
            ("Replica_IO_Running", "Yes"),
            ("Replica_SQL_Running", "Yes"),
        ]));
        assert_eq!(r.metrics["io_running"], 1.0);
        assert_eq!(r.metrics["sql_running"], 1.0);
    }

    #[test]
    fn status_error_is_reported_as_ok() {
        let mut snap = Snapshot::new(Utc::now());
        snap.custom
            .insert("replica_status_error".into(), Value::Text("access denied".into()));
        let r = classify(&snap);
        assert_eq!(r.level, HealthLevel::Ok);
        assert!(r.message.contains("access denied"));
    }
}
