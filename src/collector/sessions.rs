use super::{Classifier, CollectorResult};
use crate::config::Thresholds;
use crate::health::HealthLevel;
use crate::storage::{Row, Snapshot, Value};

/// Commands that don't count as active work. Binlog dump threads serve
/// replicas for as long as they stay connected.
const IDLE_COMMANDS: &[&str] = &["Sleep", "Daemon", "Binlog Dump", "Binlog Dump GTID"];

/// Owner of the replica's own IO/SQL/worker threads.
const SYSTEM_USER: &str = "system user";

/// Session counts and long-running statements from the process list.
pub struct SessionsCollector {
    long_query_secs: f64,
}

impl SessionsCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            long_query_secs: thresholds.long_query_secs,
        }
    }
}

fn is_active(row: &Row) -> bool {
    let system = row
        .get("User")
        .and_then(Value::as_str)
        .is_some_and(|user| user.eq_ignore_ascii_case(SYSTEM_USER));
    !system
        && row
            .get("Command")
            .and_then(Value::as_str)
            .is_some_and(|cmd| !IDLE_COMMANDS.iter().any(|idle| cmd.eq_ignore_ascii_case(idle)))
}

impl Classifier for SessionsCollector {
    fn name(&self) -> &'static str {
        "sessions"
    }

    fn classify(&self, snapshot: &Snapshot) -> CollectorResult {
        let mut result = CollectorResult::ok(self.name());

        let mut active = 0usize;
        let mut long_running: Vec<(i64, f64)> = Vec::new();
        for row in snapshot.processes.iter().filter(|r| is_active(r)) {
            active += 1;
            let secs = row.get("Time").and_then(Value::as_f64).unwrap_or(0.0);
            if secs >= self.long_query_secs {
                let id = row.get("Id").and_then(Value::as_i64).unwrap_or(0);
                long_running.push((id, secs));
            }
        }

        result.set("total", snapshot.processes.len() as f64);
        result.set("active", active as f64);
        result.set("long_running", long_running.len() as f64);

        if let Some((id, secs)) = long_running
            .iter()
            .copied()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        {
            result.set("longest_query_s", secs);
            result.raise(
                HealthLevel::Warn,
                format!(
                    "{} statements running >= {}s (longest: id {} at {}s)",
                    long_running.len(),
                    self.long_query_secs,
                    id,
                    secs
                ),
            );
        } else {
            result.message = format!("{} sessions, {} active", snapshot.processes.len(), active);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn process(id: i64, command: &str, time: i64) -> Row {
        let mut row = Row::new();
        row.insert("Id".into(), Value::Int(id));
        row.insert("Command".into(), command.into());
        row.insert("Time".into(), Value::Int(time));
        row
    }

    fn classify(rows: Vec<Row>) -> CollectorResult {
        let snap = rows
            .into_iter()
            .fold(Snapshot::new(Utc::now()), |s, r| s.with_process(r));
        SessionsCollector::new(&Thresholds::default()).classify(&snap)
    }

    #[test]
    fn idle_sessions_are_not_active() {
        let r = classify(vec![
            process(1, "Daemon", 100_000),
            process(2, "Sleep", 900),
            process(3, "Query", 1),
        ]);
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.metrics["total"], 3.0);
        assert_eq!(r.metrics["active"], 1.0);
        assert_eq!(r.metrics["long_running"], 0.0);
        assert_eq!(r.message, "3 sessions, 1 active");
    }

    #[test]
    fn long_query_warns() {
        let r = classify(vec![
            process(7, "Query", 60),
            process(8, "Query", 240),
            process(9, "Query", 59),
        ]);
        assert_eq!(r.level, HealthLevel::Warn);
        assert_eq!(r.metrics["long_running"], 2.0);
        assert_eq!(r.metrics["longest_query_s"], 240.0);
        assert!(r.message.contains("id 8"));
    }

    #[test]
    fn time_as_text_is_parsed() {
        let mut row = process(4, "Execute", 0);
        row.insert("Time".into(), Value::Text("300".into()));
        let r = classify(vec![row]);
        assert_eq!(r.metrics["long_running"], 1.0);
    }

    #[test]
    fn binlog_dump_threads_are_idle() {
        let r = classify(vec![
            process(20, "Binlog Dump GTID", 86_400),
            process(21, "Binlog Dump", 86_400),
            process(22, "Query", 0),
        ]);
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.metrics["active"], 1.0);
        assert_eq!(r.metrics["long_running"], 0.0);
    }

    #[test]
    fn replica_system_threads_are_idle() {
        let mut io = process(30, "Connect", 86_400);
        io.insert("User".into(), "system user".into());
        let mut sql = process(31, "Query", 86_400);
        sql.insert("User".into(), "system user".into());
        let r = classify(vec![io, sql, process(32, "Query", 2)]);
        assert_eq!(r.level, HealthLevel::Ok);
        assert_eq!(r.metrics["total"], 3.0);
        assert_eq!(r.metrics["active"], 1.0);
    }
}
