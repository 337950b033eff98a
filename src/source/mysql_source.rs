//! MySQL metric source.
//!
//! Connects with the `mysql` driver and answers [`MetricQuery`] kinds with
//! plain statements:
//! - `SHOW GLOBAL STATUS` - runtime counters
//! - `information_schema.tables` - table sizes (system schemas excluded)
//! - `SHOW PROCESSLIST` - sessions
//! - `SHOW REPLICA STATUS` (falls back to `SHOW SLAVE STATUS` on servers before 8.0.22)
//! - `SELECT VERSION()`
//! - `SHOW GLOBAL VARIABLES` (slow log settings and a few limits)

use std::io;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use mysql::prelude::Queryable;
use mysql::{Opts, OptsBuilder, Pool, PooledConn};
use tracing::debug;

use super::{MetricQuery, MetricSource, SourceError};
use crate::config::ConnectionConfig;
use crate::storage::model::{Row, Value};

const TABLE_STATS_QUERY: &str = "\
SELECT TABLE_SCHEMA, TABLE_NAME, ENGINE, TABLE_ROWS, DATA_LENGTH, INDEX_LENGTH, DATA_FREE, \
       CREATE_TIME, UPDATE_TIME \
FROM information_schema.tables \
WHERE TABLE_SCHEMA NOT IN ('information_schema', 'mysql', 'performance_schema', 'sys')";

const GLOBAL_VARIABLES_QUERY: &str = "\
SHOW GLOBAL VARIABLES \
WHERE Variable_name IN ('slow_query_log', 'long_query_time', 'max_connections', 'innodb_buffer_pool_size')";

/// MySQL-backed [`MetricSource`].
///
/// Holds a connection pool so concurrent capture sub-queries each get their
/// own connection.
pub struct MysqlSource {
    pool: Pool,
    endpoint: String,
}

impl MysqlSource {
    /// Creates the pool and verifies that the server is reachable.
    pub fn connect(config: &ConnectionConfig, timeout: Duration) -> Result<Self, SourceError> {
        let builder = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(config.password.clone())
            .db_name(config.database.clone())
            .tcp_connect_timeout(Some(timeout))
            .read_timeout(Some(timeout))
            .write_timeout(Some(timeout));

        let endpoint = format!("{}:{}", config.host, config.port);
        let pool = Pool::new(Opts::from(builder)).map_err(|e| map_error(&e, "connect", timeout))?;
        let source = Self { pool, endpoint };

        // Fail fast on bad credentials or an unreachable host.
        let mut conn = source.conn("connect", timeout)?;
        conn.query_drop("SELECT 1")
            .map_err(|e| map_error(&e, "connect", timeout))?;
        debug!(endpoint = %source.endpoint, "mysql source connected");

        Ok(source)
    }

    /// [`connect`](Self::connect) on the blocking pool, bounded by `timeout`.
    pub async fn open(config: &ConnectionConfig, timeout: Duration) -> Result<Self, SourceError> {
        let config = config.clone();
        super::timeboxed("connect", timeout, move || Self::connect(&config, timeout)).await
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn conn(&self, label: &'static str, timeout: Duration) -> Result<PooledConn, SourceError> {
        self.pool
            .get_conn()
            .map_err(|e| map_error(&e, label, timeout))
    }

    fn rows(&self, query: MetricQuery, sql: &str, timeout: Duration) -> Result<Vec<Row>, SourceError> {
        let mut conn = self.conn(query.name(), timeout)?;
        let rows: Vec<mysql::Row> = conn
            .query(sql)
            .map_err(|e| map_error(&e, query.name(), timeout))?;
        Ok(rows.iter().map(convert_row).collect())
    }
}

impl MetricSource for MysqlSource {
    fn query(&self, query: MetricQuery, timeout: Duration) -> Result<Vec<Row>, SourceError> {
        let sql = match query {
            MetricQuery::GlobalStatus => "SHOW GLOBAL STATUS",
            MetricQuery::TableStats => TABLE_STATS_QUERY,
            MetricQuery::ProcessList => "SHOW PROCESSLIST",
            MetricQuery::ReplicaStatus => "SHOW REPLICA STATUS",
            MetricQuery::ServerVersion => "SELECT VERSION() AS version",
            MetricQuery::GlobalVariables => GLOBAL_VARIABLES_QUERY,
        };
        match self.rows(query, sql, timeout) {
            Err(SourceError::Query(msg)) if query == MetricQuery::ReplicaStatus => {
                debug!(error = %msg, "SHOW REPLICA STATUS rejected, trying legacy syntax");
                self.rows(query, "SHOW SLAVE STATUS", timeout)
            }
            other => other,
        }
    }
}

fn convert_row(row: &mysql::Row) -> Row {
    let mut out = Row::new();
    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value = row.as_ref(idx).map(convert_value).unwrap_or(Value::Null);
        out.insert(column.name_str().into_owned(), value);
    }
    out
}

fn convert_value(value: &mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        mysql::Value::Int(v) => Value::Int(*v),
        mysql::Value::UInt(v) => i64::try_from(*v)
            .map(Value::Int)
            .unwrap_or(Value::Float(*v as f64)),
        mysql::Value::Float(v) => Value::Float(f64::from(*v)),
        mysql::Value::Double(v) => Value::Float(*v),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(*year), u32::from(*month), u32::from(*day))
                .and_then(|d| {
                    d.and_hms_micro_opt(
                        u32::from(*hour),
                        u32::from(*minute),
                        u32::from(*second),
                        *micros,
                    )
                })
                .map(|dt| Value::Time(Utc.from_utc_datetime(&dt)))
                .unwrap_or(Value::Null)
        }
        mysql::Value::Time(negative, days, hours, minutes, seconds, _micros) => {
            let secs = i64::from(*days) * 86_400
                + i64::from(*hours) * 3_600
                + i64::from(*minutes) * 60
                + i64::from(*seconds);
            Value::Int(if *negative { -secs } else { secs })
        }
    }
}

fn map_error(e: &mysql::Error, label: &'static str, timeout: Duration) -> SourceError {
    match e {
        mysql::Error::IoError(io_err)
            if matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ) =>
        {
            SourceError::Timeout {
                query: label,
                after: timeout,
            }
        }
        mysql::Error::IoError(_) | mysql::Error::DriverError(_) => {
            SourceError::Unavailable(e.to_string())
        }
        _ => SourceError::Query(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_value_text_and_numbers() {
        assert_eq!(
            convert_value(&mysql::Value::Bytes(b"1500".to_vec())),
            Value::Text("1500".to_string())
        );
        assert_eq!(convert_value(&mysql::Value::Int(-3)), Value::Int(-3));
        assert_eq!(convert_value(&mysql::Value::UInt(7)), Value::Int(7));
        assert_eq!(convert_value(&mysql::Value::NULL), Value::Null);
    }

    #[test]
    fn convert_value_date() {
        let v = convert_value(&mysql::Value::Date(2024, 3, 1, 12, 30, 0, 0));
        match v {
            Value::Time(t) => assert_eq!(t.format("%Y-%m-%d %H:%M").to_string(), "2024-03-01 12:30"),
            other => panic!("expected time, got {:?}", other),
        }
        assert_eq!(
            convert_value(&mysql::Value::Date(2024, 13, 1, 0, 0, 0, 0)),
            Value::Null
        );
    }

    #[test]
    fn convert_value_time_as_seconds() {
        assert_eq!(
            convert_value(&mysql::Value::Time(false, 1, 2, 0, 5, 0)),
            Value::Int(86_400 + 7_200 + 5)
        );
        assert_eq!(
            convert_value(&mysql::Value::Time(true, 0, 0, 1, 0, 0)),
            Value::Int(-60)
        );
    }

    #[test]
    fn map_error_distinguishes_unavailable() {
        let err = mysql::Error::IoError(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        let t = Duration::from_secs(5);
        assert!(matches!(
            map_error(&err, "global_status", t),
            SourceError::Unavailable(_)
        ));
        let err = mysql::Error::IoError(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(
            map_error(&err, "global_status", t),
            SourceError::Timeout {
                query: "global_status",
                after: t
            }
        );
    }
}
