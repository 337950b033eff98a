//! Inspector configuration.
//!
//! Built once at startup: defaults, then an optional JSON file, then CLI
//! flags (applied by the binaries). The resulting [`InspectorConfig`] is
//! immutable and passed by reference.
//!
//! Durations in the JSON file are given in seconds:
//!
//! ```json
//! {
//!   "connection": { "host": "db1", "port": 3306, "user": "monitor" },
//!   "capture_interval": 30,
//!   "collectors": { "table_space": false },
//!   "thresholds": { "max_connections": 800 }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::health::InstanceInfo;

// ============================================================
// Errors
// ============================================================

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: serde_json::Error },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "invalid config {}: {}", path.display(), source)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

// ============================================================
// Sections
// ============================================================

/// Where to connect.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub database: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: None,
            database: None,
        }
    }
}

/// Per-query ceilings for snapshot capture.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueryTimeouts {
    #[serde(deserialize_with = "duration_secs")]
    pub global_status: Duration,
    #[serde(deserialize_with = "duration_secs")]
    pub table_stats: Duration,
    #[serde(deserialize_with = "duration_secs")]
    pub process_list: Duration,
    /// Replica status and version queries.
    #[serde(deserialize_with = "duration_secs")]
    pub auxiliary: Duration,
}

impl Default for QueryTimeouts {
    fn default() -> Self {
        Self {
            global_status: Duration::from_secs(15),
            table_stats: Duration::from_secs(20),
            process_list: Duration::from_secs(10),
            auxiliary: Duration::from_secs(5),
        }
    }
}

/// Name-based collector enable/disable overrides.
///
/// Names not listed are enabled.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CollectorToggles(BTreeMap<String, bool>);

impl CollectorToggles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, enabled: bool) {
        self.0.insert(name.to_string(), enabled);
    }

    pub fn with(mut self, name: &str, enabled: bool) -> Self {
        self.set(name, enabled);
        self
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.0.get(name).copied().unwrap_or(true)
    }
}

/// Numeric thresholds used by the built-in collectors.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Uptime below this is reported as a recent restart.
    pub uptime_floor_secs: f64,
    pub max_connections: f64,
    /// Fraction in `0.0..=1.0`.
    pub min_buffer_pool_hit_rate: f64,
    pub replica_lag_secs: f64,
    pub max_table_size_bytes: f64,
    /// Percent of `DATA_FREE` relative to `DATA_LENGTH`.
    pub max_fragmentation_pct: f64,
    pub long_query_secs: f64,
    pub slow_qps: f64,
    pub max_qps: f64,
    /// Highest acceptable `long_query_time` server setting, in seconds.
    pub max_long_query_time: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            uptime_floor_secs: 300.0,
            max_connections: 500.0,
            min_buffer_pool_hit_rate: 0.95,
            replica_lag_secs: 300.0,
            max_table_size_bytes: 10.0 * 1024.0 * 1024.0 * 1024.0,
            max_fragmentation_pct: 30.0,
            long_query_secs: 60.0,
            slow_qps: 1.0,
            max_qps: 1000.0,
            max_long_query_time: 2.0,
        }
    }
}

/// Report rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Log,
}

// ============================================================
// Command line
// ============================================================

/// Connection flags shared by both binaries. Set flags override the file.
#[derive(clap::Args, Clone, Debug, Default)]
pub struct ConnectionArgs {
    /// MySQL host.
    #[arg(long, env = "MYSQL_HOST")]
    pub host: Option<String>,

    /// MySQL port.
    #[arg(long, env = "MYSQL_PORT")]
    pub port: Option<u16>,

    /// MySQL user.
    #[arg(long, env = "MYSQL_USER")]
    pub user: Option<String>,

    /// MySQL password.
    #[arg(long, env = "MYSQL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Default database.
    #[arg(long, env = "MYSQL_DATABASE")]
    pub database: Option<String>,
}

impl ConnectionArgs {
    pub fn apply(&self, connection: &mut ConnectionConfig) {
        if let Some(host) = &self.host {
            connection.host = host.clone();
        }
        if let Some(port) = self.port {
            connection.port = port;
        }
        if let Some(user) = &self.user {
            connection.user = user.clone();
        }
        if self.password.is_some() {
            connection.password = self.password.clone();
        }
        if self.database.is_some() {
            connection.database = self.database.clone();
        }
    }
}

/// Parses a seconds value such as `30` or `2.5` for clap.
pub fn parse_secs(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|e| format!("invalid seconds '{}': {}", s, e))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid seconds '{}': {}", s, e))
}

// ============================================================
// InspectorConfig
// ============================================================

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    pub connection: ConnectionConfig,
    /// Snapshot capture cadence.
    #[serde(deserialize_with = "duration_secs")]
    pub capture_interval: Duration,
    /// Inspection pass cadence.
    #[serde(deserialize_with = "duration_secs")]
    pub inspect_interval: Duration,
    pub max_snapshots: usize,
    /// Sleep between the two samples of a one-shot check.
    #[serde(deserialize_with = "duration_secs")]
    pub period: Duration,
    /// Whether one-shot checks run delta collectors at all.
    pub run_periodic: bool,
    /// Deadline for a whole one-shot check.
    #[serde(deserialize_with = "duration_secs")]
    pub total_timeout: Duration,
    pub timeouts: QueryTimeouts,
    pub collectors: CollectorToggles,
    pub thresholds: Thresholds,
    pub output: OutputFormat,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            capture_interval: Duration::from_secs(60),
            inspect_interval: Duration::from_secs(300),
            max_snapshots: 10,
            period: Duration::from_secs(5),
            run_periodic: true,
            total_timeout: Duration::from_secs(20),
            timeouts: QueryTimeouts::default(),
            collectors: CollectorToggles::default(),
            thresholds: Thresholds::default(),
            output: OutputFormat::default(),
        }
    }
}

impl InspectorConfig {
    /// Reads a JSON config file; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, or the given file when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_json_file(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capture_interval.is_zero() || self.inspect_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "capture and inspection intervals must be positive".to_string(),
            ));
        }
        if self.max_snapshots < 2 {
            return Err(ConfigError::Invalid(format!(
                "max_snapshots must be at least 2, got {}",
                self.max_snapshots
            )));
        }
        if self.period.is_zero() {
            return Err(ConfigError::Invalid("period must be positive".to_string()));
        }
        if self.total_timeout <= self.period {
            return Err(ConfigError::Invalid(format!(
                "total_timeout ({}s) must exceed period ({}s)",
                self.total_timeout.as_secs_f64(),
                self.period.as_secs_f64()
            )));
        }
        let rate = self.thresholds.min_buffer_pool_hit_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::Invalid(format!(
                "min_buffer_pool_hit_rate must be a fraction, got {}",
                rate
            )));
        }
        Ok(())
    }

    /// Instance description for reports; the version is filled in later.
    pub fn instance_info(&self) -> InstanceInfo {
        InstanceInfo {
            host: self.connection.host.clone(),
            port: self.connection.port,
            version: None,
        }
    }
}

/// Accepts whole or fractional seconds.
fn duration_secs<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = InspectorConfig::default();
        assert_eq!(cfg.capture_interval, Duration::from_secs(60));
        assert_eq!(cfg.inspect_interval, Duration::from_secs(300));
        assert_eq!(cfg.max_snapshots, 10);
        assert_eq!(cfg.period, Duration::from_secs(5));
        assert_eq!(cfg.total_timeout, Duration::from_secs(20));
        assert_eq!(cfg.timeouts.global_status, Duration::from_secs(15));
        assert_eq!(cfg.timeouts.table_stats, Duration::from_secs(20));
        assert_eq!(cfg.timeouts.process_list, Duration::from_secs(10));
        assert_eq!(cfg.thresholds.slow_qps, 1.0);
        assert_eq!(cfg.thresholds.max_qps, 1000.0);
        assert_eq!(cfg.thresholds.max_long_query_time, 2.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn json_overrides_merge_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "connection": {{ "host": "db1", "user": "monitor" }},
                "capture_interval": 30,
                "period": 2.5,
                "collectors": {{ "table_space": false }},
                "thresholds": {{ "max_connections": 800 }},
                "output": "json"
            }}"#
        )
        .unwrap();

        let cfg = InspectorConfig::from_json_file(file.path()).unwrap();
        assert_eq!(cfg.connection.host, "db1");
        assert_eq!(cfg.connection.port, 3306);
        assert_eq!(cfg.capture_interval, Duration::from_secs(30));
        assert_eq!(cfg.inspect_interval, Duration::from_secs(300));
        assert_eq!(cfg.period, Duration::from_millis(2500));
        assert!(!cfg.collectors.is_enabled("table_space"));
        assert!(cfg.collectors.is_enabled("performance"));
        assert_eq!(cfg.thresholds.max_connections, 800.0);
        assert_eq!(cfg.thresholds.replica_lag_secs, 300.0);
        assert_eq!(cfg.output, OutputFormat::Json);
    }

    #[test]
    fn unreadable_or_malformed_file_is_reported() {
        let missing = Path::new("/nonexistent/mysql-inspector.json");
        assert!(matches!(
            InspectorConfig::from_json_file(missing),
            Err(ConfigError::Io { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            InspectorConfig::from_json_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cfg = InspectorConfig {
            capture_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = InspectorConfig {
            max_snapshots: 1,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = InspectorConfig {
            total_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn unknown_collectors_are_enabled() {
        let toggles = CollectorToggles::new().with("replication", false);
        assert!(!toggles.is_enabled("replication"));
        assert!(toggles.is_enabled("custom_plugin"));
    }

    #[test]
    fn connection_flags_override_file_values() {
        let mut connection = ConnectionConfig {
            host: "db1".into(),
            user: "monitor".into(),
            ..ConnectionConfig::default()
        };
        let args = ConnectionArgs {
            port: Some(3307),
            password: Some("secret".into()),
            ..ConnectionArgs::default()
        };
        args.apply(&mut connection);
        assert_eq!(connection.host, "db1");
        assert_eq!(connection.user, "monitor");
        assert_eq!(connection.port, 3307);
        assert_eq!(connection.password.as_deref(), Some("secret"));
    }

    #[test]
    fn seconds_parse_fractions() {
        assert_eq!(parse_secs("30"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_secs("2.5"), Ok(Duration::from_millis(2500)));
        assert!(parse_secs("-1").is_err());
        assert!(parse_secs("soon").is_err());
    }
}
