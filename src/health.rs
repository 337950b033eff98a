//! Health levels and per-pass aggregation.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::collector::CollectorResult;

/// Ordinal health classification. `Ok < Warn < Critical`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthLevel {
    #[default]
    Ok,
    Warn,
    Critical,
}

impl HealthLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthLevel::Ok => "OK",
            HealthLevel::Warn => "WARN",
            HealthLevel::Critical => "CRITICAL",
        }
    }

    /// Process exit code for one-shot checks: 0, 1 or 2.
    pub fn exit_code(self) -> u8 {
        match self {
            HealthLevel::Ok => 0,
            HealthLevel::Warn => 1,
            HealthLevel::Critical => 2,
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of results per level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub ok: usize,
    pub warn: usize,
    pub critical: usize,
}

impl LevelCounts {
    pub fn add(&mut self, level: HealthLevel) {
        match level {
            HealthLevel::Ok => self.ok += 1,
            HealthLevel::Warn => self.warn += 1,
            HealthLevel::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.warn + self.critical
    }
}

impl FromIterator<HealthLevel> for LevelCounts {
    fn from_iter<I: IntoIterator<Item = HealthLevel>>(iter: I) -> Self {
        let mut counts = Self::default();
        for level in iter {
            counts.add(level);
        }
        counts
    }
}

/// Overall level: any CRITICAL wins, then any WARN, else OK.
pub fn aggregate(counts: &LevelCounts) -> HealthLevel {
    if counts.critical > 0 {
        HealthLevel::Critical
    } else if counts.warn > 0 {
        HealthLevel::Warn
    } else {
        HealthLevel::Ok
    }
}

/// Inspected server.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InstanceInfo {
    pub host: String,
    pub port: u16,
    pub version: Option<String>,
}

impl fmt::Display for InstanceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if let Some(v) = &self.version {
            write!(f, " (MySQL {})", v)?;
        }
        Ok(())
    }
}

/// Result of one inspection pass.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub timestamp: DateTime<Utc>,
    pub instance: InstanceInfo,
    /// In collector registration order.
    pub details: Vec<CollectorResult>,
    pub counts: LevelCounts,
    pub overall: HealthLevel,
    #[serde(rename = "elapsed_ms", serialize_with = "duration_ms")]
    pub elapsed: Duration,
    /// Set when a deadline cut the pass short.
    pub partial: bool,
}

impl AggregatedResult {
    pub fn new(instance: InstanceInfo) -> Self {
        Self {
            timestamp: Utc::now(),
            instance,
            details: Vec::new(),
            counts: LevelCounts::default(),
            overall: HealthLevel::Ok,
            elapsed: Duration::ZERO,
            partial: false,
        }
    }

    pub fn push(&mut self, result: CollectorResult) {
        self.counts.add(result.level);
        self.details.push(result);
    }

    /// Computes the overall level and records the pass duration.
    pub fn finish(&mut self, elapsed: Duration) {
        self.overall = aggregate(&self.counts);
        self.elapsed = elapsed;
    }

    pub fn detail(&self, name: &str) -> Option<&CollectorResult> {
        self.details.iter().find(|d| d.name == name)
    }
}

fn duration_ms<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [HealthLevel; 3] = [HealthLevel::Ok, HealthLevel::Warn, HealthLevel::Critical];

    #[test]
    fn precedence() {
        assert_eq!(aggregate(&LevelCounts::default()), HealthLevel::Ok);
        assert_eq!(
            aggregate(&LevelCounts { ok: 5, warn: 1, critical: 0 }),
            HealthLevel::Warn
        );
        assert_eq!(
            aggregate(&LevelCounts { ok: 0, warn: 3, critical: 1 }),
            HealthLevel::Critical
        );
    }

    #[test]
    fn adding_critical_never_lowers() {
        for ok in 0..4 {
            for warn in 0..4 {
                for critical in 0..3 {
                    let before = LevelCounts { ok, warn, critical };
                    let mut after = before;
                    after.add(HealthLevel::Critical);
                    assert!(aggregate(&after) >= aggregate(&before));
                    assert_eq!(aggregate(&after), HealthLevel::Critical);
                }
            }
        }
    }

    #[test]
    fn order_does_not_matter() {
        let levels = [
            HealthLevel::Ok,
            HealthLevel::Warn,
            HealthLevel::Ok,
            HealthLevel::Critical,
        ];
        let forward: LevelCounts = levels.iter().copied().collect();
        let backward: LevelCounts = levels.iter().rev().copied().collect();
        assert_eq!(forward, backward);
        assert_eq!(aggregate(&forward), aggregate(&backward));

        // Aggregate equals the maximum level for every single-level input.
        for level in ALL {
            let counts: LevelCounts = std::iter::once(level).collect();
            assert_eq!(aggregate(&counts), level);
        }
    }

    #[test]
    fn result_counts_and_lookup() {
        let mut agg = AggregatedResult::new(InstanceInfo::default());
        agg.push(CollectorResult::ok("base"));
        let mut warn = CollectorResult::ok("performance");
        warn.raise(HealthLevel::Warn, "slow queries elevated");
        agg.push(warn);
        agg.finish(Duration::from_millis(12));

        assert_eq!(agg.counts.total(), 2);
        assert_eq!(agg.overall, HealthLevel::Warn);
        assert_eq!(agg.detail("performance").unwrap().level, HealthLevel::Warn);
        assert!(agg.detail("missing").is_none());
    }

    #[test]
    fn levels_serialize_uppercase() {
        let json = serde_json::to_string(&HealthLevel::Critical).unwrap();
        assert_eq!(json, "\"CRITICAL\"");
        assert!(HealthLevel::Ok < HealthLevel::Warn);
    }

    #[test]
    fn exit_codes_follow_severity() {
        let codes: Vec<u8> = ALL.iter().map(|l| l.exit_code()).collect();
        assert_eq!(codes, vec![0, 1, 2]);
    }
}
