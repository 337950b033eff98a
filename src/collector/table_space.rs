use super::{Classifier, CollectorResult};
use crate::config::Thresholds;
use crate::fmt::format_bytes;
use crate::health::HealthLevel;
use crate::storage::{Snapshot, TableStat};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Tables named in a warning message.
const MAX_LISTED: usize = 3;

/// Table sizes and fragmentation.
pub struct TableSpaceCollector {
    max_table_size_bytes: f64,
    max_fragmentation_pct: f64,
}

impl TableSpaceCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            max_table_size_bytes: thresholds.max_table_size_bytes,
            max_fragmentation_pct: thresholds.max_fragmentation_pct,
        }
    }

    /// `DATA_FREE` as a percentage of `DATA_LENGTH`; `None` for empty tables.
    fn fragmentation_pct(table: &TableStat) -> Option<f64> {
        let data = table.data_length.filter(|d| *d > 0)?;
        Some(table.data_free.unwrap_or(0) as f64 / data as f64 * 100.0)
    }
}

impl Classifier for TableSpaceCollector {
    fn name(&self) -> &'static str {
        "table_space"
    }

    fn classify(&self, snapshot: &Snapshot) -> CollectorResult {
        let mut result = CollectorResult::ok(self.name());

        let mut total_bytes = 0.0;
        let mut large: Vec<(&str, i64)> = Vec::new();
        let mut fragmented: Vec<&str> = Vec::new();

        for (key, table) in &snapshot.tables {
            let size = table.total_bytes();
            total_bytes += size as f64;
            if size as f64 > self.max_table_size_bytes {
                large.push((key, size));
            }
            if Self::fragmentation_pct(table).is_some_and(|pct| pct > self.max_fragmentation_pct) {
                fragmented.push(key);
            }
        }
        large.sort_by(|a, b| b.1.cmp(&a.1));

        result.set("total_size_gb", total_bytes / GIB);
        result.set("table_count", snapshot.tables.len() as f64);
        result.set("large_tables", large.len() as f64);
        result.set("fragmented_tables", fragmented.len() as f64);

        if !large.is_empty() {
            let names: Vec<String> = large
                .iter()
                .take(MAX_LISTED)
                .map(|(name, size)| format!("{} ({})", name, format_bytes(*size as f64)))
                .collect();
            result.raise(
                HealthLevel::Warn,
                format!("{} large tables: {}", large.len(), names.join(", ")),
            );
        }
        if !fragmented.is_empty() {
            let names: Vec<&str> = fragmented.iter().take(MAX_LISTED).copied().collect();
            result.raise(
                HealthLevel::Warn,
                format!(
                    "{} tables over {:.1}% fragmentation: {}",
                    fragmented.len(),
                    self.max_fragmentation_pct,
                    names.join(", ")
                ),
            );
        }
        if result.level == HealthLevel::Ok {
            result.message = format!(
                "{} tables, {} total",
                snapshot.tables.len(),
                format_bytes(total_bytes)
            );
        }
        result
    }
}
