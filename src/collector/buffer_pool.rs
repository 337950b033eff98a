use super::{Classifier, CollectorResult};
use crate::config::Thresholds;
use crate::health::HealthLevel;
use crate::storage::Snapshot;

const EXPECTED: &[&str] = &[
    "Innodb_buffer_pool_pages_data",
    "Innodb_buffer_pool_pages_dirty",
    "Innodb_buffer_pool_read_requests",
    "Innodb_buffer_pool_reads",
    "Innodb_buffer_pool_pages_free",
    "Innodb_buffer_pool_pages_total",
    "Innodb_buffer_pool_pages_misc",
    "Innodb_buffer_pool_pages_old",
    "Innodb_buffer_pool_write_requests",
    "Innodb_buffer_pool_pages_flushed",
];

const MIB: f64 = 1024.0 * 1024.0;

/// InnoDB buffer pool occupancy and read hit rate.
pub struct BufferPoolCollector {
    min_hit_rate: f64,
}

impl BufferPoolCollector {
    pub fn new(thresholds: &Thresholds) -> Self {
        Self {
            min_hit_rate: thresholds.min_buffer_pool_hit_rate,
        }
    }
}

/// `1 - reads/requests` as a fraction; `None` without requests.
pub fn hit_rate(reads: Option<f64>, requests: Option<f64>) -> Option<f64> {
    let (reads, requests) = (reads?, requests?);
    if requests <= 0.0 || reads < 0.0 {
        return None;
    }
    let hit = 1.0 - reads / requests;
    (hit >= 0.0).then_some(hit)
}

impl Classifier for BufferPoolCollector {
    fn name(&self) -> &'static str {
        "buffer_pool"
    }

    fn classify(&self, snapshot: &Snapshot) -> CollectorResult {
        let mut result = CollectorResult::with_expected(self.name(), snapshot, EXPECTED);

        let pages_total = result.metric("Innodb_buffer_pool_pages_total");
        let page_size = snapshot.counter("Innodb_page_size");
        let size_mb = pages_total.zip(page_size).map(|(p, s)| p * s / MIB);
        result.set_opt("innodb_buffer_pool_size", size_mb);

        let hit = hit_rate(
            result.metric("Innodb_buffer_pool_reads"),
            result.metric("Innodb_buffer_pool_read_requests"),
        );
        result.set_opt("hit_rate", hit);

        match hit {
            Some(h) if h < self.min_hit_rate => {
                result.raise(
                    HealthLevel::Warn,
                    format!(
                        "low buffer pool hit rate: {:.2}% < {:.2}%",
                        h * 100.0,
                        self.min_hit_rate * 100.0
                    ),
                );
            }
            Some(h) => result.message = format!("hit rate {:.2}%", h * 100.0),
            None => result.message = "hit rate unavailable".to_string(),
        }
        result
    }
}
