//! Ordered collector registry.

use std::sync::Arc;

use tracing::warn;

use super::base::BaseCollector;
use super::buffer_pool::BufferPoolCollector;
use super::connection::ConnectionCollector;
use super::performance::PerformanceCollector;
use super::replication::ReplicationCollector;
use super::sessions::SessionsCollector;
use super::slow_query::SlowQueryCollector;
use super::table_space::TableSpaceCollector;
use super::{Classifier, DeltaClassifier, RegisteredCollector};
use crate::config::{CollectorToggles, Thresholds};

/// Holds collectors in registration order, which is also execution and
/// report order. Names are unique.
#[derive(Clone, Debug, Default)]
pub struct CollectorRegistry {
    entries: Vec<RegisteredCollector>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in collectors configured with `thresholds`.
    pub fn with_defaults(thresholds: &Thresholds) -> Self {
        let mut registry = Self::new();
        registry.register_stateless(Arc::new(BaseCollector::new(thresholds)));
        registry.register_stateless(Arc::new(ConnectionCollector::new(thresholds)));
        registry.register_stateless(Arc::new(BufferPoolCollector::new(thresholds)));
        registry.register_stateless(Arc::new(ReplicationCollector::new(thresholds)));
        registry.register_stateless(Arc::new(TableSpaceCollector::new(thresholds)));
        registry.register_stateless(Arc::new(SessionsCollector::new(thresholds)));
        registry.register_stateless(Arc::new(SlowQueryCollector::new(thresholds)));
        registry.register_delta(Arc::new(PerformanceCollector::new(thresholds)));
        registry
    }

    /// Adds a collector. A duplicate name is ignored with a warning.
    pub fn register(&mut self, collector: RegisteredCollector) {
        let name = collector.name();
        if self.entries.iter().any(|c| c.name() == name) {
            warn!(collector = name, "collector already registered, ignoring");
            return;
        }
        self.entries.push(collector);
    }

    pub fn register_stateless(&mut self, collector: Arc<dyn Classifier>) {
        self.register(RegisteredCollector::Stateless(collector));
    }

    pub fn register_delta(&mut self, collector: Arc<dyn DeltaClassifier>) {
        self.register(RegisteredCollector::Delta(collector));
    }

    /// Enabled collectors of both kinds, in registration order.
    pub fn enabled<'a>(
        &'a self,
        toggles: &'a CollectorToggles,
    ) -> impl Iterator<Item = &'a RegisteredCollector> + 'a {
        self.entries.iter().filter(|c| toggles.is_enabled(c.name()))
    }

    pub fn enabled_stateless(&self, toggles: &CollectorToggles) -> Vec<Arc<dyn Classifier>> {
        self.enabled(toggles)
            .filter_map(|c| match c {
                RegisteredCollector::Stateless(s) => Some(Arc::clone(s)),
                RegisteredCollector::Delta(_) => None,
            })
            .collect()
    }

    pub fn enabled_delta(&self, toggles: &CollectorToggles) -> Vec<Arc<dyn DeltaClassifier>> {
        self.enabled(toggles)
            .filter_map(|c| match c {
                RegisteredCollector::Delta(d) => Some(Arc::clone(d)),
                RegisteredCollector::Stateless(_) => None,
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|c| c.name()).collect()
    }

    /// Position of `name` in registration order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorKind;

    #[test]
    fn defaults_in_documented_order() {
        let registry = CollectorRegistry::with_defaults(&Thresholds::default());
        assert_eq!(
            registry.names(),
            vec![
                "base",
                "connection",
                "buffer_pool",
                "replication",
                "table_space",
                "sessions",
                "slow_query",
                "performance"
            ]
        );
        assert_eq!(registry.position("performance"), Some(7));
    }

    #[test]
    fn per_kind_lists_respect_toggles() {
        let registry = CollectorRegistry::with_defaults(&Thresholds::default());
        let toggles = CollectorToggles::new()
            .with("table_space", false)
            .with("performance", false)
            .with("nonexistent", false);

        let stateless: Vec<_> = registry
            .enabled_stateless(&toggles)
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(
            stateless,
            vec![
                "base",
                "connection",
                "buffer_pool",
                "replication",
                "sessions",
                "slow_query"
            ]
        );
        assert!(registry.enabled_delta(&toggles).is_empty());
        assert_eq!(registry.enabled_delta(&CollectorToggles::new()).len(), 1);
    }

    #[test]
    fn duplicate_names_are_ignored() {
        let thresholds = Thresholds::default();
        let mut registry = CollectorRegistry::new();
        registry.register_stateless(Arc::new(BaseCollector::new(&thresholds)));
        registry.register_stateless(Arc::new(BaseCollector::new(&thresholds)));
        assert_eq!(registry.len(), 1);
        let toggles = CollectorToggles::new();
        let first = registry.enabled(&toggles).next().unwrap();
        assert_eq!(first.kind(), CollectorKind::Stateless);
    }
}
