//! The startup-time mapping from database name to consumer.

use linegate_types::Consumer;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Immutable mapping from database name to its registered [`Consumer`].
///
/// Built once when the gateway is configured and never mutated afterwards,
/// which is what makes lock-free concurrent lookup from every in-flight
/// request safe.
#[derive(Debug, Default)]
pub struct ConsumerRegistry {
    consumers: HashMap<String, Arc<dyn Consumer>>,
}

impl ConsumerRegistry {
    pub fn new(consumers: impl IntoIterator<Item = Arc<dyn Consumer>>) -> Self {
        let mut map: HashMap<String, Arc<dyn Consumer>> = HashMap::new();
        for consumer in consumers {
            let db_name = consumer.db_name().to_string();
            if map.insert(db_name.clone(), consumer).is_some() {
                // A database name can only have one owner; the last
                // registration wins.
                warn!(db = %db_name, "replacing previously registered consumer");
            } else {
                info!(db = %db_name, "registered database");
            }
        }

        Self { consumers: map }
    }

    /// Look up the consumer registered under `db_name`, if any. Names are
    /// case-sensitive.
    pub fn resolve(&self, db_name: &str) -> Option<&Arc<dyn Consumer>> {
        self.consumers.get(db_name)
    }

    pub fn consumers(&self) -> impl Iterator<Item = &Arc<dyn Consumer>> + '_ {
        self.consumers.values()
    }

    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linegate_test_helpers::MockConsumer;

    #[test]
    fn resolves_by_exact_name() {
        let registry = ConsumerRegistry::new([
            MockConsumer::new("metrics") as Arc<dyn Consumer>,
            MockConsumer::new("voip") as Arc<dyn Consumer>,
        ]);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("metrics").unwrap().db_name(), "metrics");
        assert_eq!(registry.resolve("voip").unwrap().db_name(), "voip");
        assert!(registry.resolve("Metrics").is_none());
        assert!(registry.resolve("unknown").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let first = MockConsumer::new("metrics");
        let second = MockConsumer::new("metrics");
        let registry = ConsumerRegistry::new([
            Arc::clone(&first) as Arc<dyn Consumer>,
            Arc::clone(&second) as Arc<dyn Consumer>,
        ]);

        assert_eq!(registry.len(), 1);
        let resolved = registry.resolve("metrics").unwrap();
        assert!(Arc::ptr_eq(resolved, &(second as Arc<dyn Consumer>)));
    }
}
