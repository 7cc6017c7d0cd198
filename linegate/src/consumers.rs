//! Consumers the binary can register out of the box.

use async_trait::async_trait;
use linegate_types::{Consumer, Point};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// A [`Consumer`] that counts what it receives and logs each batch.
///
/// Downstream processors with real domain state implement [`Consumer`]
/// themselves and register with the gateway the same way.
#[derive(Debug)]
pub(crate) struct LoggingConsumer {
    db_name: String,
    batches: AtomicUsize,
    points: AtomicUsize,
}

impl LoggingConsumer {
    pub(crate) fn new(db_name: impl Into<String>) -> Self {
        Self {
            db_name: db_name.into(),
            batches: AtomicUsize::new(0),
            points: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Consumer for LoggingConsumer {
    fn db_name(&self) -> &str {
        &self.db_name
    }

    async fn start(&self) -> anyhow::Result<()> {
        info!(db = %self.db_name, "accepting writes");
        Ok(())
    }

    async fn update(&self, points: Vec<Point>) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.points.fetch_add(points.len(), Ordering::Relaxed);
        debug!(db = %self.db_name, n_points = points.len(), "received batch");
    }

    async fn stop(&self) {
        info!(
            db = %self.db_name,
            batches = self.batches.load(Ordering::Relaxed),
            points = self.points.load(Ordering::Relaxed),
            "consumer stopped"
        );
    }
}
