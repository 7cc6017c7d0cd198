//! Shared helpers for linegate tests.

use async_trait::async_trait;
use linegate_types::{Consumer, Point, TimeProvider};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A [`Consumer`] that records every interaction for later assertions.
#[derive(Debug, Default)]
pub struct MockConsumer {
    db_name: String,
    updates: Mutex<Vec<Vec<Point>>>,
    started: AtomicBool,
    stop_calls: AtomicUsize,
}

impl MockConsumer {
    pub fn new(db_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            db_name: db_name.into(),
            ..Default::default()
        })
    }

    /// Every batch of points delivered so far, in order.
    pub fn updates(&self) -> Vec<Vec<Point>> {
        self.updates.lock().clone()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Consumer for MockConsumer {
    fn db_name(&self) -> &str {
        &self.db_name
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, points: Vec<Point>) {
        self.updates.lock().push(points);
    }

    async fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`TimeProvider`] that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct MockProvider {
    now_nanos: i64,
}

impl MockProvider {
    pub fn new(now_nanos: i64) -> Self {
        Self { now_nanos }
    }
}

impl TimeProvider for MockProvider {
    fn now_nanos(&self) -> i64 {
        self.now_nanos
    }
}

/// Gzip-compress `data` the way a client would before setting
/// `Content-Encoding: gzip`.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}
