//! Wall-clock access behind a trait so tests can pin the reference time.

use chrono::Utc;
use std::fmt::Debug;

pub trait TimeProvider: Debug + Send + Sync + 'static {
    /// Current wall-clock time in nanoseconds since the Unix epoch.
    fn now_nanos(&self) -> i64;
}

/// [`TimeProvider`] backed by the system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProvider;

impl SystemProvider {
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemProvider {
    fn now_nanos(&self) -> i64 {
        // Out of range only beyond the year 2262.
        Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}
