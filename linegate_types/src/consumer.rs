//! The capability contract a downstream point processor implements.

use crate::point::Point;
use async_trait::async_trait;
use std::fmt::Debug;

/// A named, long-lived processor of points for one target database.
///
/// Consumers are registered with the gateway at startup and torn down
/// exactly once during shutdown. The gateway guarantees that `update` is
/// never invoked on behalf of a connection accepted after `stop` has been
/// called on the gateway, and that `stop` runs only after ingress is fully
/// halted.
#[async_trait]
pub trait Consumer: Debug + Send + Sync + 'static {
    /// The database name this consumer is registered under. Read once at
    /// registration time.
    fn db_name(&self) -> &str;

    /// Start the consumer's own processing loop. Invoked by the gateway
    /// once serving has begun; an error here aborts gateway startup.
    async fn start(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Deliver one batch of parsed points. Invoked synchronously from the
    /// request handler, at most once per request.
    async fn update(&self, points: Vec<Point>);

    /// Release all resources this consumer owns. Invoked exactly once
    /// during gateway shutdown.
    async fn stop(&self);
}
