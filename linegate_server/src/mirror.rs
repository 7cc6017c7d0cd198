//! Best-effort replay of duplicated requests to an external endpoint.

use hyper::{Body, Request};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Default bound on how long a mirror connection attempt may take.
pub const DEFAULT_MIRROR_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
enum ReplayError {
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connect error: {0}")]
    Connect(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),
}

/// Replays requests to a configured `host:port` on a task of their own.
///
/// The forwarder is fire-and-forget: the caller's response path never waits
/// on it, and every failure inside the replay task is logged and contained.
/// A task that dies takes nothing down with it; the serving process is
/// isolated from the mirror's availability.
#[derive(Debug, Clone)]
pub(crate) struct MirrorForwarder {
    endpoint: String,
    connect_timeout: Duration,
}

impl MirrorForwarder {
    pub(crate) fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
        }
    }

    /// Spawn an independent task that writes `req` to the mirror endpoint
    /// over a fresh connection and discards the response.
    pub(crate) fn forward(&self, req: Request<Body>) {
        let endpoint = self.endpoint.clone();
        let connect_timeout = self.connect_timeout;
        tokio::spawn(async move {
            if let Err(error) = replay(&endpoint, connect_timeout, req).await {
                warn!(%endpoint, %error, "unable to mirror request");
            }
        });
    }
}

async fn replay(
    endpoint: &str,
    connect_timeout: Duration,
    req: Request<Body>,
) -> Result<(), ReplayError> {
    let stream = timeout(connect_timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| ReplayError::ConnectTimeout(connect_timeout))??;

    let (mut sender, connection) = hyper::client::conn::handshake(stream).await?;
    let connection = tokio::spawn(async move {
        if let Err(error) = connection.await {
            debug!(%error, "mirror connection error");
        }
    });

    // Waiting for the response head lets the remote finish processing the
    // write before the connection is torn down. The response itself is
    // discarded.
    let response = sender.send_request(req).await?;
    debug!(status = %response.status(), "mirror accepted request");

    drop(response);
    drop(sender);
    let _ = connection.await;

    Ok(())
}
