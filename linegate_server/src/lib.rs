//! The linegate gateway core: a stoppable HTTP ingestion server that
//! decodes time-series writes, dispatches them to registered consumers,
//! and optionally mirrors every request to an external store.
//!
//! A [`Gateway`] is an explicit instance object: build one with
//! [`GatewayBuilder`], [`start`](Gateway::start) it, and
//! [`stop`](Gateway::stop) it. Nothing is process-global, so independent
//! gateways can coexist (the tests rely on this).
//!
//! Shutdown is staged: `stop` first halts the listener so no new
//! connection is accepted, then waits for the accept loop to exit, and
//! only then tears down the consumers. Requests that were already past
//! routing when the listener stopped may still complete; no consumer is
//! ever invoked on behalf of a connection accepted afterwards.

pub mod builder;
mod http;
mod listener;
mod mirror;
mod registry;
mod shutdown;
mod tee;

pub use builder::GatewayBuilder;
pub use listener::StoppableListener;
pub use mirror::DEFAULT_MIRROR_CONNECT_TIMEOUT;
pub use registry::ConsumerRegistry;
pub use shutdown::wait_for_signal;

use crate::http::HttpApi;
use hyper::server::conn::Http;
use hyper::service::service_fn;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum Error {
    #[error("gateway has already been started")]
    AlreadyStarted,

    #[error("failed to start consumer for database {db_name}: {source}")]
    ConsumerStart {
        db_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The accept/serve/drain state machine.
#[derive(Debug)]
enum GatewayState {
    Unstarted {
        listener: tokio::net::TcpListener,
    },
    Running {
        listener: Arc<StoppableListener>,
        serve_task: JoinHandle<()>,
    },
    Stopping,
    Stopped,
}

/// One gateway instance: registry, serving loop, and lifecycle.
#[derive(Debug)]
pub struct Gateway {
    pub(crate) api: Arc<HttpApi>,
    pub(crate) registry: Arc<ConsumerRegistry>,
    pub(crate) local_addr: SocketAddr,
    pub(crate) state: Mutex<GatewayState>,
}

impl Gateway {
    /// The address the gateway's listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start serving: wrap the listener, launch the accept loop, then
    /// start every registered consumer's own processing loop.
    ///
    /// When `start` returns, the listener is live and the serving task has
    /// been launched; a caller may immediately issue requests. Serving
    /// itself stays asynchronous.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let listener = match std::mem::replace(&mut *state, GatewayState::Stopped) {
            GatewayState::Unstarted { listener } => listener,
            other => {
                *state = other;
                return Err(Error::AlreadyStarted);
            }
        };

        let listener = Arc::new(StoppableListener::new(listener));
        let serve_task = tokio::spawn(serve(Arc::clone(&self.api), Arc::clone(&listener)));
        info!(address = %self.local_addr, "listening for writes");

        for consumer in self.registry.consumers() {
            if let Err(source) = consumer.start().await {
                // Startup is fatal as a whole: halt ingress again before
                // reporting the failure.
                listener.stop();
                let _ = serve_task.await;
                return Err(Error::ConsumerStart {
                    db_name: consumer.db_name().to_string(),
                    source,
                });
            }
        }

        *state = GatewayState::Running {
            listener,
            serve_task,
        };
        Ok(())
    }

    /// Stop the gateway: halt the listener, wait for the accept loop to
    /// exit, then stop every registered consumer.
    ///
    /// Consumers see no request from any connection accepted after this
    /// call; requests already in flight past routing may still complete.
    /// Calling `stop` before `start`, or a second time, is a no-op.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, GatewayState::Stopping) {
            GatewayState::Running {
                listener,
                serve_task,
            } => {
                listener.stop();
                if let Err(error) = serve_task.await {
                    warn!(%error, "serve task did not exit cleanly");
                }
                info!("stopped http server");

                for consumer in self.registry.consumers() {
                    consumer.stop().await;
                }
                info!("stopped all consumers");
            }
            GatewayState::Unstarted { .. } => {
                // Dropping the listener closes it; the consumers were
                // never started, so there is nothing to stop.
                debug!("stop called before start");
            }
            GatewayState::Stopping | GatewayState::Stopped => {
                debug!("gateway already stopped");
            }
        }
        *state = GatewayState::Stopped;
    }
}

/// Accept connections until the listener is stopped, serving each one on
/// its own task.
async fn serve(api: Arc<HttpApi>, listener: Arc<StoppableListener>) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(error) => {
                info!(%error, "exiting http server");
                break;
            }
        };
        if let Err(error) = stream.set_nodelay(true) {
            warn!(%error, "cannot set TCP_NODELAY on the incoming socket");
        }

        let api = Arc::clone(&api);
        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let api = Arc::clone(&api);
                async move { Ok::<_, Infallible>(api.handle(req).await) }
            });
            if let Err(error) = Http::new().serve_connection(stream, service).await {
                debug!(%remote_addr, %error, "error serving connection");
            }
        });
    }
}
