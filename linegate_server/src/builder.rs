//! Typestate builder for [`Gateway`](crate::Gateway).

use crate::http::HttpApi;
use crate::mirror::{DEFAULT_MIRROR_CONNECT_TIMEOUT, MirrorForwarder};
use crate::registry::ConsumerRegistry;
use crate::{Gateway, GatewayState, Result};
use linegate_types::{Consumer, LpDecoder, PointDecoder, SystemProvider, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct GatewayBuilder<L> {
    listener: L,
    consumers: Vec<Arc<dyn Consumer>>,
    mirror_endpoint: Option<String>,
    mirror_connect_timeout: Duration,
    decoder: Arc<dyn PointDecoder>,
    time_provider: Arc<dyn TimeProvider>,
    max_request_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct NoListener;
#[derive(Debug)]
pub struct WithListener(TcpListener);

impl GatewayBuilder<NoListener> {
    pub fn new() -> Self {
        Self {
            listener: NoListener,
            consumers: vec![],
            mirror_endpoint: None,
            mirror_connect_timeout: DEFAULT_MIRROR_CONNECT_TIMEOUT,
            decoder: Arc::new(LpDecoder::new()),
            time_provider: Arc::new(SystemProvider::new()),
            max_request_bytes: usize::MAX,
        }
    }
}

impl Default for GatewayBuilder<NoListener> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> GatewayBuilder<L> {
    /// Register a consumer under its database name. Registering a second
    /// consumer with the same name replaces the first.
    pub fn register(mut self, consumer: Arc<dyn Consumer>) -> Self {
        self.consumers.push(consumer);
        self
    }

    /// Mirror every request to `endpoint` (`host:port`). Without this, the
    /// request tee is skipped entirely.
    pub fn mirror_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.mirror_endpoint = Some(endpoint.into());
        self
    }

    pub fn mirror_connect_timeout(mut self, timeout: Duration) -> Self {
        self.mirror_connect_timeout = timeout;
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn PointDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn max_request_size(mut self, max_request_bytes: usize) -> Self {
        self.max_request_bytes = max_request_bytes;
        self
    }

    /// The pre-bound listener the gateway will serve from.
    pub fn tcp_listener(self, listener: TcpListener) -> GatewayBuilder<WithListener> {
        GatewayBuilder {
            listener: WithListener(listener),
            consumers: self.consumers,
            mirror_endpoint: self.mirror_endpoint,
            mirror_connect_timeout: self.mirror_connect_timeout,
            decoder: self.decoder,
            time_provider: self.time_provider,
            max_request_bytes: self.max_request_bytes,
        }
    }
}

impl GatewayBuilder<WithListener> {
    pub fn build(self) -> Result<Gateway> {
        let listener = self.listener.0;
        let local_addr = listener.local_addr()?;

        let registry = Arc::new(ConsumerRegistry::new(self.consumers));
        let mirror = self
            .mirror_endpoint
            .map(|endpoint| MirrorForwarder::new(endpoint, self.mirror_connect_timeout));
        let api = Arc::new(HttpApi::new(
            Arc::clone(&registry),
            self.decoder,
            self.time_provider,
            mirror,
            self.max_request_bytes,
        ));

        Ok(Gateway {
            api,
            registry,
            local_addr,
            state: Mutex::new(GatewayState::Unstarted { listener }),
        })
    }
}
