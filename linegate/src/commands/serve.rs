//! Entrypoint for the linegate server

use crate::consumers::LoggingConsumer;
use clap::Parser;
use linegate_server::{GatewayBuilder, wait_for_signal};
use linegate_types::Consumer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

/// The default bind address for the HTTP API.
pub(crate) const DEFAULT_HTTP_BIND_ADDR: &str = "0.0.0.0:8181";

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error("failed to bind address {addr}: {source}")]
    BindAddress {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(#[from] linegate_server::Error),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Parser)]
pub(crate) struct Config {
    /// The address on which the gateway will serve its HTTP write API
    #[clap(
        long = "http-bind",
        env = "LINEGATE_HTTP_BIND_ADDR",
        default_value = DEFAULT_HTTP_BIND_ADDR,
        action
    )]
    http_bind_address: SocketAddr,

    /// A database name to accept writes for; repeatable
    ///
    /// Each database gets its own consumer. Writes addressed to any other
    /// database are accepted and dropped.
    #[clap(
        long = "db",
        env = "LINEGATE_DBS",
        value_delimiter = ',',
        action
    )]
    dbs: Vec<String>,

    /// `host:port` of an external store to mirror every request to
    ///
    /// Mirroring is best-effort: failures are logged and never affect the
    /// caller. Without this flag, no request is duplicated.
    #[clap(long = "mirror-addr", env = "LINEGATE_MIRROR_ADDR", action)]
    mirror_address: Option<String>,

    /// Bound on how long a mirror connection attempt may take
    #[clap(
        long = "mirror-connect-timeout",
        env = "LINEGATE_MIRROR_CONNECT_TIMEOUT",
        default_value = "1s",
        value_parser = humantime::parse_duration,
        action
    )]
    mirror_connect_timeout: Duration,

    /// Maximum size of HTTP requests.
    #[clap(
        long = "max-http-request-size",
        env = "LINEGATE_MAX_HTTP_REQUEST_SIZE",
        default_value = "10485760", // 10 MiB
        action
    )]
    max_http_request_size: usize,
}

pub(crate) async fn command(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.http_bind_address)
        .await
        .map_err(|source| Error::BindAddress {
            addr: config.http_bind_address,
            source,
        })?;

    let mut builder = GatewayBuilder::new().max_request_size(config.max_http_request_size);
    for db in config.dbs {
        builder = builder.register(Arc::new(LoggingConsumer::new(db)) as Arc<dyn Consumer>);
    }
    if let Some(endpoint) = config.mirror_address {
        builder = builder
            .mirror_endpoint(endpoint)
            .mirror_connect_timeout(config.mirror_connect_timeout);
    }

    let gateway = builder.tcp_listener(listener).build()?;
    gateway.start().await?;

    wait_for_signal().await;

    gateway.stop().await;
    info!("linegate server shutdown");
    Ok(())
}
