//! A TCP listener whose accept loop can be halted from the outside.

use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// Wraps a bound [`TcpListener`] so that "stop accepting new connections"
/// is a discrete operation, independent of whoever is sitting in
/// [`accept`](Self::accept).
///
/// Once [`stop`](Self::stop) has been invoked, every current and future
/// `accept` call returns an error as if the listener had been closed.
/// `stop` is safe to call concurrently with an in-progress accept, more
/// than once, or before any accept has happened.
#[derive(Debug)]
pub struct StoppableListener {
    inner: TcpListener,
    stopped: CancellationToken,
}

impl StoppableListener {
    pub fn new(inner: TcpListener) -> Self {
        Self {
            inner,
            stopped: CancellationToken::new(),
        }
    }

    /// The local address the wrapped listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Stop accepting new connections. Idempotent.
    pub fn stop(&self) {
        self.stopped.cancel();
    }

    /// Accept the next connection, or return an error once the listener
    /// has been stopped.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        tokio::select! {
            _ = self.stopped.cancelled() => Err(Self::closed()),
            conn = self.inner.accept() => conn,
        }
    }

    fn closed() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "listener stopped")
    }
}
