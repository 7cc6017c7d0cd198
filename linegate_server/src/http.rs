//! The HTTP surface of the gateway: one ingestion endpoint plus the
//! standing operational endpoints.

use crate::mirror::MirrorForwarder;
use crate::registry::ConsumerRegistry;
use crate::tee;
use bytes::{Bytes, BytesMut};
use hyper::body::HttpBody;
use hyper::header::{CONTENT_ENCODING, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use linegate_types::{DecodeError, PointDecoder, Precision, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub(crate) enum Error {
    /// The requested path has no registered handler.
    #[error("not found")]
    NoHandler,

    /// The HTTP request method is not supported for this resource.
    #[error("unsupported method")]
    UnsupportedMethod,

    /// The request body content is not valid utf8.
    #[error("body content is not valid utf8: {0}")]
    NonUtf8Body(#[from] std::str::Utf8Error),

    /// The client disconnected while the body was being read.
    #[error("client disconnected: {0}")]
    ClientHangup(#[source] hyper::Error),

    /// The client sent a request body that exceeds the configured maximum.
    #[error("max request size ({0} bytes) exceeded")]
    RequestSizeExceeded(usize),

    /// Decoding a gzip-compressed stream of data failed.
    #[error("error decoding gzip stream: {0}")]
    InvalidGzip(std::io::Error),

    /// The decoder rejected the body. Displays as the decoder's own error
    /// text, which becomes the response body.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Serde decode error
    #[error("serde error: {0}")]
    SerdeUrlDecoding(#[from] serde_urlencoded::de::Error),

    /// Serde json error
    #[error("serde json error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    fn into_response(self) -> Response<Body> {
        let status = match &self {
            Self::NoHandler => StatusCode::NOT_FOUND,
            Self::UnsupportedMethod => StatusCode::METHOD_NOT_ALLOWED,
            Self::RequestSizeExceeded(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        Response::builder()
            .status(status)
            .body(Body::from(self.to_string()))
            .unwrap()
    }
}

/// Query parameters accepted by the write endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct WriteParams {
    pub(crate) db: Option<String>,
    #[serde(default)]
    pub(crate) precision: Precision,
}

#[derive(Debug, Serialize)]
struct PingResponse {
    version: &'static str,
}

/// Per-request handler state: the registry, the decoder, and the optional
/// mirror. Shared by every connection task.
#[derive(Debug)]
pub(crate) struct HttpApi {
    registry: Arc<ConsumerRegistry>,
    decoder: Arc<dyn PointDecoder>,
    time_provider: Arc<dyn TimeProvider>,
    mirror: Option<MirrorForwarder>,
    max_request_bytes: usize,
}

impl HttpApi {
    pub(crate) fn new(
        registry: Arc<ConsumerRegistry>,
        decoder: Arc<dyn PointDecoder>,
        time_provider: Arc<dyn TimeProvider>,
        mirror: Option<MirrorForwarder>,
        max_request_bytes: usize,
    ) -> Self {
        Self {
            registry,
            decoder,
            time_provider,
            mirror,
            max_request_bytes,
        }
    }

    /// Entry point for every request the serve loop hands over. When a
    /// mirror endpoint is configured the request is teed first, so the
    /// mirror sees the same bytes regardless of how routing turns out.
    pub(crate) async fn handle(&self, req: Request<Body>) -> Response<Body> {
        let req = match &self.mirror {
            Some(mirror) => {
                let (primary, copy) = tee::duplicate_request(req, self.max_request_bytes).await;
                mirror.forward(copy);
                primary
            }
            None => req,
        };

        match self.route(req).await {
            Ok(response) => response,
            Err(error @ (Error::NoHandler | Error::UnsupportedMethod)) => {
                debug!(%error, "rejecting request");
                error.into_response()
            }
            Err(error) => {
                warn!(%error, "error handling write request");
                error.into_response()
            }
        }
    }

    async fn route(&self, req: Request<Body>) -> Result<Response<Body>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        match (method, path.as_str()) {
            (Method::POST, "/write") => self.write_lp(req).await,
            (_, "/write") => Err(Error::UnsupportedMethod),
            (Method::GET | Method::POST, "/health") => self.health(),
            (Method::GET | Method::POST, "/ping") => self.ping(),
            _ => Err(Error::NoHandler),
        }
    }

    async fn write_lp(&self, req: Request<Body>) -> Result<Response<Body>> {
        let query = req.uri().query().unwrap_or_default();
        let params: WriteParams = serde_urlencoded::from_str(query)?;

        // The body is read, and any gzip undone, before routing: a corrupt
        // stream is the sender's error no matter which database it names.
        let body = self.read_body(req).await?;
        let body = std::str::from_utf8(&body)?;

        // A write for an unregistered database is a silent no-op, not an
        // error; the body is dropped unparsed.
        let consumer = params.db.as_deref().and_then(|db| self.registry.resolve(db));
        let Some(consumer) = consumer else {
            warn!(db = params.db.as_deref().unwrap_or_default(), "unregistered database");
            return Ok(no_content());
        };
        let consumer = Arc::clone(consumer);

        let default_time = self.time_provider.now_nanos();
        let points = match self.decoder.decode(body, default_time, params.precision) {
            Ok(points) => points,
            Err(DecodeError::EndOfInput) => {
                debug!(db = consumer.db_name(), "write body contained no points");
                return Ok(Response::builder()
                    .status(StatusCode::OK)
                    .body(Body::empty())
                    .unwrap());
            }
            Err(error) => return Err(error.into()),
        };

        debug!(db = consumer.db_name(), n_points = points.len(), "dispatching points");
        consumer.update(points).await;

        Ok(no_content())
    }

    fn health(&self) -> Result<Response<Body>> {
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from("OK"))
            .unwrap())
    }

    fn ping(&self) -> Result<Response<Body>> {
        let body = serde_json::to_string(&PingResponse {
            version: env!("CARGO_PKG_VERSION"),
        })?;

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap())
    }

    /// Collect the request body into memory, applying the configured size
    /// limit and undoing any gzip content encoding.
    async fn read_body(&self, req: Request<Body>) -> Result<Bytes> {
        // Only gzip is undone; any other content encoding passes through
        // unmodified and takes its chances with the decoder.
        let ungzip = req
            .headers()
            .get(&CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            == Some("gzip");

        let mut payload = req.into_body();
        let mut body = BytesMut::new();
        while let Some(chunk) = payload.data().await {
            let chunk = chunk.map_err(Error::ClientHangup)?;
            if body.len() + chunk.len() > self.max_request_bytes {
                return Err(Error::RequestSizeExceeded(self.max_request_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        let body = body.freeze();

        if !ungzip {
            return Ok(body);
        }

        // Read one byte beyond the limit so that a decompression bomb which
        // would exceed it is detected instead of silently truncated.
        use std::io::Read;
        let decoder = flate2::read::MultiGzDecoder::new(&body[..]);
        let mut decoder = decoder.take((self.max_request_bytes as u64).saturating_add(1));
        let mut decoded = Vec::new();
        decoder.read_to_end(&mut decoded).map_err(Error::InvalidGzip)?;
        if decoded.len() > self.max_request_bytes {
            return Err(Error::RequestSizeExceeded(self.max_request_bytes));
        }

        Ok(decoded.into())
    }
}

fn no_content() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Body::empty())
        .unwrap()
}
