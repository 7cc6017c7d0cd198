//! Client for the linegate HTTP write API.

use std::io::Write as _;
use std::string::FromUtf8Error;

use bytes::Bytes;
use reqwest::header::CONTENT_ENCODING;
use reqwest::{IntoUrl, Method, StatusCode};
use serde::{Deserialize, Serialize};
use url::Url;

pub use linegate_types::Precision;

/// Primary error type for the [`Client`]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("base URL error: {0}")]
    BaseUrl(#[source] reqwest::Error),

    #[error("request URL error: {0}")]
    RequestUrl(#[from] url::ParseError),

    #[error("failed to read the API response bytes: {0}")]
    Bytes(#[source] reqwest::Error),

    #[error("invalid UTF8 in response: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("failed to parse JSON response: {0}")]
    Json(#[source] reqwest::Error),

    #[error("failed to gzip request body: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("server responded with error [{code}]: {message}")]
    ApiError { code: StatusCode, message: String },

    #[error("failed to send {method} {url} request: {source}")]
    RequestSend {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    fn request_send(method: Method, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::RequestSend {
            method,
            url: url.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// The linegate client
///
/// For programmatic access to the HTTP API of a running linegate server
#[derive(Debug, Clone)]
pub struct Client {
    /// The base URL for making requests to a running linegate server
    base_url: Url,
    /// A [`reqwest::Client`] for handling HTTP requests
    http_client: reqwest::Client,
}

impl Client {
    /// Create a new [`Client`]
    pub fn new<U: IntoUrl>(base_url: U) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into_url().map_err(Error::BaseUrl)?,
            http_client: reqwest::Client::new(),
        })
    }

    /// Compose a request to the `/write` API
    ///
    /// # Example
    /// ```no_run
    /// # use linegate_client::Client;
    /// # use linegate_types::Precision;
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    /// let client = Client::new("http://localhost:8181")?;
    /// client
    ///     .write("db_name")
    ///     .precision(Precision::Millisecond)
    ///     .body("cpu,host=s1 usage=0.5")
    ///     .send()
    ///     .await
    ///     .expect("send write request");
    /// # Ok(())
    /// # }
    /// ```
    pub fn write<S: Into<String>>(&self, db: S) -> WriteRequestBuilder<'_, NoBody> {
        WriteRequestBuilder {
            client: self,
            db: db.into(),
            precision: None,
            gzip: false,
            body: NoBody,
        }
    }

    /// Make a request to the `GET /health` API
    pub async fn health(&self) -> Result<()> {
        let url = self.base_url.join("/health")?;
        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|src| Error::request_send(Method::GET, "/health", src))?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let content = resp.bytes().await.map_err(Error::Bytes)?;
            Err(Error::ApiError {
                code: status,
                message: String::from_utf8(content.to_vec())?,
            })
        }
    }

    /// Make a request to the `GET /ping` API
    pub async fn ping(&self) -> Result<PingResponse> {
        let url = self.base_url.join("/ping")?;
        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|src| Error::request_send(Method::GET, "/ping", src))?;
        let status = resp.status();
        if !status.is_success() {
            let content = resp.bytes().await.map_err(Error::Bytes)?;
            return Err(Error::ApiError {
                code: status,
                message: String::from_utf8(content.to_vec())?,
            });
        }
        resp.json().await.map_err(Error::Json)
    }
}

/// The response of the `GET /ping` API
#[derive(Debug, Clone, Deserialize)]
pub struct PingResponse {
    version: String,
}

impl PingResponse {
    /// Get the `version` from the response
    pub fn version(&self) -> &str {
        &self.version
    }
}

/// The URL parameters of the request to the `/write` API
#[derive(Debug, Serialize)]
struct WriteParams<'a> {
    db: &'a str,
    precision: Option<Precision>,
}

impl<'a, B> From<&'a WriteRequestBuilder<'a, B>> for WriteParams<'a> {
    fn from(builder: &'a WriteRequestBuilder<'a, B>) -> Self {
        Self {
            db: &builder.db,
            precision: builder.precision,
        }
    }
}

/// Builder type for composing a request to `/write`
///
/// Produced by [`Client::write`]
#[derive(Debug)]
pub struct WriteRequestBuilder<'c, B> {
    client: &'c Client,
    db: String,
    precision: Option<Precision>,
    gzip: bool,
    body: B,
}

impl<B> WriteRequestBuilder<'_, B> {
    /// Set the precision
    pub fn precision(mut self, set_to: Precision) -> Self {
        self.precision = Some(set_to);
        self
    }

    /// Gzip-compress the body and set `Content-Encoding: gzip` when sending
    pub fn gzip(mut self, set_to: bool) -> Self {
        self.gzip = set_to;
        self
    }
}

impl<'c> WriteRequestBuilder<'c, NoBody> {
    /// Set the body of the request to the `/write` API
    pub fn body<T: Into<Bytes>>(self, body: T) -> WriteRequestBuilder<'c, Bytes> {
        WriteRequestBuilder {
            client: self.client,
            db: self.db,
            precision: self.precision,
            gzip: self.gzip,
            body: body.into(),
        }
    }
}

impl WriteRequestBuilder<'_, Bytes> {
    /// Send the request to the server
    ///
    /// Both "accepted and dispatched" (204) and "nothing to ingest" (200)
    /// count as success; any other status surfaces as
    /// [`ApiError`](Error::ApiError) carrying the response body.
    pub async fn send(self) -> Result<()> {
        let url = self.client.base_url.join("/write")?;
        let params = WriteParams::from(&self);
        let mut req = self.client.http_client.post(url).query(&params);
        let body = if self.gzip {
            req = req.header(CONTENT_ENCODING, "gzip");
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&self.body).map_err(Error::Gzip)?;
            encoder.finish().map_err(Error::Gzip)?
        } else {
            self.body.to_vec()
        };
        let resp = req
            .body(body)
            .send()
            .await
            .map_err(|src| Error::request_send(Method::POST, "/write", src))?;
        let status = resp.status();
        let content = resp.bytes().await.map_err(Error::Bytes)?;
        match status {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            code => Err(Error::ApiError {
                code,
                message: String::from_utf8(content.to_vec())?,
            }),
        }
    }
}

#[doc(hidden)]
/// Typestate type for [`WriteRequestBuilder`]
#[derive(Debug, Copy, Clone)]
pub struct NoBody;
