//! HTTP transport seam for the resilient executor.
//!
//! Provides:
//! - [`RequestSpec`] / [`HttpResponse`], the values callers exchange with the executor
//! - [`Transport`], one HTTP exchange returning headers and an unread body stream
//! - [`HttpTransport`], the reqwest-backed implementation

use crate::config::NetworkConfig;
use crate::error::{NetError, Result};
use crate::network::classify::TransportError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use std::time::Duration;
use url::Url;

/// One logical request as handed to the executor.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    /// Path (and query) resolved against the executor's base URL.
    pub path: String,
    pub headers: HeaderMap,
    /// Request body; resent in full on every attempt.
    pub body: Option<Bytes>,
}

impl RequestSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// A request with its URL resolved, ready for a transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl PreparedRequest {
    /// Resolve `spec.path` against `base`.
    pub fn resolve(base: &Url, spec: RequestSpec) -> Result<Self> {
        let url = base.join(&spec.path).map_err(|e| NetError::InvalidRequest {
            message: format!("cannot resolve {} against {}: {}", spec.path, base, e),
        })?;
        Ok(Self {
            method: spec.method,
            url,
            headers: spec.headers,
            body: spec.body,
        })
    }
}

/// Streamed response body, read exactly once.
pub type BodyStream = BoxStream<'static, std::result::Result<Bytes, TransportError>>;

/// Response headers with a body that has not been read yet.
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl RawResponse {
    /// Build a response from an in-memory body.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers,
            body: stream::once(async move { Ok(body) }).boxed(),
        }
    }

    /// Drain the body stream into one buffer.
    pub async fn read_body(mut self) -> std::result::Result<HttpResponse, TransportError> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(HttpResponse {
            status: self.status,
            headers: self.headers,
            body: buf.freeze(),
        })
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl HttpResponse {
    /// Body as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A single HTTP exchange.
///
/// Implementations report failures before the response head arrives as
/// `Err`; every received response, whatever its status, is `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &PreparedRequest,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Create a transport with the default request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a transport with a custom overall request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        Self::with_options(timeout, NetworkConfig::USER_AGENT)
    }

    pub fn with_options(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| NetError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if an HTTP status code indicates a retryable error.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &PreparedRequest,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;

        Ok(RawResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.bytes_stream().map_err(TransportError::from).boxed(),
        })
    }
}
