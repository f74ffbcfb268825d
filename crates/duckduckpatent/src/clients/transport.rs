//! The HTTP seam shared by all clients.
//!
//! Clients build a [`HttpRequest`] and hand it to a [`Transport`]. The transport
//! only moves bytes: it does not interpret status codes, so a non-success
//! response is returned as a regular [`HttpResponse`] and it is up to the client
//! to decide what it means.

use async_trait::async_trait;
use reqwest::{header::HeaderMap, Method, StatusCode};

use super::*;

/// An outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
  /// HTTP method
  pub method:  Method,
  /// Absolute URL
  pub url:     String,
  /// Request headers
  pub headers: HeaderMap,
  /// Optional request body
  pub body:    Option<String>,
}

impl HttpRequest {
  /// Creates a `GET` request without headers.
  pub fn get(url: impl Into<String>) -> Self {
    Self { method: Method::GET, url: url.into(), headers: HeaderMap::new(), body: None }
  }

  /// Creates a `POST` request with the given body.
  pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
    Self {
      method:  Method::POST,
      url:     url.into(),
      headers: HeaderMap::new(),
      body:    Some(body.into()),
    }
  }
}

/// A response as received from the network.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  /// Response status
  pub status:  StatusCode,
  /// Response headers
  pub headers: HeaderMap,
  /// Raw (already decompressed) response body
  pub body:    Vec<u8>,
}

impl HttpResponse {
  /// The body decoded as UTF-8, replacing invalid sequences.
  pub fn text(&self) -> String { String::from_utf8_lossy(&self.body).into_owned() }
}

/// Sends requests over the network.
///
/// Implementations return `Err` only when no response was received at all.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Sends a request and returns whatever the server answered.
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PatentError>;
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
  /// Internal web client used to connect to the APIs.
  client: reqwest::Client,
}

impl HttpTransport {
  /// Creates a transport with a fresh connection pool.
  pub fn new() -> Self { Self { client: reqwest::Client::new() } }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PatentError> {
    debug!("{} {}", request.method, request.url);

    let mut builder = self.client.request(request.method, &request.url).headers(request.headers);
    if let Some(body) = request.body {
      builder = builder.body(body);
    }

    let response = builder.send().await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await?.to_vec();

    debug!("Response status: {status}, {} bytes", body.len());

    Ok(HttpResponse { status, headers, body })
  }
}
