//! Client for the EPO Open Patent Services (OPS) API.
//!
//! OPS requires an OAuth2 bearer token obtained through the client-credentials
//! grant. [`OpsClient`] hides that entirely: it fetches a token on first use,
//! attaches it to every request, and when OPS reports that the token has
//! expired it fetches a new one and retries the request exactly once.
//!
//! The token is cached on the client and shared by all concurrent requests. The
//! cache is best-effort: two requests that both find it empty will both fetch a
//! token and the last one written wins. A request that already copied a token
//! keeps using it even if another request refreshes the cache meanwhile.
//!
//! # Examples
//!
//! ```no_run
//! use duckduckpatent::{
//!   clients::ops::{OpsClient, OpsRequest},
//!   config::OpsConfig,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = OpsConfig::from_env()?;
//! let client = OpsClient::new(config.clone());
//!
//! let request = OpsRequest::get(format!(
//!   "{}/rest-services/published-data/images/EP/1000000/A1/fullimage",
//!   config.base_url
//! ))
//! .accept("application/pdf")
//! .header("X-OPS-Range", "1");
//!
//! let page = client.send_ops_request(request).await?;
//! std::fs::write("page-1.pdf", &page.data)?;
//! # Ok(())
//! # }
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::{
  HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONTENT_TYPE,
};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use super::{
  transport::{HttpRequest, HttpResponse},
  *,
};
use crate::ops::AuthResponse;

/// Path of the OAuth token endpoint relative to the OPS base URL.
pub const AUTH_ENDPOINT: &str = "/auth/accesstoken";

/// Default `Accept` header of OPS requests.
pub const DEFAULT_ACCEPT: &str = "application/json";

/// Default `Accept-Encoding` header of OPS requests.
pub const DEFAULT_ACCEPT_ENCODING: &str = "gzip, deflate, br";

/// Marker OPS puts in the body of a response rejected because of an expired token.
const TOKEN_EXPIRED: &str = "access token has expired";

/// Attempts per request: the original plus one retry after a token refresh.
const MAX_ATTEMPTS: usize = 2;

/// A request to OPS, before authentication headers are attached.
#[derive(Debug, Clone)]
pub struct OpsRequest {
  /// Absolute URL
  pub url:             String,
  /// Extra headers, e.g. `X-OPS-Range`
  pub headers:         Vec<(String, String)>,
  /// Value of the `Accept` header
  pub accept:          String,
  /// Value of the `Accept-Encoding` header
  pub accept_encoding: String,
}

impl OpsRequest {
  /// Creates a `GET` request accepting JSON.
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      url:             url.into(),
      headers:         Vec::new(),
      accept:          DEFAULT_ACCEPT.to_string(),
      accept_encoding: DEFAULT_ACCEPT_ENCODING.to_string(),
    }
  }

  /// Adds an extra header.
  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Sets the `Accept` header.
  pub fn accept(mut self, accept: impl Into<String>) -> Self {
    self.accept = accept.into();
    self
  }

  /// Sets the `Accept-Encoding` header.
  pub fn accept_encoding(mut self, accept_encoding: impl Into<String>) -> Self {
    self.accept_encoding = accept_encoding.into();
    self
  }

  /// Builds the wire request carrying `token`.
  fn authorized(&self, token: &str) -> Result<HttpRequest, PatentError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &self.headers {
      let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
        PatentError::ApiError(format!("Invalid header name {name}: {e}"))
      })?;
      headers.insert(name, HeaderValue::from_str(value)?);
    }
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
    headers.insert(ACCEPT, HeaderValue::from_str(&self.accept)?);
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_str(&self.accept_encoding)?);

    let mut request = HttpRequest::get(&self.url);
    request.headers = headers;
    Ok(request)
  }
}

/// A successful OPS response.
#[derive(Debug, Clone)]
pub struct OpsResponse {
  /// Response body
  pub data:    Vec<u8>,
  /// Response headers as sent by OPS
  pub headers: HeaderMap,
}

impl OpsResponse {
  /// Parses the body as JSON.
  pub fn json<T: DeserializeOwned>(&self) -> Result<T, PatentError> {
    serde_json::from_slice(&self.data)
      .map_err(|e| PatentError::ApiError(format!("Failed to parse JSON: {}", e)))
  }
}

impl From<HttpResponse> for OpsResponse {
  fn from(response: HttpResponse) -> Self {
    Self { data: response.body, headers: response.headers }
  }
}

/// Client for the OPS API with transparent token management.
pub struct OpsClient {
  /// Transport used for all requests, including token requests.
  transport: Arc<dyn Transport>,
  /// OPS base URL and credentials.
  config:    OpsConfig,
  /// Best-effort token cache, filled lazily.
  auth:      RwLock<Option<AuthResponse>>,
}

impl OpsClient {
  /// Creates a client that talks to OPS over HTTP.
  pub fn new(config: OpsConfig) -> Self {
    Self::with_transport(config, Arc::new(HttpTransport::new()))
  }

  /// Creates a client sending its requests through `transport`.
  pub fn with_transport(config: OpsConfig, transport: Arc<dyn Transport>) -> Self {
    Self { transport, config, auth: RwLock::new(None) }
  }

  /// The configuration this client was built with.
  pub fn config(&self) -> &OpsConfig { &self.config }

  /// Requests a new access token with the client-credentials grant.
  ///
  /// The consumer key and secret are sent as HTTP Basic credentials.
  ///
  /// # Errors
  ///
  /// Any failure (unreachable endpoint, rejected credentials, unreadable answer)
  /// is reported as [`PatentError::Unauthorized`] and is not retried.
  pub async fn get_access_token(&self) -> Result<AuthResponse, PatentError> {
    let url = format!("{}{}", self.config.base_url, AUTH_ENDPOINT);
    let credentials =
      STANDARD.encode(format!("{}:{}", self.config.consumer_key, self.config.consumer_secret));

    let mut request = HttpRequest::post(&url, "grant_type=client_credentials");
    request.headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Basic {credentials}"))?);
    request
      .headers
      .insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));

    let response = self.transport.send(request).await.map_err(|e| {
      error!("Error while authenticating with {}: {e}", self.config.base_url);
      PatentError::Unauthorized(e.to_string())
    })?;

    if !response.status.is_success() {
      error!("Error while authenticating with {}: {}", self.config.base_url, response.status);
      return Err(PatentError::Unauthorized(format!(
        "token request failed with status {}: {}",
        response.status,
        response.text()
      )));
    }

    serde_json::from_slice(&response.body).map_err(|e| {
      error!("Unreadable token response from {}: {e}", self.config.base_url);
      PatentError::Unauthorized(format!("unreadable token response: {e}"))
    })
  }

  /// Sends a request to OPS with a bearer token attached.
  ///
  /// A token is fetched first if none is cached. If OPS rejects the request
  /// because the token has expired, the token is refreshed and the request is
  /// sent once more. Any other failure, or a second expiry, is returned as is.
  ///
  /// # Errors
  ///
  /// - [`PatentError::Unauthorized`] if a token cannot be obtained
  /// - [`PatentError::Upstream`] if OPS answers with a non-success status
  /// - [`PatentError::Network`] if no response is received
  pub async fn send_ops_request(&self, request: OpsRequest) -> Result<OpsResponse, PatentError> {
    let mut attempt = 0;
    loop {
      attempt += 1;

      let token = self.access_token().await?;
      let response = self.transport.send(request.authorized(&token)?).await?;

      if response.status.is_success() {
        trace!("OPS response from {}: {} bytes", request.url, response.body.len());
        return Ok(response.into());
      }

      let body = response.text();
      if attempt < MAX_ATTEMPTS && body.to_lowercase().contains(TOKEN_EXPIRED) {
        warn!("OPS access token expired, refreshing before retrying {}", request.url);
        self.refresh_access_token().await?;
        continue;
      }

      debug!("OPS request to {} failed with {}", request.url, response.status);
      return Err(PatentError::Upstream { status: response.status, body });
    }
  }

  /// Returns the cached access token, fetching one if the cache is empty.
  async fn access_token(&self) -> Result<String, PatentError> {
    if let Some(auth) = self.auth.read().await.as_ref() {
      return Ok(auth.access_token.clone());
    }
    self.refresh_access_token().await
  }

  /// Fetches a new access token and stores it in the cache.
  ///
  /// The lock is not held during the token request, so concurrent refreshes may
  /// overlap; the last one to finish is kept.
  async fn refresh_access_token(&self) -> Result<String, PatentError> {
    let auth = self.get_access_token().await?;
    let token = auth.access_token.clone();
    *self.auth.write().await = Some(auth);
    Ok(token)
  }
}
