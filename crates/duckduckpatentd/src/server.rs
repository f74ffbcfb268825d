//! HTTP API consumed by the DuckDuckPatent web client.
//!
//! Routes:
//! - `GET /patents` searches; the total hit count is sent as `X-Total-Count`
//! - `GET /patents/{id}` looks up a single patent
//! - `GET /patents/{id}/family` lists the family of a patent, with `X-Total-Count`
//! - `GET /patents/{id}/documents` lists the retrievable documents of a patent
//! - `GET /patents/{id}/documents/{encoded}?range=N` streams page `N` of a document,
//!   where `encoded` is the base64 encoded document link and the `Accept` header
//!   selects the format
//! - `GET /keyword?<keywords>` suggests keywords for a comma separated list
//!
//! Library errors are turned into a status code and a `{ "message": ... }` body.

use std::{net::SocketAddr, sync::Arc};

use axum::{
  body::Body,
  extract::{Path, Query, State},
  http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
  response::{IntoResponse, Json, Response},
  routing::get,
  Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use duckduckpatent::{
  errors::PatentError,
  keyword::KeywordService,
  patent::{DocumentInformation, Patent, PatentSearchQuery},
  service::PatentsService,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{
  cors::{AllowOrigin, CorsLayer},
  trace::TraceLayer,
};
use tracing::{debug, error, info};

use crate::errors::PatentdErrors;

/// Header carrying the total number of results of a paged listing.
pub const X_TOTAL_COUNT: &str = "x-total-count";

/// Document format requested when the client sends no `Accept` header.
const DEFAULT_CONTENT_TYPE: &str = "application/pdf";

/// Origin of the web client during development.
const DEV_ORIGIN: &str = "http://localhost:8080";

/// Domain of the deployed web client.
const ORIGIN_DOMAIN: &str = ".duckduckpatent.com";

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
  /// Patent search and retrieval
  patents:  Arc<PatentsService>,
  /// Keyword suggestions
  keywords: Arc<KeywordService>,
}

impl AppState {
  /// Bundles the services behind the routes.
  pub fn new(patents: PatentsService, keywords: KeywordService) -> Self {
    Self { patents: Arc::new(patents), keywords: Arc::new(keywords) }
  }
}

/// A library error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(PatentError);

impl From<PatentError> for ApiError {
  fn from(error: PatentError) -> Self { Self(error) }
}

impl ApiError {
  /// The status code the error is reported with.
  fn status(&self) -> StatusCode {
    match &self.0 {
      PatentError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
      PatentError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
      PatentError::NotFound => StatusCode::NOT_FOUND,
      e if e.upstream_status() == Some(StatusCode::NOT_FOUND) => StatusCode::NOT_FOUND,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("Request failed: {}", self.0);
    } else {
      debug!("Request rejected with {status}: {}", self.0);
    }
    (status, Json(json!({ "message": self.0.to_string() }))).into_response()
  }
}

/// Query parameters of a document page request.
#[derive(Debug, Deserialize)]
struct DocumentParams {
  /// One-based page number
  range: Option<u32>,
}

/// Builds the router with CORS and request tracing.
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/patents", get(search_patents))
    .route("/patents/{id}", get(get_patent))
    .route("/patents/{id}/family", get(get_family))
    .route("/patents/{id}/documents", get(list_documents))
    .route("/patents/{id}/documents/{*encoded}", get(get_document))
    .route("/keyword", get(suggest_keywords))
    .layer(cors())
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Serves the API on `addr` until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), PatentdErrors> {
  let listener = tokio::net::TcpListener::bind(addr).await?;
  info!("Server running on http://{}", addr);
  axum::serve(listener, router(state)).await?;
  Ok(())
}

/// Lets the web client read and send `X-Total-Count`.
fn cors() -> CorsLayer {
  CorsLayer::new()
    .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _: &Parts| {
      origin.to_str().is_ok_and(|origin| origin == DEV_ORIGIN || origin.ends_with(ORIGIN_DOMAIN))
    }))
    .allow_methods([Method::GET])
    .allow_headers([HeaderName::from_static(X_TOTAL_COUNT)])
    .expose_headers([HeaderName::from_static(X_TOTAL_COUNT)])
    .allow_credentials(true)
}

async fn search_patents(
  State(state): State<AppState>,
  Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
  let query = PatentSearchQuery::from_pairs(params)?;
  let result = state.patents.query(&query).await?;
  Ok(([(X_TOTAL_COUNT, result.total.to_string())], Json(result.patents)))
}

async fn get_patent(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<Patent>, ApiError> {
  Ok(Json(state.patents.get(&id).await?))
}

async fn get_family(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  let family = state.patents.query_family(&id).await?;
  let total = family.total.to_string();
  Ok(([(X_TOTAL_COUNT, total)], Json(family)))
}

async fn list_documents(
  State(state): State<AppState>,
  Path(id): Path<String>,
) -> Result<Json<Vec<DocumentInformation>>, ApiError> {
  Ok(Json(state.patents.query_documents(&id).await?))
}

async fn get_document(
  State(state): State<AppState>,
  Path((id, encoded)): Path<(String, String)>,
  Query(params): Query<DocumentParams>,
  headers: HeaderMap,
) -> Result<Response, ApiError> {
  let url = decode_document_url(&encoded)?;
  let content_type = headers
    .get(header::ACCEPT)
    .and_then(|accept| accept.to_str().ok())
    .filter(|accept| !accept.is_empty())
    .unwrap_or(DEFAULT_CONTENT_TYPE);
  let range = params.range.unwrap_or(1);
  debug!("Fetching page {range} of {url} for {id} as {content_type}");

  let page = state.patents.get_document(&url, content_type, range).await?;

  let mut response = Response::new(Body::from(page.data));
  for (name, value) in page.headers.iter().filter(|(name, _)| !is_framing_header(name)) {
    response.headers_mut().append(name.clone(), value.clone());
  }
  Ok(response)
}

async fn suggest_keywords(
  State(state): State<AppState>,
  Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<String>>, ApiError> {
  // the whole query string is the keyword list, e.g. `?bread,oven`
  let keywords: Vec<String> = params
    .first()
    .map(|(key, _)| key.as_str())
    .unwrap_or_default()
    .split(',')
    .map(str::to_lowercase)
    .collect();

  Ok(Json(state.keywords.get_suggestions(&keywords).await?))
}

/// Decodes the base64 document link of a page request.
fn decode_document_url(encoded: &str) -> Result<String, PatentError> {
  let invalid =
    |reason: String| PatentError::InvalidQuery(format!("Invalid document link: {reason}"));

  let bytes = STANDARD.decode(encoded.trim_start_matches('/')).map_err(|e| invalid(e.to_string()))?;
  String::from_utf8(bytes).map_err(|e| invalid(e.to_string()))
}

/// Headers describing the upstream body encoding, which no longer apply once
/// the body has been decoded.
fn is_framing_header(name: &HeaderName) -> bool {
  [header::CONTENT_LENGTH, header::CONTENT_ENCODING, header::TRANSFER_ENCODING, header::CONNECTION]
    .contains(name)
}
