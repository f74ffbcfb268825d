//! Error types for the duckduckpatent library.
//!
//! This module provides a single error type covering every failure the core can
//! surface to its callers:
//! - Authentication against OPS
//! - Upstream and network failures
//! - Unparsable upstream payloads
//! - Configuration and request validation
//!
//! Sparse or oddly shaped OPS data is deliberately *not* represented here: the
//! normalization layer always degrades such data to defaults instead of failing.
//!
//! # Examples
//!
//! ```no_run
//! use duckduckpatent::{errors::PatentError, service::PatentsService};
//!
//! # async fn example(service: PatentsService) -> Result<(), PatentError> {
//! match service.get("EP1000000.A1").await {
//!   Err(PatentError::Unauthorized(reason)) => println!("Check your OPS credentials: {reason}"),
//!   Err(PatentError::NotFound) => println!("No such patent"),
//!   Err(e) => println!("Other error: {e}"),
//!   Ok(patent) => println!("Found: {}", patent.title),
//! }
//! # Ok(())
//! # }
//! ```

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to OPS or the similarity API.
///
/// Variants either carry a message describing the failure or wrap the
/// underlying error from a dependency.
#[derive(Error, Debug)]
pub enum PatentError {
  /// The OPS token endpoint could not be reached or rejected the credentials.
  ///
  /// This is fatal for the request and is never retried.
  #[error("Unauthorized: {0}")]
  Unauthorized(String),

  /// OPS answered with a non-success status that could not be recovered.
  ///
  /// This includes a token expiry that persists after the single refresh.
  #[error("OPS request failed with status {status}: {body}")]
  Upstream {
    /// Status code returned by the upstream API
    status: StatusCode,
    /// Response body, decoded lossily as UTF-8
    body:   String,
  },

  /// A network request failed before a response was received.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// An upstream response could not be parsed.
  #[error("API error: {0}")]
  ApiError(String),

  /// The requested patent couldn't be found.
  #[error("Patent not found")]
  NotFound,

  /// A search request was rejected before reaching OPS.
  #[error("Invalid query: {0}")]
  InvalidQuery(String),

  /// A required configuration value is missing or empty.
  ///
  /// The string parameter names the missing setting.
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  /// Failed to parse a URL.
  #[error(transparent)]
  InvalidUrl(#[from] url::ParseError),

  /// A header value contained characters HTTP does not allow.
  #[error(transparent)]
  InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

  /// A concurrently spawned request task panicked or was cancelled.
  #[error(transparent)]
  Task(#[from] tokio::task::JoinError),
}

impl PatentError {
  /// Returns the upstream status code if this error came from an OPS response.
  pub fn upstream_status(&self) -> Option<StatusCode> {
    match self {
      PatentError::Upstream { status, .. } => Some(*status),
      _ => None,
    }
  }
}
