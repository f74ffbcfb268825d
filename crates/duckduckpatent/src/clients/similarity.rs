//! Client for the word-similarity API that backs keyword suggestions.
//!
//! The API answers `GET /similarities?word=<w>&number=<n>&language=<l>` with a
//! JSON array of `[word, score]` pairs, most similar first.
//!
//! # Examples
//!
//! ```no_run
//! use duckduckpatent::{clients::SimilarityClient, config::KeywordConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SimilarityClient::new(KeywordConfig::from_env()?);
//! for (word, score) in client.similarities("bread", 5).await? {
//!   println!("{word}: {score:.2}");
//! }
//! # Ok(())
//! # }
//! ```

use url::Url;

use super::{transport::HttpRequest, *};

/// Language requested from the similarity API.
const SIMILARITY_LANGUAGE: &str = "en";

/// A similar word and its similarity score.
pub type Similarity = (String, f64);

/// Client for the similarity API.
#[derive(Clone)]
pub struct SimilarityClient {
  /// Transport used for all requests.
  transport: Arc<dyn Transport>,
  /// Base URL of the similarity API.
  base_url:  String,
}

impl SimilarityClient {
  /// Creates a client that talks to the configured API over HTTP.
  pub fn new(config: KeywordConfig) -> Self {
    Self::with_transport(config, Arc::new(HttpTransport::new()))
  }

  /// Creates a client sending its requests through `transport`.
  pub fn with_transport(config: KeywordConfig, transport: Arc<dyn Transport>) -> Self {
    Self { transport, base_url: config.suggestions_url }
  }

  /// Fetches up to `number` words similar to `word`.
  ///
  /// # Errors
  ///
  /// Returns [`PatentError::Upstream`] on a non-success status,
  /// [`PatentError::ApiError`] on an unreadable body and
  /// [`PatentError::Network`] if the API cannot be reached.
  pub async fn similarities(
    &self,
    word: &str,
    number: usize,
  ) -> Result<Vec<Similarity>, PatentError> {
    let number = number.to_string();
    let url = Url::parse_with_params(&format!("{}/similarities", self.base_url), &[
      ("word", word),
      ("number", number.as_str()),
      ("language", SIMILARITY_LANGUAGE),
    ])?;
    debug!("Fetching similarities via: {}", url);

    let response = self.transport.send(HttpRequest::get(url.as_str())).await?;
    if !response.status.is_success() {
      return Err(PatentError::Upstream { status: response.status, body: response.text() });
    }

    trace!("Similarity response: {}", response.text());
    serde_json::from_slice(&response.body)
      .map_err(|e| PatentError::ApiError(format!("Failed to parse JSON: {}", e)))
  }
}
