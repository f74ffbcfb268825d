//! Environment-driven configuration for the OPS and similarity API clients.
//!
//! The variable names match the deployment environment of the DuckDuckPatent
//! backend:
//!
//! | Variable              | Purpose                                  | Default                  |
//! |-----------------------|------------------------------------------|--------------------------|
//! | `PATENT_API_URL`      | OPS base URL                             | `https://ops.epo.org/3.2`|
//! | `OPS_CONSUMER_KEY`    | OAuth consumer key                       | required                 |
//! | `OPS_CONSUMER_SECRET` | OAuth consumer secret                    | required                 |
//! | `SUGGESTIONS_API_URL` | Similarity API base URL                  | `http://localhost:8000`  |
//! | `NODE_ENV`            | `production` disables mock suggestions   | unset                    |
//! | `APP_ENV`             | read when `NODE_ENV` is unset            | unset                    |

use url::Url;

use super::*;

/// Default OPS base URL.
pub const DEFAULT_OPS_URL: &str = "https://ops.epo.org/3.2";

/// Default similarity API base URL.
pub const DEFAULT_SUGGESTIONS_URL: &str = "http://localhost:8000";

/// Variables naming the deployment environment, in order of precedence.
pub const ENVIRONMENT_VARS: [&str; 2] = ["NODE_ENV", "APP_ENV"];

/// Returns the deployment environment named by the first of [`ENVIRONMENT_VARS`]
/// that is set.
pub fn deployment_environment() -> Option<String> {
  environment_from(|name| std::env::var(name).ok())
}

/// Whether a deployment environment name selects production behaviour.
pub fn is_production(environment: &str) -> bool { environment.trim() == "production" }

/// Resolves the deployment environment through `lookup`.
fn environment_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
  ENVIRONMENT_VARS.iter().find_map(|name| lookup(*name))
}

/// Connection settings for the EPO Open Patent Services API.
#[derive(Clone, Serialize, Deserialize)]
pub struct OpsConfig {
  /// Base URL without a trailing slash, e.g. `https://ops.epo.org/3.2`
  pub base_url:        String,
  /// OAuth2 consumer key
  pub consumer_key:    String,
  /// OAuth2 consumer secret
  pub consumer_secret: String,
}

impl OpsConfig {
  /// Builds a configuration from explicit values.
  ///
  /// # Errors
  ///
  /// Returns [`PatentError::InvalidUrl`] if `base_url` is not a valid URL and
  /// [`PatentError::MissingConfig`] if either credential is empty.
  pub fn new(
    base_url: &str,
    consumer_key: impl Into<String>,
    consumer_secret: impl Into<String>,
  ) -> Result<Self, PatentError> {
    let base_url = normalize_base_url(base_url)?;
    let consumer_key = required("OPS_CONSUMER_KEY", consumer_key.into())?;
    let consumer_secret = required("OPS_CONSUMER_SECRET", consumer_secret.into())?;
    Ok(Self { base_url, consumer_key, consumer_secret })
  }

  /// Reads the configuration from `PATENT_API_URL`, `OPS_CONSUMER_KEY` and
  /// `OPS_CONSUMER_SECRET`.
  pub fn from_env() -> Result<Self, PatentError> {
    let base_url = std::env::var("PATENT_API_URL").unwrap_or_else(|_| DEFAULT_OPS_URL.to_string());
    Self::new(
      &base_url,
      std::env::var("OPS_CONSUMER_KEY").unwrap_or_default(),
      std::env::var("OPS_CONSUMER_SECRET").unwrap_or_default(),
    )
  }
}

// Credentials stay out of logs.
impl std::fmt::Debug for OpsConfig {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OpsConfig")
      .field("base_url", &self.base_url)
      .field("consumer_key", &"***")
      .field("consumer_secret", &"***")
      .finish()
  }
}

/// Settings for the keyword suggestion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
  /// Base URL of the similarity API, without a trailing slash
  pub suggestions_url: String,
  /// In production a failing similarity call is an error instead of falling
  /// back to mock suggestions
  pub production:      bool,
}

impl KeywordConfig {
  /// Builds a configuration from explicit values.
  pub fn new(suggestions_url: &str, production: bool) -> Result<Self, PatentError> {
    Ok(Self { suggestions_url: normalize_base_url(suggestions_url)?, production })
  }

  /// Reads the configuration from `SUGGESTIONS_API_URL` and the deployment
  /// environment (`NODE_ENV`, then `APP_ENV`).
  pub fn from_env() -> Result<Self, PatentError> {
    let url = std::env::var("SUGGESTIONS_API_URL")
      .unwrap_or_else(|_| DEFAULT_SUGGESTIONS_URL.to_string());
    let production = deployment_environment().is_some_and(|env| is_production(&env));
    Self::new(&url, production)
  }
}

impl Default for KeywordConfig {
  fn default() -> Self {
    Self { suggestions_url: DEFAULT_SUGGESTIONS_URL.to_string(), production: false }
  }
}

/// Validates a base URL and strips any trailing slash so endpoints can be appended.
fn normalize_base_url(raw: &str) -> Result<String, PatentError> {
  let url = Url::parse(raw.trim())?;
  Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Rejects empty values for required settings.
fn required(name: &str, value: String) -> Result<String, PatentError> {
  if value.trim().is_empty() {
    return Err(PatentError::MissingConfig(name.to_string()));
  }
  Ok(value)
}
