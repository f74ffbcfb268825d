//! Keyword suggestions for refining a patent search.
//!
//! For every keyword the user already searched for, the similarity API is asked
//! for related words. The answers are merged, ranked by score and cleaned up so
//! that the user is offered a handful of genuinely new terms: no keyword they
//! already have, no plural forms, and no phrase that merely repeats one of their
//! keywords.
//!
//! Outside production a failing similarity API is replaced by a fixed list of
//! words, so the rest of the application can be developed without running it.
//!
//! # Examples
//!
//! ```no_run
//! use duckduckpatent::{config::KeywordConfig, keyword::KeywordService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = KeywordService::new(KeywordConfig::from_env()?);
//! let suggestions = service.get_suggestions(&["bread".to_string()]).await?;
//! println!("Try also: {}", suggestions.join(", "));
//! # Ok(())
//! # }
//! ```

use std::{cmp::Ordering, collections::HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use tokio::task::JoinSet;

use super::*;
use crate::clients::{similarity::Similarity, SimilarityClient};

/// Number of suggestions returned.
pub const MAX_KEYWORDS: usize = 6;

/// Fewest similar words requested per keyword.
const MIN_SIMILARITIES: usize = 3;

/// Suggestions served when the similarity API is unavailable outside production.
pub const MOCK_KEYWORDS: &[(&str, f64)] = &[
  ("grain", 0.5),
  ("grains", 0.5),
  ("bread", 0.4),
  ("breads", 0.4),
  ("hunger", 0.3),
  ("hungers", 0.3),
  ("water", 0.5),
  ("waters", 0.5),
  ("man", 0.5),
  ("men", 0.5),
  ("glass", 0.8),
  ("glasses", 0.8),
  ("gol", 0.7),
  ("goles", 0.7),
  ("duck", 0.2),
  ("duckes", 0.2),
];

lazy_static! {
  // a trailing `s`/`es` not preceded by another `s`
  static ref PLURAL: Regex = Regex::new(r"[^s](s|es)$").unwrap();
}

/// Produces keyword suggestions from the similarity API.
#[derive(Clone)]
pub struct KeywordService {
  /// Client for the similarity API.
  client:     SimilarityClient,
  /// Whether API failures are returned instead of replaced by mock suggestions.
  production: bool,
}

impl KeywordService {
  /// Creates a service talking to the similarity API over HTTP.
  pub fn new(config: KeywordConfig) -> Self {
    let production = config.production;
    Self { client: SimilarityClient::new(config), production }
  }

  /// Creates a service sending its requests through `transport`.
  pub fn with_transport(config: KeywordConfig, transport: Arc<dyn Transport>) -> Self {
    let production = config.production;
    Self { client: SimilarityClient::with_transport(config, transport), production }
  }

  /// Suggests up to [`MAX_KEYWORDS`] new keywords related to `keywords`.
  ///
  /// The similarity API is queried for all keywords concurrently. The more
  /// keywords there are, the fewer similar words are requested for each of
  /// them, but never fewer than three.
  ///
  /// # Errors
  ///
  /// In production any failed similarity request is returned. Otherwise failures
  /// are logged and replaced by [`MOCK_KEYWORDS`], so only a panicking request
  /// task ([`PatentError::Task`]) can fail.
  pub async fn get_suggestions(&self, keywords: &[String]) -> Result<Vec<String>, PatentError> {
    let number = MIN_SIMILARITIES.max(MAX_KEYWORDS.saturating_sub(keywords.len()));

    let mut requests = JoinSet::new();
    for (index, word) in keywords.iter().filter(|k| !k.is_empty()).cloned().enumerate() {
      let client = self.client.clone();
      requests.spawn(async move {
        let result = client.similarities(&word, number).await;
        (index, word, result)
      });
    }

    let mut answers = Vec::with_capacity(requests.len());
    while let Some(joined) = requests.join_next().await {
      let (index, word, result) = joined?;
      let similarities = match result {
        Ok(similarities) => similarities,
        Err(e) if self.production => return Err(e),
        Err(e) => {
          warn!("Error calling similarity API for {word}: {e}, using mock suggestions");
          MOCK_KEYWORDS.iter().map(|(w, s)| (w.to_string(), *s)).collect()
        },
      };
      answers.push((index, similarities));
    }
    answers.sort_by_key(|(index, _)| *index);

    Ok(rank(answers.into_iter().flat_map(|(_, similarities)| similarities), keywords))
  }
}

/// Merges, ranks and filters similarity answers into suggestions.
fn rank(similarities: impl IntoIterator<Item = Similarity>, keywords: &[String]) -> Vec<String> {
  // a repeated word keeps its first position but takes the latest score
  let mut merged: Vec<Similarity> = Vec::new();
  let mut positions: HashMap<String, usize> = HashMap::new();
  for (word, score) in similarities {
    match positions.get(&word) {
      Some(&position) => merged[position].1 = score,
      None => {
        positions.insert(word.clone(), merged.len());
        merged.push((word, score));
      },
    }
  }
  merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

  let suggestions: Vec<String> = merged
    .into_iter()
    .map(|(word, _)| word)
    .filter(|word| !keywords.contains(word))
    .filter(|word| !PLURAL.is_match(word))
    .collect();

  let whole_words: Vec<Regex> = keywords
    .iter()
    .filter(|k| !k.is_empty())
    .filter_map(|k| Regex::new(&format!(r"\b{}\b", regex::escape(k))).ok())
    .collect();

  let mut filtered: Vec<String> = suggestions
    .iter()
    .take(MAX_KEYWORDS)
    .filter(|word| !whole_words.iter().any(|re| re.is_match(word)))
    .cloned()
    .collect();

  if filtered.len() < MAX_KEYWORDS {
    let missing = MAX_KEYWORDS - filtered.len();
    filtered.extend(suggestions.iter().skip(MAX_KEYWORDS).take(missing).cloned());
  }

  filtered
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use reqwest::header::HeaderMap;
  use url::Url;

  use super::*;
  use crate::clients::transport::{HttpRequest, HttpResponse};

  /// Answers similarity requests per word; unknown words get a 500.
  struct Similarities {
    answers: HashMap<&'static str, &'static str>,
    urls:    Mutex<Vec<String>>,
  }

  #[async_trait::async_trait]
  impl Transport for Similarities {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PatentError> {
      let url = Url::parse(&request.url).unwrap();
      let word = url.query_pairs().find(|(k, _)| k == "word").map(|(_, v)| v.into_owned()).unwrap();
      self.urls.lock().unwrap().push(request.url);

      let (status, body) = match self.answers.get(word.as_str()) {
        Some(body) => (StatusCode::OK, *body),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "similarity model not loaded"),
      };
      Ok(HttpResponse { status, headers: HeaderMap::new(), body: body.as_bytes().to_vec() })
    }
  }

  fn service(
    answers: &[(&'static str, &'static str)],
    production: bool,
  ) -> (KeywordService, Arc<Similarities>) {
    let transport = Arc::new(Similarities {
      answers: answers.iter().copied().collect(),
      urls:    Mutex::new(Vec::new()),
    });
    let config = KeywordConfig::new("http://similar.test", production).unwrap();
    (KeywordService::with_transport(config, transport.clone()), transport)
  }

  fn keywords(words: &[&str]) -> Vec<String> { words.iter().map(|w| w.to_string()).collect() }

  #[tokio::test]
  async fn test_suggestions_ranked_and_filtered() {
    let (service, transport) = service(
      &[(
        "bread",
        r#"[["loaf", 0.9], ["breads", 0.8], ["bread", 0.85], ["baker", 0.7], ["dough", 0.6],
            ["wholemeal bread", 0.65], ["yeast", 0.5], ["oven", 0.4], ["flour", 0.3]]"#,
      )],
      false,
    );

    let suggestions = service.get_suggestions(&keywords(&["bread"])).await.unwrap();

    // "bread" is the keyword itself, "breads" a plural and "wholemeal bread"
    // repeats the keyword; "flour" tops the list up to six
    assert_eq!(suggestions, vec!["loaf", "baker", "dough", "yeast", "oven", "flour"]);
    assert!(transport.urls.lock().unwrap()[0].contains("number=5"));
  }

  #[tokio::test]
  async fn test_answers_merged_in_keyword_order() {
    let (service, transport) = service(
      &[
        ("bread", r#"[["loaf", 0.5], ["heat", 0.2]]"#),
        ("oven", r#"[["heat", 0.9], ["stove", 0.5]]"#),
      ],
      false,
    );

    let suggestions = service.get_suggestions(&keywords(&["bread", "oven"])).await.unwrap();

    // equal scores keep the order in which the words were first seen
    assert_eq!(suggestions, vec!["heat", "loaf", "stove"]);
    let urls = transport.urls.lock().unwrap();
    assert_eq!(urls.len(), 2);
    assert!(urls.iter().all(|url| url.contains("number=4")));
  }

  #[tokio::test]
  async fn test_at_least_three_similarities_requested() {
    let (service, transport) = service(&[], false);

    let many = keywords(&["a", "b", "c", "d", "e", "f", "g"]);
    service.get_suggestions(&many).await.unwrap();

    let urls = transport.urls.lock().unwrap();
    assert_eq!(urls.len(), 7);
    assert!(urls.iter().all(|url| url.contains("number=3")));
  }

  #[tokio::test]
  async fn test_empty_keywords_are_not_requested() {
    let (service, transport) = service(&[], false);

    let suggestions = service.get_suggestions(&keywords(&["", ""])).await.unwrap();

    assert!(suggestions.is_empty());
    assert!(transport.urls.lock().unwrap().is_empty());
  }

  #[traced_test]
  #[tokio::test]
  async fn test_mock_suggestions_outside_production() {
    let (service, _) = service(&[], false);

    let suggestions = service.get_suggestions(&keywords(&["duck"])).await.unwrap();

    assert_eq!(suggestions, vec!["glass", "gol", "grain", "water", "man", "men"]);
    assert!(logs_contain("using mock suggestions"));
  }

  #[tokio::test]
  async fn test_failure_propagates_in_production() {
    let (service, _) = service(&[], true);

    let err = service.get_suggestions(&keywords(&["duck"])).await.unwrap_err();
    assert_eq!(err.upstream_status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
  }

  #[test]
  fn test_plural_pattern() {
    for plural in ["breads", "goles", "duckes", "ovens"] {
      assert!(PLURAL.is_match(plural), "{plural}");
    }
    for singular in ["glass", "gol", "men", "s"] {
      assert!(!PLURAL.is_match(singular), "{singular}");
    }
  }
}
