//! Normalized patent records and search parameters.
//!
//! These types are the stable contract handed to HTTP clients. Whatever shape OPS
//! answered with, a [`Patent`] always has an id, a title, an abstract and (possibly
//! empty) citation and party lists.
//!
//! # Examples
//!
//! ```
//! use duckduckpatent::patent::PatentSearchQuery;
//!
//! let query = PatentSearchQuery::from_pairs(vec![
//!   ("keywords".to_string(), "bread".to_string()),
//!   ("country".to_string(), "de".to_string()),
//!   ("date".to_string(), "2001-2010".to_string()),
//! ])
//! .unwrap();
//!
//! assert_eq!(query.keywords, vec!["bread"]);
//! assert_eq!(query.country, "DE");
//! assert_eq!(query.date, "2001 2010");
//! assert_eq!(query.language, "en");
//! ```

use chrono::{Datelike, Utc};

use super::*;

/// Language used when a search does not specify one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// A cited patent, referenced by id only.
///
/// Citations never embed full records, so the citation graph cannot contain
/// cycles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitedPatent {
  /// Canonical id of the cited patent, e.g. `DE987654.B1`
  pub id: String,
}

/// A patent as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patent {
  /// Canonical id: country, document number, `.`, kind code (`US123456.A1`)
  pub id:            String,
  /// Title in the preferred language if available
  pub title:         String,
  /// Abstract in the preferred language if available
  #[serde(rename = "abstract")]
  pub abstract_text: String,
  /// Patents cited by this one
  pub citations:     Vec<CitedPatent>,
  /// DOCDB family id
  pub family_id:     Option<String>,
  /// Inventor names, ordered by sequence
  pub inventors:     Vec<String>,
  /// Applicant names, ordered by sequence
  pub applicants:    Vec<String>,
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
  /// Patents on this page
  pub patents: Vec<Patent>,
  /// Number of matches across all pages
  pub total:   u64,
}

/// A named section of a retrievable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSection {
  /// Section name, e.g. `CLAIMS`
  pub name:       String,
  /// Page the section starts on
  pub start_page: String,
}

/// A retrievable document of a patent, such as the full PDF or its drawings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInformation {
  /// Mime types the document can be fetched as
  pub formats:  Vec<String>,
  /// Lowercase document type, e.g. `fulldocument` or `drawing`
  #[serde(rename = "type")]
  pub doc_type: String,
  /// Path relative to the OPS `rest-services/` root
  pub url:      String,
  /// Named sections with their start pages
  pub sections: Vec<DocumentSection>,
  /// Number of pages
  pub pages:    u64,
}

/// Search parameters accepted by [`PatentsService::query`](crate::service::PatentsService::query).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatentSearchQuery {
  /// Terms matched against titles and abstracts
  pub keywords:  Vec<String>,
  /// Zero-based page number
  pub page:      u32,
  /// Preferred language codes concatenated without separator (`en`, `ende`)
  pub language:  String,
  /// Publication country filter (`US`)
  pub country:   String,
  /// Publication date filter in OPS form (`2001 2010`)
  pub date:      String,
  /// Inventor filter
  pub inventor:  Option<String>,
  /// Applicant filter
  pub applicant: Option<String>,
}

impl PatentSearchQuery {
  /// Creates a query for the given keywords with default filters.
  pub fn new(keywords: Vec<String>) -> Self {
    Self { keywords, language: DEFAULT_LANGUAGE.to_string(), ..Default::default() }
  }

  /// Whether the query filters on an inventor or an applicant.
  pub fn has_party_filter(&self) -> bool {
    self.inventor.as_deref().is_some_and(|v| !v.trim().is_empty())
      || self.applicant.as_deref().is_some_and(|v| !v.trim().is_empty())
  }

  /// Parses a query from decoded URL query pairs and validates it.
  ///
  /// - `keywords` may repeat.
  /// - `language` may repeat; the codes are concatenated (`en` + `de` = `ende`).
  ///   Without any, [`DEFAULT_LANGUAGE`] is used.
  /// - `country` is uppercased.
  /// - `date` is expected as `YYYY-YYYY` and rewritten to the `YYYY YYYY` form
  ///   OPS uses for `pd within`.
  ///
  /// # Errors
  ///
  /// Returns [`PatentError::InvalidQuery`] if no keyword, inventor or applicant is
  /// given, if `page` is not a number, or if the date range is malformed.
  pub fn from_pairs(
    pairs: impl IntoIterator<Item = (String, String)>,
  ) -> Result<Self, PatentError> {
    let mut query = Self::default();

    for (key, value) in pairs {
      let value = value.trim().to_string();
      match key.as_str() {
        "keywords" if !value.is_empty() => query.keywords.push(value),
        "language" => query.language.push_str(&value),
        "country" => query.country = value.to_uppercase(),
        "date" => query.date = value,
        "inventor" if !value.is_empty() => query.inventor = Some(value),
        "applicant" if !value.is_empty() => query.applicant = Some(value),
        "page" if !value.is_empty() =>
          query.page = value
            .parse()
            .map_err(|_| PatentError::InvalidQuery(format!("Invalid page: {value}")))?,
        _ => trace!("Ignoring query parameter {key}={value}"),
      }
    }

    if query.language.is_empty() {
      query.language = DEFAULT_LANGUAGE.to_string();
    }

    if query.keywords.is_empty() && !query.has_party_filter() {
      return Err(PatentError::InvalidQuery(
        "At least one keyword, inventor or applicant needs to be specified".into(),
      ));
    }

    if !query.date.is_empty() {
      query.date = parse_date_range(&query.date)?;
    }

    Ok(query)
  }
}

/// Validates a `YYYY-YYYY` range and converts it to `YYYY YYYY`.
fn parse_date_range(date: &str) -> Result<String, PatentError> {
  let invalid = || PatentError::InvalidQuery(format!("Invalid date range: {date}"));

  let (from, to) = date.split_once('-').ok_or_else(invalid)?;
  let from: i32 = from.trim().parse().map_err(|_| invalid())?;
  let to: i32 = to.trim().parse().map_err(|_| invalid())?;

  let current_year = Utc::now().year();
  let valid_year = |year: i32| year > 1700 && year <= current_year;
  if !valid_year(from) || !valid_year(to) || to <= from {
    return Err(invalid());
  }

  Ok(format!("{from} {to}"))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
  }

  #[test]
  fn test_repeated_keywords_and_languages() {
    let query = PatentSearchQuery::from_pairs(pairs(&[
      ("keywords", "bread"),
      ("keywords", "oven"),
      ("language", "en"),
      ("language", "de"),
      ("page", "3"),
    ]))
    .unwrap();

    assert_eq!(query.keywords, vec!["bread", "oven"]);
    assert_eq!(query.language, "ende");
    assert_eq!(query.page, 3);
    assert!(!query.has_party_filter());
  }

  #[test]
  fn test_missing_keywords_rejected() {
    let err = PatentSearchQuery::from_pairs(pairs(&[("country", "us")])).unwrap_err();
    assert!(matches!(err, PatentError::InvalidQuery(_)));
  }

  #[test]
  fn test_inventor_without_keywords_allowed() {
    let query = PatentSearchQuery::from_pairs(pairs(&[("inventor", "Jane Doe")])).unwrap();
    assert!(query.keywords.is_empty());
    assert_eq!(query.inventor.as_deref(), Some("Jane Doe"));
    assert!(query.has_party_filter());
  }

  #[test]
  fn test_date_range_conversion() {
    assert_eq!(parse_date_range("1990-2000").unwrap(), "1990 2000");
    assert!(parse_date_range("2000-1990").is_err());
    assert!(parse_date_range("1600-2000").is_err());
    assert!(parse_date_range("2000").is_err());
    assert!(parse_date_range("abcd-efgh").is_err());
  }

  #[test]
  fn test_invalid_page_rejected() {
    let err =
      PatentSearchQuery::from_pairs(pairs(&[("keywords", "bread"), ("page", "two")])).unwrap_err();
    assert!(matches!(err, PatentError::InvalidQuery(message) if message.contains("two")));
  }

  #[test]
  fn test_patent_serializes_client_field_names() {
    let patent = Patent {
      id:            "US1.A1".into(),
      title:         "Title".into(),
      abstract_text: "Abstract".into(),
      citations:     vec![CitedPatent { id: "DE2.B1".into() }],
      family_id:     None,
      inventors:     vec![],
      applicants:    vec![],
    };

    let json = serde_json::to_value(&patent).unwrap();
    assert_eq!(json["abstract"], "Abstract");
    assert_eq!(json["familyId"], serde_json::Value::Null);
    assert_eq!(json["citations"][0]["id"], "DE2.B1");
  }
}
