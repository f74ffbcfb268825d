//! Conversion of raw OPS responses into normalized patent records.
//!
//! Every function here is pure: no I/O, no shared state, and no failure on
//! oddly shaped input. Missing data degrades to an empty list or a placeholder
//! string. The only records that are dropped rather than defaulted are search
//! entries with no exchange document or no bibliographic data, since there is
//! nothing in them to normalize.
//!
//! # Examples
//!
//! ```
//! use duckduckpatent::{normalize, ops::OpsExchangeDocument};
//!
//! let doc: OpsExchangeDocument = serde_json::from_value(serde_json::json!({
//!   "@country": "EP",
//!   "@doc-number": "1000000",
//!   "@kind": "A1",
//!   "bibliographic-data": {
//!     "invention-title": [
//!       { "$": "Vorrichtung", "@lang": "de" },
//!       { "$": "Apparatus", "@lang": "en" }
//!     ]
//!   }
//! }))
//! .unwrap();
//!
//! let patent = normalize::process_patent(&doc, "en");
//! assert_eq!(patent.id, "EP1000000.A1");
//! assert_eq!(patent.title, "Apparatus");
//! assert_eq!(patent.abstract_text, normalize::NO_ABSTRACT);
//! ```

use std::collections::HashMap;

use super::*;
use crate::{
  ops::{
    list, OpsApplicant, OpsCitation, OpsDocumentInstance, OpsExchangeDocument,
    OpsExchangeDocumentEntry,
    OpsImageQueryResponse, OpsInventor, OpsLangText, OpsText, PatentQueryResponse,
  },
  patent::PatentSearchQuery,
};

/// Title used when a document carries no title at all.
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Abstract used when a document carries no abstract at all.
pub const NO_ABSTRACT: &str = "No abstract available";

/// Page size of a regular search.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Document id type whose citation ids are used.
const DOCDB: &str = "docdb";

/// Processes an OPS biblio search into a page of patents.
///
/// `languages` optionally restricts the result to documents that have a title in
/// one of the given languages. Language codes are matched by substring
/// containment against the concatenated string, so `"ende"` accepts English and
/// German titles.
pub fn process_query(data: &PatentQueryResponse, languages: Option<&str>) -> QueryResult {
  let search = &data.world_patent_data.biblio_search;
  let languages = languages.unwrap_or_default();

  let patents = list(&search.search_result.exchange_documents)
    .iter()
    .filter_map(OpsExchangeDocumentEntry::document)
    // entries without bibliographic data carry nothing to normalize
    .filter(|doc| doc.bibliographic_data.is_some())
    .filter(|doc| languages.is_empty() || has_title_in(doc, languages))
    .map(|doc| process_patent(doc, languages))
    .collect();

  QueryResult { patents, total: search.total_result_count }
}

/// Processes a single OPS exchange document into a [`Patent`].
///
/// `languages` lists the preferred languages for title and abstract; pass an
/// empty string to take whichever translation comes first.
pub fn process_patent(doc: &OpsExchangeDocument, languages: &str) -> Patent {
  let biblio = doc.bibliographic_data.as_ref();

  let inventors = biblio
    .and_then(|b| b.parties.as_ref())
    .and_then(|p| p.inventors.as_ref())
    .map(|i| list(&i.inventor))
    .unwrap_or_default();
  let applicants = biblio
    .and_then(|b| b.parties.as_ref())
    .and_then(|p| p.applicants.as_ref())
    .map(|a| list(&a.applicant))
    .unwrap_or_default();

  Patent {
    id:            format!(
      "{}{}.{}",
      doc.country.as_deref().unwrap_or_default(),
      doc.doc_number.as_deref().unwrap_or_default(),
      doc.kind.as_deref().unwrap_or_default()
    ),
    title:         title(doc, languages),
    abstract_text: abstract_text(doc, languages),
    citations:     citations(doc),
    family_id:     doc.family_id.clone(),
    inventors:     names_by_sequence(inventors.iter().map(inventor_entry)),
    applicants:    names_by_sequence(applicants.iter().map(applicant_entry)),
  }
}

/// Builds the OPS query URL for a search.
///
/// Clauses are appended in a fixed order (search terms, inventor, applicant,
/// country, date), each only when its input is non-empty, followed by the
/// `Range` of the requested page.
///
/// # Examples
///
/// ```
/// use duckduckpatent::{normalize, patent::PatentSearchQuery};
///
/// let mut query = PatentSearchQuery::new(vec![]);
/// query.page = 2;
/// query.country = "US".into();
/// query.date = "2020".into();
///
/// assert_eq!(
///   normalize::query_string("/search", &query, 100),
///   r#"/search?q=pn any "US" and pd within "2020"&Range=201-300"#
/// );
/// ```
pub fn query_string(endpoint: &str, query: &PatentSearchQuery, page_size: u32) -> String {
  let mut filters: Vec<String> = Vec::new();

  if !query.keywords.is_empty() {
    let terms = query.keywords.join(",");
    filters.push(format!("ti%3D {terms} or ab%3D {terms}"));
  }

  if let Some(inventor) = query.inventor.as_deref().filter(|v| !v.is_empty()) {
    filters.push(format!("inventor%3D{inventor}"));
  }

  if let Some(applicant) = query.applicant.as_deref().filter(|v| !v.is_empty()) {
    filters.push(format!("applicant%3D{applicant}"));
  }

  if !query.country.trim().is_empty() {
    filters.push(format!("pn any \"{}\"", query.country));
  }

  if !query.date.trim().is_empty() {
    filters.push(format!("pd within \"{}\"", query.date));
  }

  let mut url = endpoint.to_string();
  if filters.is_empty() {
    url.push('?');
  } else {
    url.push_str("?q=");
    url.push_str(&filters.join(" and "));
    url.push('&');
  }

  let page = u64::from(query.page);
  let page_size = u64::from(page_size);
  url.push_str(&format!("Range={}-{}", page * page_size + 1, (page + 1) * page_size));
  url
}

/// Restructures an OPS image inquiry into the documents available for a patent.
pub fn process_image_query(data: &OpsImageQueryResponse) -> Vec<DocumentInformation> {
  let Some(inquiry) = data.world_patent_data.document_inquiry.as_ref() else {
    return Vec::new();
  };

  list(&inquiry.inquiry_result)
    .iter()
    .flat_map(|result| list(&result.document_instance))
    .map(document_information)
    .collect()
}

/// Maps one OPS document instance to a [`DocumentInformation`].
fn document_information(document: &OpsDocumentInstance) -> DocumentInformation {
  let formats = document
    .document_format_options
    .as_ref()
    .map(|options| list(&options.document_format))
    .unwrap_or_default();

  DocumentInformation {
    formats:  formats.iter().map(|format| format.text().to_string()).collect(),
    doc_type: document.desc.as_deref().unwrap_or("unknown").to_lowercase(),
    url:      document.link.clone().unwrap_or_default(),
    sections: list(&document.document_section)
      .iter()
      .map(|section| DocumentSection {
        name:       section.name.clone().unwrap_or_default(),
        start_page: section.start_page.clone().unwrap_or_default(),
      })
      .collect(),
    pages:    document.number_of_pages,
  }
}

/// Title translations of a document.
fn titles(doc: &OpsExchangeDocument) -> &[OpsLangText] {
  doc.bibliographic_data.as_ref().map(|b| list(&b.invention_title)).unwrap_or_default()
}

/// Whether any title translation is in one of `languages`.
fn has_title_in(doc: &OpsExchangeDocument, languages: &str) -> bool {
  titles(doc).iter().filter_map(|title| title.lang.as_deref()).any(|lang| languages.contains(lang))
}

/// Picks the first entry whose language is in `languages`, else the first entry.
fn preferred<'a, T>(
  items: &'a [T],
  languages: &str,
  lang: impl Fn(&T) -> Option<&str>,
) -> Option<&'a T> {
  items
    .iter()
    .find(|item| lang(*item).is_some_and(|code| languages.contains(code)))
    .or_else(|| items.first())
}

/// Resolves the title of a document.
fn title(doc: &OpsExchangeDocument, languages: &str) -> String {
  preferred(titles(doc), languages, |title| title.lang.as_deref())
    .and_then(|title| title.value.clone())
    .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}

/// Resolves the abstract of a document, joining multi-paragraph abstracts with newlines.
fn abstract_text(doc: &OpsExchangeDocument, languages: &str) -> String {
  preferred(list(&doc.abstract_text), languages, |a| a.lang.as_deref())
    .map(|a| list(&a.p).iter().filter_map(|p| p.value.as_deref()).collect::<Vec<_>>().join("\n"))
    .filter(|text| !text.is_empty())
    .unwrap_or_else(|| NO_ABSTRACT.to_string())
}

/// Collects the patent citations of a document as id-only stubs.
///
/// Non-patent literature (no `patcit`) is skipped, as are patent citations that
/// lack a `docdb` id.
fn citations(doc: &OpsExchangeDocument) -> Vec<CitedPatent> {
  let citations: &[OpsCitation] = doc
    .bibliographic_data
    .as_ref()
    .and_then(|b| b.references_cited.as_ref())
    .map(|r| list(&r.citation))
    .unwrap_or_default();

  citations
    .iter()
    .filter_map(|citation| citation.patcit.as_ref())
    .filter_map(|patcit| {
      list(&patcit.document_id)
        .iter()
        .find(|id| id.document_id_type.as_deref() == Some(DOCDB))
    })
    .map(|id| CitedPatent {
      id: format!("{}{}.{}", text_of(&id.country), text_of(&id.doc_number), text_of(&id.kind)),
    })
    .collect()
}

/// Text of an optional element, empty if absent.
fn text_of(text: &Option<OpsText>) -> &str { text.as_ref().map(OpsText::text).unwrap_or_default() }

/// Sequence and name of an inventor entry.
fn inventor_entry(inventor: &OpsInventor) -> (Option<&str>, Option<&str>) {
  (
    inventor.sequence.as_deref(),
    inventor.name.as_ref().and_then(|n| n.name.as_ref()).and_then(|n| n.value.as_deref()),
  )
}

/// Sequence and name of an applicant entry.
fn applicant_entry(applicant: &OpsApplicant) -> (Option<&str>, Option<&str>) {
  (
    applicant.sequence.as_deref(),
    applicant.name.as_ref().and_then(|n| n.name.as_ref()).and_then(|n| n.value.as_deref()),
  )
}

/// Keeps the first name of every `@sequence` and orders the result by sequence.
///
/// OPS lists each party once per data format under the same sequence number.
/// Numeric sequences come first in ascending order; anything else follows in
/// order of first appearance.
fn names_by_sequence<'a>(
  entries: impl Iterator<Item = (Option<&'a str>, Option<&'a str>)>,
) -> Vec<String> {
  let mut first_seen: Vec<(&str, Option<&str>)> = Vec::new();
  let mut positions: HashMap<&str, usize> = HashMap::new();

  for (sequence, name) in entries {
    let sequence = sequence.unwrap_or_default();
    match positions.get(sequence) {
      Some(&position) => {
        // a later alternate spelling only fills in a missing name
        if first_seen[position].1.is_none() {
          first_seen[position].1 = name;
        }
      },
      None => {
        positions.insert(sequence, first_seen.len());
        first_seen.push((sequence, name));
      },
    }
  }

  // stable sort keeps first-seen order among non-numeric sequences
  first_seen.sort_by_key(|(sequence, _)| match sequence.parse::<u32>() {
    Ok(number) => (0, number),
    Err(_) => (1, 0),
  });

  first_seen.into_iter().filter_map(|(_, name)| name.map(str::to_string)).collect()
}
