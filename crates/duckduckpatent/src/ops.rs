//! Raw response shapes of the EPO Open Patent Services API.
//!
//! OPS serves JSON that is mechanically derived from XML. Two consequences shape
//! every type in this module:
//! - Attributes are prefixed with `@` and text content lives under `$`.
//! - A list with a single element is collapsed into a bare object. This happens
//!   independently for titles, abstracts, citations, parties, document ids and
//!   document instances, so every conceptually list-valued field is a
//!   [`OneOrMany`] and is read through [`list`].
//!
//! Almost every field is optional. Missing data is handled by the
//! [`normalize`](crate::normalize) layer, never by failing deserialization.

use serde::de::{DeserializeOwned, Deserializer};
use serde_json::Value;

use super::*;

/// A value that OPS sends either as a single object or as an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
  /// The array form
  Many(Vec<T>),
  /// The collapsed single-element form
  One(T),
}

impl<T> OneOrMany<T> {
  /// Views the value as a slice regardless of which form was received.
  pub fn as_slice(&self) -> &[T] {
    match self {
      OneOrMany::Many(items) => items,
      OneOrMany::One(item) => std::slice::from_ref(item),
    }
  }

  /// Converts the value into an owned list.
  pub fn into_vec(self) -> Vec<T> {
    match self {
      OneOrMany::Many(items) => items,
      OneOrMany::One(item) => vec![item],
    }
  }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
  fn from(items: Vec<T>) -> Self { OneOrMany::Many(items) }
}

/// Reads a possibly missing, possibly collapsed list field as a slice.
///
/// This is the one place where the single-object-vs-array ambiguity is resolved;
/// an absent field reads as an empty slice.
pub fn list<T>(value: &Option<OneOrMany<T>>) -> &[T] {
  value.as_ref().map(OneOrMany::as_slice).unwrap_or(&[])
}

/// Text content of an XML element (`{"$": "..."}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsText {
  /// The text itself
  #[serde(rename = "$", default, deserialize_with = "lenient_string")]
  pub value: Option<String>,
}

impl OpsText {
  /// Creates text content from a string.
  pub fn new(value: impl Into<String>) -> Self { Self { value: Some(value.into()) } }

  /// Returns the text, or an empty string if the element had none.
  pub fn text(&self) -> &str { self.value.as_deref().unwrap_or_default() }
}

/// Language-tagged text such as an invention title.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsLangText {
  /// The text itself
  #[serde(rename = "$", default, deserialize_with = "lenient_string")]
  pub value: Option<String>,
  /// ISO 639-1 language code
  #[serde(rename = "@lang", default, deserialize_with = "lenient_string")]
  pub lang:  Option<String>,
}

/// A document identifier in one of OPS's formats (`docdb`, `epodoc`, `original`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsDocumentId {
  /// Identifier format
  #[serde(rename = "@document-id-type", default, deserialize_with = "lenient_string")]
  pub document_id_type: Option<String>,
  /// Two-letter country code
  #[serde(default, deserialize_with = "lenient_option")]
  pub country:          Option<OpsText>,
  /// Document number
  #[serde(rename = "doc-number", default, deserialize_with = "lenient_option")]
  pub doc_number:       Option<OpsText>,
  /// Kind code (A1, B1, ...)
  #[serde(default, deserialize_with = "lenient_option")]
  pub kind:             Option<OpsText>,
  /// Applicant or inventor name attached to the id, if any
  #[serde(default, deserialize_with = "lenient_option")]
  pub name:             Option<OpsText>,
  /// Publication date, `YYYYMMDD`
  #[serde(default, deserialize_with = "lenient_option")]
  pub date:             Option<OpsText>,
}

/// A patent citation reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsPatentCitation {
  /// Number type of the cited document
  #[serde(rename = "@dnum-type", default, deserialize_with = "lenient_string")]
  pub dnum_type:   Option<String>,
  /// The cited document in one or more id formats
  #[serde(rename = "document-id", default, deserialize_with = "lenient_list")]
  pub document_id: Option<OneOrMany<OpsDocumentId>>,
}

/// A single entry of `references-cited`.
///
/// Entries without `patcit` cite non-patent literature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsCitation {
  /// Procedural phase in which the citation was made
  #[serde(rename = "@cited-phase", default, deserialize_with = "lenient_string")]
  pub cited_phase: Option<String>,
  /// Who cited the document (applicant, examiner, ...)
  #[serde(rename = "@cited-by", default, deserialize_with = "lenient_string")]
  pub cited_by:    Option<String>,
  /// Position within the citation list
  #[serde(rename = "@sequence", default, deserialize_with = "lenient_string")]
  pub sequence:    Option<String>,
  /// Present only for patent citations
  #[serde(default, deserialize_with = "lenient_option")]
  pub patcit:      Option<OpsPatentCitation>,
}

/// Container of the citation list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsReferencesCited {
  /// The citations
  #[serde(default, deserialize_with = "lenient_list")]
  pub citation: Option<OneOrMany<OpsCitation>>,
}

/// A person or organisation name (`{"name": {"$": "..."}}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsPartyName {
  /// The name text
  #[serde(default, deserialize_with = "lenient_option")]
  pub name: Option<OpsText>,
}

/// An inventor entry. OPS repeats the same `@sequence` once per data format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsInventor {
  /// Position of the inventor
  #[serde(rename = "@sequence", default, deserialize_with = "lenient_string")]
  pub sequence:    Option<String>,
  /// Data format of this entry (`epodoc`, `original`)
  #[serde(rename = "@data-format", default, deserialize_with = "lenient_string")]
  pub data_format: Option<String>,
  /// The inventor's name
  #[serde(rename = "inventor-name", default, deserialize_with = "lenient_option")]
  pub name:        Option<OpsPartyName>,
}

/// An applicant entry. OPS repeats the same `@sequence` once per data format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsApplicant {
  /// Position of the applicant
  #[serde(rename = "@sequence", default, deserialize_with = "lenient_string")]
  pub sequence:    Option<String>,
  /// Data format of this entry (`epodoc`, `original`)
  #[serde(rename = "@data-format", default, deserialize_with = "lenient_string")]
  pub data_format: Option<String>,
  /// The applicant's name
  #[serde(rename = "applicant-name", default, deserialize_with = "lenient_option")]
  pub name:        Option<OpsPartyName>,
}

/// Container of the inventor list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsInventors {
  /// The inventors
  #[serde(default, deserialize_with = "lenient_list")]
  pub inventor: Option<OneOrMany<OpsInventor>>,
}

/// Container of the applicant list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsApplicants {
  /// The applicants
  #[serde(default, deserialize_with = "lenient_list")]
  pub applicant: Option<OneOrMany<OpsApplicant>>,
}

/// Parties involved in a patent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsParties {
  /// Inventors
  #[serde(default, deserialize_with = "lenient_option")]
  pub inventors:  Option<OpsInventors>,
  /// Applicants
  #[serde(default, deserialize_with = "lenient_option")]
  pub applicants: Option<OpsApplicants>,
}

/// Bibliographic data of an exchange document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsBiblioData {
  /// Title translations
  #[serde(rename = "invention-title", default, deserialize_with = "lenient_list")]
  pub invention_title:  Option<OneOrMany<OpsLangText>>,
  /// Cited documents
  #[serde(rename = "references-cited", default, deserialize_with = "lenient_option")]
  pub references_cited: Option<OpsReferencesCited>,
  /// Inventors and applicants
  #[serde(default, deserialize_with = "lenient_option")]
  pub parties:          Option<OpsParties>,
}

/// An abstract translation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsAbstract {
  /// ISO 639-1 language code
  #[serde(rename = "@lang", default, deserialize_with = "lenient_string")]
  pub lang: Option<String>,
  /// Paragraphs of the abstract
  #[serde(default, deserialize_with = "lenient_list")]
  pub p:    Option<OneOrMany<OpsText>>,
}

/// One patent record as returned by OPS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsExchangeDocument {
  /// Issuing system
  #[serde(rename = "@system", default, deserialize_with = "lenient_string")]
  pub system:             Option<String>,
  /// DOCDB family id
  #[serde(rename = "@family-id", default, deserialize_with = "lenient_string")]
  pub family_id:          Option<String>,
  /// Two-letter country code
  #[serde(rename = "@country", default, deserialize_with = "lenient_string")]
  pub country:            Option<String>,
  /// Document number
  #[serde(rename = "@doc-number", default, deserialize_with = "lenient_string")]
  pub doc_number:         Option<String>,
  /// Kind code
  #[serde(rename = "@kind", default, deserialize_with = "lenient_string")]
  pub kind:               Option<String>,
  /// Titles, citations and parties
  #[serde(rename = "bibliographic-data", default, deserialize_with = "lenient_option")]
  pub bibliographic_data: Option<OpsBiblioData>,
  /// Abstract translations
  #[serde(rename = "abstract", default, deserialize_with = "lenient_list")]
  pub abstract_text:      Option<OneOrMany<OpsAbstract>>,
}

/// Wrapper around an exchange document inside a result list.
///
/// OPS occasionally emits entries without the `exchange-document` key; those
/// carry nothing to normalize. Entries holding several documents are read
/// through [`OpsExchangeDocumentEntry::document`], which takes the first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsExchangeDocumentEntry {
  /// The wrapped document(s)
  #[serde(rename = "exchange-document", default, deserialize_with = "lenient_list")]
  pub exchange_document: Option<OneOrMany<OpsExchangeDocument>>,
}

impl OpsExchangeDocumentEntry {
  /// Wraps a single document.
  pub fn new(document: OpsExchangeDocument) -> Self {
    Self { exchange_document: Some(OneOrMany::One(document)) }
  }

  /// The first wrapped document, if any.
  pub fn document(&self) -> Option<&OpsExchangeDocument> { list(&self.exchange_document).first() }
}

/// The `ops:search-result` element of a biblio search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsSearchResult {
  /// The result documents
  #[serde(rename = "exchange-documents", default, deserialize_with = "lenient_list")]
  pub exchange_documents: Option<OneOrMany<OpsExchangeDocumentEntry>>,
}

/// The `ops:biblio-search` element of a biblio search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsBiblioSearch {
  /// Number of matches across all pages
  #[serde(rename = "@total-result-count", default, deserialize_with = "lenient_count")]
  pub total_result_count: u64,
  /// The current page of results
  #[serde(rename = "ops:search-result", default)]
  pub search_result:      OpsSearchResult,
}

/// `ops:world-patent-data` of a biblio search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsSearchWorldPatentData {
  /// The search element
  #[serde(rename = "ops:biblio-search", default)]
  pub biblio_search: OpsBiblioSearch,
}

/// Response of `published-data/search/biblio`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentQueryResponse {
  /// Root element
  #[serde(rename = "ops:world-patent-data", default)]
  pub world_patent_data: OpsSearchWorldPatentData,
}

impl PatentQueryResponse {
  /// Builds a search envelope around already extracted documents.
  pub fn from_documents(total: u64, documents: Vec<OpsExchangeDocumentEntry>) -> Self {
    Self {
      world_patent_data: OpsSearchWorldPatentData {
        biblio_search: OpsBiblioSearch {
          total_result_count: total,
          search_result:      OpsSearchResult { exchange_documents: Some(documents.into()) },
        },
      },
    }
  }
}

/// `ops:world-patent-data` of a single publication lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsPublicationWorldPatentData {
  /// The exchange documents of the publication
  #[serde(rename = "exchange-documents", default, deserialize_with = "lenient_option")]
  pub exchange_documents: Option<OpsExchangeDocuments>,
}

/// The `exchange-documents` element of a publication lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsExchangeDocuments {
  /// One document per kind of the publication
  #[serde(rename = "exchange-document", default, deserialize_with = "lenient_list")]
  pub exchange_document: Option<OneOrMany<OpsExchangeDocument>>,
}

/// Response of `published-data/publication/epodoc/{id}/biblio`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationResponse {
  /// Root element
  #[serde(rename = "ops:world-patent-data", default)]
  pub world_patent_data: OpsPublicationWorldPatentData,
}

impl PublicationResponse {
  /// Returns the first exchange document of the publication, if any.
  pub fn first_document(&self) -> Option<&OpsExchangeDocument> {
    let documents = self.world_patent_data.exchange_documents.as_ref()?;
    list(&documents.exchange_document).first()
  }
}

/// A member of a patent family.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsFamilyMember {
  /// DOCDB family id
  #[serde(rename = "@family-id", default, deserialize_with = "lenient_string")]
  pub family_id:         Option<String>,
  /// Bibliographic record(s) of the member
  #[serde(rename = "exchange-document", default, deserialize_with = "lenient_list")]
  pub exchange_document: Option<OneOrMany<OpsExchangeDocument>>,
}

/// The `ops:patent-family` element.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsPatentFamily {
  /// Number of family members
  #[serde(rename = "@total-result-count", default, deserialize_with = "lenient_count")]
  pub total_result_count: u64,
  /// The family members
  #[serde(rename = "ops:family-member", default, deserialize_with = "lenient_list")]
  pub family_member:      Option<OneOrMany<OpsFamilyMember>>,
}

/// `ops:world-patent-data` of a family lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsFamilyWorldPatentData {
  /// The family element
  #[serde(rename = "ops:patent-family", default)]
  pub patent_family: OpsPatentFamily,
}

/// Response of `family/publication/docdb/{id}/biblio`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentFamilyResponse {
  /// Root element
  #[serde(rename = "ops:world-patent-data", default)]
  pub world_patent_data: OpsFamilyWorldPatentData,
}

/// A named section of a document, such as claims or drawings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsDocumentSection {
  /// Section name
  #[serde(rename = "@name", default, deserialize_with = "lenient_string")]
  pub name:       Option<String>,
  /// First page of the section
  #[serde(rename = "@start-page", default, deserialize_with = "lenient_string")]
  pub start_page: Option<String>,
}

/// Formats a document instance can be retrieved in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsDocumentFormatOptions {
  /// Mime types
  #[serde(rename = "ops:document-format", default, deserialize_with = "lenient_list")]
  pub document_format: Option<OneOrMany<OpsText>>,
}

/// One retrievable document of a publication (full document, drawings, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsDocumentInstance {
  /// Human readable type, e.g. `FullDocument`
  #[serde(rename = "@desc", default, deserialize_with = "lenient_string")]
  pub desc:                    Option<String>,
  /// Path of the document relative to `rest-services/`
  #[serde(rename = "@link", default, deserialize_with = "lenient_string")]
  pub link:                    Option<String>,
  /// Number of pages
  #[serde(rename = "@number-of-pages", default, deserialize_with = "lenient_count")]
  pub number_of_pages:         u64,
  /// Available formats
  #[serde(rename = "ops:document-format-options", default, deserialize_with = "lenient_option")]
  pub document_format_options: Option<OpsDocumentFormatOptions>,
  /// Sections of the document
  #[serde(rename = "ops:document-section", default, deserialize_with = "lenient_list")]
  pub document_section:        Option<OneOrMany<OpsDocumentSection>>,
}

/// The `ops:inquiry-result` element of an image inquiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsInquiryResult {
  /// The retrievable documents
  #[serde(rename = "ops:document-instance", default, deserialize_with = "lenient_list")]
  pub document_instance: Option<OneOrMany<OpsDocumentInstance>>,
}

/// The `ops:document-inquiry` element of an image inquiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsDocumentInquiry {
  /// One result per matched publication
  #[serde(rename = "ops:inquiry-result", default, deserialize_with = "lenient_list")]
  pub inquiry_result: Option<OneOrMany<OpsInquiryResult>>,
}

/// `ops:world-patent-data` of an image inquiry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsImageWorldPatentData {
  /// The inquiry element
  #[serde(rename = "ops:document-inquiry", default, deserialize_with = "lenient_option")]
  pub document_inquiry: Option<OpsDocumentInquiry>,
}

/// Response of `published-data/publication/epodoc/{id}/images`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpsImageQueryResponse {
  /// Root element
  #[serde(rename = "ops:world-patent-data", default)]
  pub world_patent_data: OpsImageWorldPatentData,
}

/// OAuth2 client-credentials token response of `auth/accesstoken`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
  /// Bearer token for subsequent requests
  pub access_token:             String,
  /// Token type, `BearerToken` for OPS
  #[serde(default)]
  pub token_type:               Option<String>,
  /// Token lifetime in seconds
  #[serde(default)]
  pub expires_in:               Option<String>,
  /// Issue timestamp in milliseconds since the epoch
  #[serde(default)]
  pub issued_at:                Option<String>,
  /// Consumer key the token was issued to
  #[serde(default)]
  pub client_id:                Option<String>,
  /// Registered application name
  #[serde(default)]
  pub application_name:         Option<String>,
  /// Organisation that owns the application
  #[serde(default)]
  pub organization_name:        Option<String>,
  /// Products the token grants access to
  #[serde(default)]
  pub api_product_list:         Option<String>,
  /// Products the token grants access to, as a list
  #[serde(default)]
  pub api_product_list_json:    Vec<String>,
  /// Granted scope
  #[serde(default)]
  pub scope:                    Option<String>,
  /// Token status, `approved` on success
  #[serde(default)]
  pub status:                   Option<String>,
  /// Number of refreshes so far
  #[serde(default)]
  pub refresh_count:            Option<String>,
  /// Lifetime of the refresh token
  #[serde(default)]
  pub refresh_token_expires_in: Option<String>,
}

/// Accepts counts sent either as a JSON string or as a number; anything else reads as zero.
fn lenient_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where D: Deserializer<'de> {
  Ok(match Value::deserialize(deserializer)? {
    Value::Number(number) => number.as_u64().unwrap_or_default(),
    Value::String(text) => text.trim().parse().unwrap_or_default(),
    _ => 0,
  })
}

/// Reads an attribute or text value sent as a string, number or boolean.
/// Objects, arrays and `null` read as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where D: Deserializer<'de> {
  Ok(match Value::deserialize(deserializer)? {
    Value::String(text) => Some(text),
    Value::Number(number) => Some(number.to_string()),
    Value::Bool(flag) => Some(flag.to_string()),
    _ => None,
  })
}

/// Reads a nested element, treating one of an unexpected shape as absent.
fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned, {
  let value = Value::deserialize(deserializer)?;
  if value.is_null() {
    return Ok(None);
  }
  Ok(from_lenient_value(value))
}

/// Reads a list element by element.
///
/// A single object counts as a one-element list. Elements that do not parse are
/// dropped, so one malformed record never discards its siblings.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<OneOrMany<T>>, D::Error>
where
  D: Deserializer<'de>,
  T: DeserializeOwned, {
  let items = match Value::deserialize(deserializer)? {
    Value::Null => return Ok(None),
    Value::Array(items) => items,
    item => vec![item],
  };
  Ok(Some(OneOrMany::Many(items.into_iter().filter_map(from_lenient_value).collect())))
}

/// Parses one element, logging and dropping it on failure.
fn from_lenient_value<T: DeserializeOwned>(value: Value) -> Option<T> {
  match serde_json::from_value(value) {
    Ok(parsed) => Some(parsed),
    Err(e) => {
      warn!("Skipping malformed OPS element: {e}");
      None
    },
  }
}
