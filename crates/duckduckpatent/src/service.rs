//! Patent operations composed from the OPS client and the normalization helpers.
//!
//! [`PatentsService`] is what the HTTP layer and the CLI talk to. Each operation
//! builds one OPS URL, sends it through the authenticated [`OpsClient`] and hands
//! the parsed answer to [`normalize`](crate::normalize).
//!
//! # Examples
//!
//! ```no_run
//! use duckduckpatent::{config::OpsConfig, service::PatentsService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = PatentsService::new(OpsConfig::from_env()?);
//!
//! let patent = service.get("EP1000000.A1").await?;
//! println!("{}: {}", patent.id, patent.title);
//!
//! for document in service.query_documents(&patent.id).await? {
//!   println!("{} ({} pages)", document.doc_type, document.pages);
//! }
//! # Ok(())
//! # }
//! ```

use super::*;
use crate::{
  normalize::{self, DEFAULT_PAGE_SIZE},
  ops::{
    list, OpsExchangeDocumentEntry, OpsImageQueryResponse, PatentFamilyResponse,
    PatentQueryResponse, PublicationResponse,
  },
  patent::{PatentSearchQuery, DEFAULT_LANGUAGE},
};

/// Biblio search endpoint.
pub const SEARCH_ENDPOINT: &str = "/rest-services/published-data/search/biblio";

/// Single publication endpoint, followed by `{id}/biblio` or `{id}/images`.
pub const PUBLICATION_ENDPOINT: &str = "/rest-services/published-data/publication/epodoc/";

/// Family endpoint, followed by `{id}/biblio`.
pub const FAMILY_ENDPOINT: &str = "/rest-services/family/publication/docdb/";

/// Root of relative document links.
pub const REST_SERVICES: &str = "/rest-services/";

/// Page size of a search filtered by inventor or applicant.
pub const PARTY_PAGE_SIZE: u32 = 5;

/// Search, lookup and document retrieval against OPS.
pub struct PatentsService {
  /// Authenticated OPS client, shared token cache included.
  client: OpsClient,
}

impl PatentsService {
  /// Creates a service talking to OPS over HTTP.
  pub fn new(config: OpsConfig) -> Self { Self { client: OpsClient::new(config) } }

  /// Creates a service sending its requests through `transport`.
  pub fn with_transport(config: OpsConfig, transport: Arc<dyn Transport>) -> Self {
    Self { client: OpsClient::with_transport(config, transport) }
  }

  /// The underlying OPS client.
  pub fn client(&self) -> &OpsClient { &self.client }

  /// Builds an absolute OPS URL from a path below the base URL.
  fn url(&self, path: &str) -> String { format!("{}{}", self.client.config().base_url, path) }

  /// Searches for patents.
  ///
  /// Searches filtered by inventor or applicant use pages of
  /// [`PARTY_PAGE_SIZE`], all others pages of [`DEFAULT_PAGE_SIZE`]. Results
  /// without a title in one of the query's languages are dropped.
  pub async fn query(&self, query: &PatentSearchQuery) -> Result<QueryResult, PatentError> {
    let page_size = if query.has_party_filter() { PARTY_PAGE_SIZE } else { DEFAULT_PAGE_SIZE };
    let url = normalize::query_string(&self.url(SEARCH_ENDPOINT), query, page_size);
    debug!("Searching OPS: {}", url);

    let response: PatentQueryResponse =
      self.client.send_ops_request(OpsRequest::get(url)).await?.json()?;
    Ok(normalize::process_query(&response, Some(query.language.as_str())))
  }

  /// Fetches a single patent by its epodoc id, e.g. `EP1000000.A1`.
  ///
  /// # Errors
  ///
  /// Returns [`PatentError::NotFound`] if OPS answers without any document.
  pub async fn get(&self, patent_id: &str) -> Result<Patent, PatentError> {
    let url = self.url(&format!("{PUBLICATION_ENDPOINT}{patent_id}/biblio"));

    let response: PublicationResponse =
      self.client.send_ops_request(OpsRequest::get(url)).await?.json()?;
    let doc = response.first_document().ok_or(PatentError::NotFound)?;
    Ok(normalize::process_patent(doc, DEFAULT_LANGUAGE))
  }

  /// Fetches the family of a patent.
  ///
  /// Every family member contributes its first exchange document, and the total
  /// is the family size reported by OPS. No language filter is applied.
  pub async fn query_family(&self, patent_id: &str) -> Result<QueryResult, PatentError> {
    let url = self.url(&format!("{FAMILY_ENDPOINT}{patent_id}/biblio"));

    let response: PatentFamilyResponse =
      self.client.send_ops_request(OpsRequest::get(url)).await?.json()?;
    let family = response.world_patent_data.patent_family;

    let entries = list(&family.family_member)
      .iter()
      .filter_map(|member| list(&member.exchange_document).first().cloned())
      .map(OpsExchangeDocumentEntry::new)
      .collect();
    trace!("Family of {patent_id} has {} members", family.total_result_count);

    let search = PatentQueryResponse::from_documents(family.total_result_count, entries);
    Ok(normalize::process_query(&search, None))
  }

  /// Lists the documents (full text, drawings, ...) available for a patent.
  pub async fn query_documents(
    &self,
    patent_id: &str,
  ) -> Result<Vec<DocumentInformation>, PatentError> {
    let url = self.url(&format!("{PUBLICATION_ENDPOINT}{patent_id}/images"));

    let response: OpsImageQueryResponse =
      self.client.send_ops_request(OpsRequest::get(url)).await?.json()?;
    Ok(normalize::process_image_query(&response))
  }

  /// Fetches one page of a document.
  ///
  /// `url` is a document link as found in [`DocumentInformation::url`], relative
  /// to `rest-services/`. The body is returned untouched together with all
  /// upstream headers.
  pub async fn get_document(
    &self,
    url: &str,
    content_type: &str,
    range: u32,
  ) -> Result<OpsResponse, PatentError> {
    let url = self.url(&format!("{REST_SERVICES}{}", url.trim_start_matches('/')));
    let request =
      OpsRequest::get(url).header("X-OPS-Range", range.to_string()).accept(content_type);
    self.client.send_ops_request(request).await
  }
}
