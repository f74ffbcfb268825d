use std::sync::Mutex;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};

use super::*;
use crate::{
  clients::transport::{HttpRequest, HttpResponse},
  patent::PatentSearchQuery,
  service::PatentsService,
};

/// In-memory OPS: serves tokens and answers data requests by URL fragment.
#[derive(Default)]
struct MockOps {
  /// `(url fragment, status, body, content type)`, first match wins
  routes:   Vec<(&'static str, StatusCode, Vec<u8>, &'static str)>,
  /// Every data request received
  requests: Mutex<Vec<HttpRequest>>,
}

impl MockOps {
  fn json(mut self, fragment: &'static str, body: Value) -> Self {
    self.routes.push((fragment, StatusCode::OK, body.to_string().into_bytes(), "application/json"));
    self
  }

  fn status(mut self, fragment: &'static str, status: StatusCode, body: &str) -> Self {
    self.routes.push((fragment, status, body.as_bytes().to_vec(), "text/plain"));
    self
  }

  fn bytes(mut self, fragment: &'static str, body: &[u8], content_type: &'static str) -> Self {
    self.routes.push((fragment, StatusCode::OK, body.to_vec(), content_type));
    self
  }

  fn urls(&self) -> Vec<String> {
    self.requests.lock().unwrap().iter().map(|r| r.url.clone()).collect()
  }
}

#[async_trait::async_trait]
impl Transport for MockOps {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, PatentError> {
    let mut headers = HeaderMap::new();
    if request.url.ends_with("/auth/accesstoken") {
      let body = json!({ "access_token": "test-token", "token_type": "BearerToken" });
      return Ok(HttpResponse {
        status: StatusCode::OK,
        headers,
        body: body.to_string().into_bytes(),
      });
    }

    let route = self.routes.iter().find(|(fragment, ..)| request.url.contains(fragment)).cloned();
    self.requests.lock().unwrap().push(request);

    let (status, body, content_type) = match route {
      Some((_, status, body, content_type)) => (status, body, content_type),
      None => (StatusCode::NOT_FOUND, b"No results found".to_vec(), "text/plain"),
    };
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert("x-throttling-control", HeaderValue::from_static("idle (images=green:200)"));
    Ok(HttpResponse { status, headers, body })
  }
}

fn service(ops: MockOps) -> (PatentsService, Arc<MockOps>) {
  let ops = Arc::new(ops);
  let config = OpsConfig::new("https://ops.test/3.2", "key", "secret").unwrap();
  (PatentsService::with_transport(config, ops.clone()), ops)
}

fn bread_maker() -> Value {
  json!({
    "@country": "US",
    "@doc-number": "123456",
    "@kind": "A1",
    "bibliographic-data": {
      "invention-title": { "$": "Bread Maker", "@lang": "en" },
      "parties": {
        "inventors": {
          "inventor": { "@sequence": "1", "inventor-name": { "name": { "$": "Jane Doe" } } }
        },
        "applicants": {
          "applicant": { "@sequence": "1", "applicant-name": { "name": { "$": "ACME Corp" } } }
        }
      },
      "references-cited": {
        "citation": {
          "@cited-phase": "",
          "patcit": {
            "@dnum-type": "",
            "document-id": [{
              "@document-id-type": "docdb",
              "doc-number": { "$": "987654" },
              "kind": { "$": "B1" },
              "country": { "$": "DE" }
            }]
          }
        }
      }
    },
    "abstract": { "@lang": "en", "p": { "$": "A device for making bread." } }
  })
}

fn titled(country: &str, number: &str, title: &str, lang: &str) -> Value {
  json!({
    "@country": country,
    "@doc-number": number,
    "@kind": "A1",
    "@family-id": "4711",
    "bibliographic-data": { "invention-title": { "$": title, "@lang": lang } }
  })
}

#[traced_test]
#[tokio::test]
async fn test_search_end_to_end() -> anyhow::Result<()> {
  let ops = MockOps::default().json(
    "search/biblio",
    json!({
      "ops:world-patent-data": {
        "ops:biblio-search": {
          "@total-result-count": "1",
          "ops:search-result": { "exchange-documents": { "exchange-document": bread_maker() } }
        }
      }
    }),
  );
  let (service, ops) = service(ops);

  let result = service.query(&PatentSearchQuery::new(vec!["bread".into()])).await?;

  assert_eq!(result.total, 1);
  assert_eq!(result.patents, vec![Patent {
    id:            "US123456.A1".into(),
    title:         "Bread Maker".into(),
    abstract_text: "A device for making bread.".into(),
    citations:     vec![CitedPatent { id: "DE987654.B1".into() }],
    family_id:     None,
    inventors:     vec!["Jane Doe".into()],
    applicants:    vec!["ACME Corp".into()],
  }]);

  let urls = ops.urls();
  assert_eq!(urls.len(), 1);
  assert!(urls[0]
    .starts_with("https://ops.test/3.2/rest-services/published-data/search/biblio?q="));
  assert!(urls[0].ends_with("&Range=1-100"));
  assert!(logs_contain("Searching OPS"));
  Ok(())
}

#[tokio::test]
async fn test_party_search_uses_small_pages() -> anyhow::Result<()> {
  let ops = MockOps::default().json("search/biblio", json!({}));
  let (service, ops) = service(ops);

  let mut query = PatentSearchQuery::new(vec![]);
  query.inventor = Some("Jane Doe".into());
  query.page = 1;
  let result = service.query(&query).await?;

  assert!(result.patents.is_empty());
  assert_eq!(result.total, 0);
  assert!(ops.urls()[0].ends_with("inventor%3DJane Doe&Range=6-10"));
  Ok(())
}

#[tokio::test]
async fn test_search_filters_by_language() -> anyhow::Result<()> {
  let ops = MockOps::default().json(
    "search/biblio",
    json!({
      "ops:world-patent-data": {
        "ops:biblio-search": {
          "@total-result-count": 3,
          "ops:search-result": { "exchange-documents": [
            { "exchange-document": titled("EP", "1", "Brotbackautomat", "de") },
            { "exchange-document": titled("US", "2", "Bread machine", "en") },
            { "exchange-document": titled("FR", "3", "Machine à pain", "fr") }
          ] }
        }
      }
    }),
  );
  let (service, _) = service(ops);

  let mut query = PatentSearchQuery::new(vec!["bread".into()]);
  query.language = "ende".into();
  let result = service.query(&query).await?;

  let ids: Vec<&str> = result.patents.iter().map(|p| p.id.as_str()).collect();
  assert_eq!(ids, vec!["EP1.A1", "US2.A1"]);
  // the total is what OPS reports, not what survived the filter
  assert_eq!(result.total, 3);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_search_survives_odd_shaped_entries() -> anyhow::Result<()> {
  let mut numeric = titled("JP", "0", "Rice cooker", "en");
  numeric["@doc-number"] = json!(4);
  numeric["bibliographic-data"]["parties"] = json!({
    "inventors": { "inventor": { "@sequence": 1, "inventor-name": { "name": { "$": "Sato" } } } }
  });

  let ops = MockOps::default().json(
    "search/biblio",
    json!({
      "ops:world-patent-data": {
        "ops:biblio-search": {
          "@total-result-count": "4",
          "ops:search-result": { "exchange-documents": [
            { "exchange-document": titled("US", "1", "Bread machine", "en") },
            { "exchange-document": [
              titled("EP", "2", "Dough mixer", "en"),
              titled("EP", "2", "Dough mixer (B1)", "en")
            ] },
            "not an entry",
            { "exchange-document": numeric }
          ] }
        }
      }
    }),
  );
  let (service, _) = service(ops);

  let result = service.query(&PatentSearchQuery::new(vec!["bread".into()])).await?;

  let ids: Vec<&str> = result.patents.iter().map(|p| p.id.as_str()).collect();
  assert_eq!(ids, vec!["US1.A1", "EP2.A1", "JP4.A1"]);
  assert_eq!(result.patents[1].title, "Dough mixer");
  assert_eq!(result.patents[2].inventors, vec!["Sato"]);
  assert_eq!(result.total, 4);
  assert!(logs_contain("Skipping malformed OPS element"));
  Ok(())
}

#[tokio::test]
async fn test_get_takes_first_document() -> anyhow::Result<()> {
  let ops = MockOps::default().json(
    "publication/epodoc/US123456.A1/biblio",
    json!({
      "ops:world-patent-data": {
        "exchange-documents": {
          "exchange-document": [bread_maker(), titled("US", "123456", "Other", "en")]
        }
      }
    }),
  );
  let (service, _) = service(ops);

  let patent = service.get("US123456.A1").await?;

  assert_eq!(patent.id, "US123456.A1");
  assert_eq!(patent.title, "Bread Maker");
  Ok(())
}

#[tokio::test]
async fn test_get_without_documents_is_not_found() {
  let ops = MockOps::default().json("publication/epodoc/", json!({ "ops:world-patent-data": {} }));
  let (service, _) = service(ops);

  let err = service.get("US1.A1").await.unwrap_err();
  assert!(matches!(err, PatentError::NotFound));
}

#[tokio::test]
async fn test_get_unknown_patent_keeps_upstream_status() {
  let (service, _) = service(MockOps::default());

  let err = service.get("XX0.A1").await.unwrap_err();
  assert_eq!(err.upstream_status(), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_family_members_become_patents() -> anyhow::Result<()> {
  let ops = MockOps::default().json(
    "family/publication/docdb/EP1000000.A1/biblio",
    json!({
      "ops:world-patent-data": {
        "ops:patent-family": {
          "@total-result-count": "3",
          "ops:family-member": [
            { "@family-id": "4711", "exchange-document": titled("EP", "1000000", "Gerät", "de") },
            { "@family-id": "4711", "exchange-document": [
              titled("US", "2000000", "Device", "en"),
              titled("US", "2000000", "Device (corrected)", "en")
            ] },
            { "@family-id": "4711", "exchange-document": titled("JP", "3000000", "Souchi", "ja") }
          ]
        }
      }
    }),
  );
  let (service, _) = service(ops);

  let family = service.query_family("EP1000000.A1").await?;

  assert_eq!(family.total, 3);
  let ids: Vec<&str> = family.patents.iter().map(|p| p.id.as_str()).collect();
  assert_eq!(ids, vec!["EP1000000.A1", "US2000000.A1", "JP3000000.A1"]);
  assert_eq!(family.patents[1].title, "Device");
  assert!(family.patents.iter().all(|p| p.family_id.as_deref() == Some("4711")));
  Ok(())
}

#[tokio::test]
async fn test_single_family_member() -> anyhow::Result<()> {
  let ops = MockOps::default().json(
    "family/publication/docdb/",
    json!({
      "ops:world-patent-data": {
        "ops:patent-family": {
          "@total-result-count": 1,
          "ops:family-member": { "exchange-document": titled("EP", "1", "Only", "en") }
        }
      }
    }),
  );
  let (service, _) = service(ops);

  let family = service.query_family("EP1.A1").await?;

  assert_eq!(family.total, 1);
  assert_eq!(family.patents.len(), 1);
  Ok(())
}

#[tokio::test]
async fn test_query_documents() -> anyhow::Result<()> {
  let ops = MockOps::default().json(
    "publication/epodoc/EP1000000.A1/images",
    json!({
      "ops:world-patent-data": {
        "ops:document-inquiry": {
          "ops:inquiry-result": {
            "ops:document-instance": {
              "@desc": "FullDocument",
              "@link": "published-data/images/EP/1000000/A1/fullimage",
              "@number-of-pages": "12",
              "ops:document-format-options": {
                "ops:document-format": [{ "$": "application/pdf" }, { "$": "image/tiff" }]
              },
              "ops:document-section": { "@name": "CLAIMS", "@start-page": "9" }
            }
          }
        }
      }
    }),
  );
  let (service, _) = service(ops);

  let documents = service.query_documents("EP1000000.A1").await?;

  assert_eq!(documents, vec![DocumentInformation {
    formats:  vec!["application/pdf".into(), "image/tiff".into()],
    doc_type: "fulldocument".into(),
    url:      "published-data/images/EP/1000000/A1/fullimage".into(),
    sections: vec![DocumentSection { name: "CLAIMS".into(), start_page: "9".into() }],
    pages:    12,
  }]);
  Ok(())
}

#[tokio::test]
async fn test_get_document_passes_bytes_and_headers() -> anyhow::Result<()> {
  let ops =
    MockOps::default().bytes("images/EP/1000000/A1/fullimage", b"%PDF-1.4", "application/pdf");
  let (service, ops) = service(ops);

  let page = service
    .get_document("published-data/images/EP/1000000/A1/fullimage", "application/pdf", 3)
    .await?;

  assert_eq!(page.data, b"%PDF-1.4");
  assert_eq!(page.headers[CONTENT_TYPE], "application/pdf");
  assert!(page.headers.contains_key("x-throttling-control"));

  let requests = ops.requests.lock().unwrap();
  assert_eq!(
    requests[0].url,
    "https://ops.test/3.2/rest-services/published-data/images/EP/1000000/A1/fullimage"
  );
  assert_eq!(requests[0].headers["x-ops-range"], "3");
  assert_eq!(requests[0].headers[ACCEPT], "application/pdf");
  Ok(())
}

#[tokio::test]
async fn test_unparsable_response_is_api_error() {
  let ops = MockOps::default().status("search/biblio", StatusCode::OK, "<html>maintenance</html>");
  let (service, _) = service(ops);

  let err = service.query(&PatentSearchQuery::new(vec!["bread".into()])).await.unwrap_err();
  assert!(matches!(
    err,
    PatentError::ApiError(message) if message.starts_with("Failed to parse JSON")
  ));
}
