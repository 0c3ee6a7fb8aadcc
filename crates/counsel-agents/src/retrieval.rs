//! Retrieval gateway — the sole path from the vector store into the
//! evidence model.
//!
//! Raw hits from the search backend are mapped into validated
//! [`EvidenceItem`]s here; nothing downstream ever sees an unvalidated
//! chunk. Backend rank order is preserved exactly — the gateway never
//! re-sorts hits.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[cfg(test)]
use mockall::automock;

use evidence::{
    ArticleRef, DocumentType, EvidenceItem, EvidencePack, RetrievalFilters, ValidityStatus,
};

use crate::completion::{backoff_delay, is_transient_status};
use crate::config::RetrievalEndpoint;
use crate::planner::SubQuestion;

#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Transient backend failure — retried with backoff.
    #[error("transient retrieval failure: {0}")]
    Transient(String),
    /// Non-transient request failure — not retried.
    #[error("retrieval request failed: {0}")]
    Request(String),
    /// Retry budget exhausted for one sub-question.
    #[error("retrieval backend unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },
}

/// One raw hit as returned by the search backend, before validation.
/// Legal metadata fields are optional — chunks ingested without the
/// enrichment pipeline only carry content and a document name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(default)]
    pub chunk_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_with_weight: String,
    #[serde(default)]
    pub doc_name: String,
    #[serde(default)]
    pub document_keyword: String,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub authority: Option<String>,
    #[serde(default)]
    pub article: Option<u32>,
    #[serde(default)]
    pub clause: Option<u32>,
    #[serde(default)]
    pub point: Option<String>,
    #[serde(default)]
    pub issued_date: Option<NaiveDate>,
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub superseded_by: Option<String>,
}

/// The opaque search dependency: one query in, ranked hits out.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filters: &RetrievalFilters,
    ) -> Result<Vec<RawHit>, RetrievalError>;
}

// -- HTTP backend wire types --

#[derive(Serialize)]
struct SearchRequest<'a> {
    question: &'a str,
    top_k: usize,
    similarity_threshold: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dataset_ids: Vec<String>,
}

/// The retrieval API has shipped two response shapes; accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Enveloped { data: SearchData },
    Bare(Vec<RawHit>),
}

#[derive(Deserialize)]
struct SearchData {
    #[serde(default)]
    chunks: Vec<RawHit>,
    #[serde(default)]
    docs: Vec<RawHit>,
}

/// Production backend against the retrieval service's HTTP API.
pub struct HttpSearchBackend {
    client: reqwest::Client,
    endpoint: RetrievalEndpoint,
}

impl HttpSearchBackend {
    pub fn new(endpoint: RetrievalEndpoint, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn search(
        &self,
        query: &str,
        filters: &RetrievalFilters,
    ) -> Result<Vec<RawHit>, RetrievalError> {
        let request = SearchRequest {
            question: query,
            top_k: filters.top_k,
            similarity_threshold: filters.similarity_threshold,
            dataset_ids: filters.dataset_ids.clone(),
        };

        let url = format!("{}/api/v1/retrieval", self.endpoint.url.trim_end_matches('/'));
        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                RetrievalError::Transient(e.to_string())
            } else {
                RetrievalError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        if is_transient_status(status) {
            return Err(RetrievalError::Transient(format!("http {status}")));
        }
        if !status.is_success() {
            return Err(RetrievalError::Request(format!("http {status}")));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Request(format!("malformed response: {e}")))?;
        Ok(match body {
            SearchResponse::Bare(hits) => hits,
            SearchResponse::Enveloped { data } => {
                if data.chunks.is_empty() {
                    data.docs
                } else {
                    data.chunks
                }
            }
        })
    }
}

/// Retrieval gateway: retry policy plus hit-to-evidence mapping.
pub struct RetrievalGateway {
    backend: Arc<dyn SearchBackend>,
    max_attempts: u32,
}

impl RetrievalGateway {
    pub fn new(backend: Arc<dyn SearchBackend>, max_attempts: u32) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Retrieve one sub-question's evidence pack as of `as_of`.
    ///
    /// Only transient errors consume retry budget; a non-transient
    /// failure surfaces immediately as `Unavailable` with one attempt
    /// recorded.
    pub async fn retrieve(
        &self,
        sub_question: &SubQuestion,
        as_of: NaiveDate,
    ) -> Result<EvidencePack, RetrievalError> {
        let mut last_error = String::new();
        for attempt in 0..self.max_attempts {
            match self
                .backend
                .search(&sub_question.query, &sub_question.filters)
                .await
            {
                Ok(hits) => {
                    let items = self.map_hits(sub_question, hits, as_of);
                    return Ok(EvidencePack::new(
                        sub_question.id.clone(),
                        items,
                        sub_question.filters.clone(),
                    ));
                }
                Err(RetrievalError::Transient(e)) => {
                    let backoff = backoff_delay(attempt);
                    warn!(
                        sub_question = %sub_question.id,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Transient retrieval error — retrying"
                    );
                    last_error = e;
                    if attempt + 1 < self.max_attempts {
                        tokio::time::sleep(backoff).await;
                    }
                }
                Err(RetrievalError::Request(e)) => {
                    return Err(RetrievalError::Unavailable {
                        attempts: attempt + 1,
                        last_error: e,
                    });
                }
                Err(unavailable) => return Err(unavailable),
            }
        }
        Err(RetrievalError::Unavailable {
            attempts: self.max_attempts,
            last_error,
        })
    }

    /// Map raw hits into validated evidence items, preserving rank.
    /// Hits with empty quotes are dropped; when `effective_only` is set,
    /// expired items are filtered out after validity stamping.
    fn map_hits(
        &self,
        sub_question: &SubQuestion,
        hits: Vec<RawHit>,
        as_of: NaiveDate,
    ) -> Vec<EvidenceItem> {
        let mut items = Vec::with_capacity(hits.len());
        for (idx, hit) in hits.into_iter().enumerate() {
            let quote = if hit.content_with_weight.trim().is_empty() {
                hit.content.clone()
            } else {
                hit.content_with_weight.clone()
            };
            if quote.trim().is_empty() {
                debug!(sub_question = %sub_question.id, idx, "Dropping hit with empty content");
                continue;
            }

            let id = if hit.chunk_id.trim().is_empty() {
                format!("{}-{}", sub_question.id, idx)
            } else {
                hit.chunk_id.clone()
            };
            let title = if hit.doc_name.trim().is_empty() {
                if hit.document_keyword.trim().is_empty() {
                    "Unknown Document".to_string()
                } else {
                    hit.document_keyword.clone()
                }
            } else {
                hit.doc_name.clone()
            };
            let document_type = DocumentType::detect(&title);

            let mut item = match EvidenceItem::new(id, quote, title, document_type) {
                Ok(item) => item,
                Err(e) => {
                    warn!(sub_question = %sub_question.id, idx, error = %e, "Dropping invalid hit");
                    continue;
                }
            };
            if let Some(authority) = hit.authority {
                item = item.with_authority(authority);
            }
            if hit.article.is_some() || hit.clause.is_some() || hit.point.is_some() {
                item = item.with_article_ref(ArticleRef {
                    article: hit.article,
                    clause: hit.clause,
                    point: hit.point,
                });
            }
            if let Some(date) = hit.issued_date {
                item = item.with_issued_date(date);
            }
            if let Some(date) = hit.effective_date {
                item = item.with_effective_date(date);
            }
            if let Some(date) = hit.expiry_date {
                item = item.with_expiry_date(date);
            }
            if let Some(doc) = hit.superseded_by {
                item = item.with_superseded_by(doc);
            }
            if let Some(similarity) = hit.similarity {
                item = item.with_similarity(similarity);
            }
            item.refresh_validity(as_of);

            if sub_question.filters.effective_only
                && item.validity_status == ValidityStatus::Expired
            {
                debug!(sub_question = %sub_question.id, id = %item.id, "Dropping expired item");
                continue;
            }
            items.push(item);
        }
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidence::Facet;

    fn sub_question(filters: RetrievalFilters) -> SubQuestion {
        SubQuestion {
            id: "conditions".to_string(),
            facet: Facet::Conditions,
            query: "business conditions".to_string(),
            filters,
        }
    }

    fn hit(chunk_id: &str, content: &str, doc_name: &str) -> RawHit {
        RawHit {
            chunk_id: chunk_id.to_string(),
            content: content.to_string(),
            doc_name: doc_name.to_string(),
            ..RawHit::default()
        }
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_response_shapes_enveloped_and_bare() {
        let enveloped = r#"{"data": {"chunks": [{"chunk_id": "c1", "content": "x"}]}}"#;
        let parsed: SearchResponse = serde_json::from_str(enveloped).unwrap();
        match parsed {
            SearchResponse::Enveloped { data } => {
                assert_eq!(data.chunks.len(), 1);
                assert_eq!(data.chunks[0].chunk_id, "c1");
            }
            SearchResponse::Bare(_) => panic!("expected enveloped shape"),
        }

        let docs = r#"{"data": {"docs": [{"chunk_id": "d1", "content": "y"}]}}"#;
        let parsed: SearchResponse = serde_json::from_str(docs).unwrap();
        match parsed {
            SearchResponse::Enveloped { data } => {
                assert!(data.chunks.is_empty());
                assert_eq!(data.docs[0].chunk_id, "d1");
            }
            SearchResponse::Bare(_) => panic!("expected enveloped shape"),
        }

        let bare = r#"[{"chunk_id": "c2", "content": "z"}]"#;
        let parsed: SearchResponse = serde_json::from_str(bare).unwrap();
        assert!(matches!(parsed, SearchResponse::Bare(hits) if hits.len() == 1));
    }

    #[tokio::test]
    async fn test_retrieve_preserves_backend_rank_order() {
        let mut backend = MockSearchBackend::new();
        backend.expect_search().returning(|_, _| {
            Ok(vec![
                hit("c1", "first chunk", "Luật Doanh nghiệp 59/2020/QH14"),
                hit("c2", "second chunk", "Nghị định 01/2021/NĐ-CP"),
                hit("c3", "third chunk", "Thông tư 01/2021/TT-BKHDT"),
            ])
        });
        let gateway = RetrievalGateway::new(Arc::new(backend), 3);
        let pack = gateway
            .retrieve(&sub_question(RetrievalFilters::default()), as_of())
            .await
            .unwrap();
        assert_eq!(pack.item_ids(), vec!["c1", "c2", "c3"]);
        assert_eq!(pack.items[0].document_type, DocumentType::LawOrResolution);
        assert_eq!(pack.items[1].document_type, DocumentType::Decree);
    }

    #[tokio::test]
    async fn test_retrieve_maps_locator_and_metadata() {
        let mut backend = MockSearchBackend::new();
        backend.expect_search().returning(|_, _| {
            let mut enriched = hit("c1", "licence duration", "Luật Khoáng sản 60/2010/QH12");
            enriched.authority = Some("National Assembly".to_string());
            enriched.article = Some(54);
            enriched.clause = Some(2);
            enriched.point = Some("a".to_string());
            enriched.issued_date = NaiveDate::from_ymd_opt(2010, 11, 17);
            enriched.effective_date = NaiveDate::from_ymd_opt(2011, 7, 1);
            enriched.similarity = Some(0.92);
            Ok(vec![enriched])
        });
        let gateway = RetrievalGateway::new(Arc::new(backend), 3);
        let pack = gateway
            .retrieve(&sub_question(RetrievalFilters::default()), as_of())
            .await
            .unwrap();
        let item = &pack.items[0];
        let locator = item.article_ref.as_ref().unwrap();
        assert_eq!(locator.article, Some(54));
        assert_eq!(locator.clause, Some(2));
        assert_eq!(locator.point.as_deref(), Some("a"));
        assert_eq!(item.issuing_authority.as_deref(), Some("National Assembly"));
        assert_eq!(item.similarity, Some(0.92));
        // Validity stamped from the mapped dates.
        assert_eq!(item.validity_status, ValidityStatus::Active);
    }

    #[tokio::test]
    async fn test_retrieve_drops_empty_content_and_generates_ids() {
        let mut backend = MockSearchBackend::new();
        backend.expect_search().returning(|_, _| {
            Ok(vec![
                hit("", "usable chunk", "Some Law"),
                hit("c2", "   ", "Some Law"),
            ])
        });
        let gateway = RetrievalGateway::new(Arc::new(backend), 3);
        let pack = gateway
            .retrieve(&sub_question(RetrievalFilters::default()), as_of())
            .await
            .unwrap();
        assert_eq!(pack.items.len(), 1);
        assert_eq!(pack.items[0].id, "conditions-0");
        assert!(pack.degraded);
    }

    #[tokio::test]
    async fn test_effective_only_drops_expired_items() {
        let mut backend = MockSearchBackend::new();
        backend.expect_search().returning(|_, _| {
            let mut expired = hit("c1", "old rule", "Nghị định 78/2015/NĐ-CP");
            expired.expiry_date = NaiveDate::from_ymd_opt(2021, 1, 4);
            Ok(vec![expired, hit("c2", "current rule", "Nghị định 01/2021/NĐ-CP")])
        });
        let gateway = RetrievalGateway::new(Arc::new(backend), 3);
        let filters = RetrievalFilters {
            effective_only: true,
            ..RetrievalFilters::default()
        };
        let pack = gateway.retrieve(&sub_question(filters), as_of()).await.unwrap();
        assert_eq!(pack.item_ids(), vec!["c2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_retry_then_succeed() {
        let mut backend = MockSearchBackend::new();
        let mut calls = 0u32;
        backend.expect_search().returning(move |_, _| {
            calls += 1;
            if calls < 3 {
                Err(RetrievalError::Transient("timeout".to_string()))
            } else {
                Ok(vec![hit("c1", "chunk", "Some Law")])
            }
        });
        let gateway = RetrievalGateway::new(Arc::new(backend), 3);
        let pack = gateway
            .retrieve(&sub_question(RetrievalFilters::default()), as_of())
            .await
            .unwrap();
        assert_eq!(pack.items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_exhaust_budget() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_search()
            .times(3)
            .returning(|_, _| Err(RetrievalError::Transient("timeout".to_string())));
        let gateway = RetrievalGateway::new(Arc::new(backend), 3);
        let err = gateway
            .retrieve(&sub_question(RetrievalFilters::default()), as_of())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Unavailable { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_request_errors_fail_without_retry() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_search()
            .times(1)
            .returning(|_, _| Err(RetrievalError::Request("http 401".to_string())));
        let gateway = RetrievalGateway::new(Arc::new(backend), 3);
        let err = gateway
            .retrieve(&sub_question(RetrievalFilters::default()), as_of())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Unavailable { attempts: 1, .. }
        ));
    }
}
