//! Retriever — concurrent fan-out of one plan across the retrieval
//! gateway.
//!
//! Sub-questions are retrieved concurrently; a failed facet degrades to
//! an empty pack instead of aborting the round, and the set of
//! unavailable facets is reported so the loop can distinguish partial
//! degradation from total outage.

use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::BTreeMap;
use tracing::{info, warn};

use evidence::{EvidencePack, Facet};

use crate::planner::SubQuestion;
use crate::retrieval::RetrievalGateway;

/// The outcome of one retrieval round.
#[derive(Debug)]
pub struct RetrievalRound {
    /// One pack per facet, keyed by sub-question id.
    pub packs: BTreeMap<String, EvidencePack>,
    /// Facets whose backend calls exhausted their retry budget.
    pub unavailable_facets: Vec<Facet>,
}

impl RetrievalRound {
    /// True when no facet produced any evidence because every backend
    /// call failed.
    pub fn total_outage(&self) -> bool {
        !self.packs.is_empty() && self.unavailable_facets.len() == self.packs.len()
    }
}

/// Fan-out retriever over a shared gateway.
pub struct Retriever {
    gateway: RetrievalGateway,
}

impl Retriever {
    pub fn new(gateway: RetrievalGateway) -> Self {
        Self { gateway }
    }

    pub async fn retrieve_all(&self, plan: &[SubQuestion], as_of: NaiveDate) -> RetrievalRound {
        let futures = plan
            .iter()
            .map(|sq| async move { (sq, self.gateway.retrieve(sq, as_of).await) });
        let results = join_all(futures).await;

        let mut packs = BTreeMap::new();
        let mut unavailable_facets = Vec::new();
        for (sq, result) in results {
            match result {
                Ok(pack) => {
                    info!(
                        facet = %sq.facet,
                        items = pack.items.len(),
                        degraded = pack.degraded,
                        "Retrieved evidence pack"
                    );
                    packs.insert(sq.id.clone(), pack);
                }
                Err(e) => {
                    warn!(facet = %sq.facet, error = %e, "Retrieval unavailable for facet");
                    unavailable_facets.push(sq.facet);
                    packs.insert(
                        sq.id.clone(),
                        EvidencePack::unavailable(sq.id.clone(), sq.filters.clone()),
                    );
                }
            }
        }
        RetrievalRound {
            packs,
            unavailable_facets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Planner;
    use crate::retrieval::{MockSearchBackend, RawHit, RetrievalError};
    use evidence::RetrievalFilters;
    use std::sync::Arc;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn plan() -> Vec<SubQuestion> {
        Planner::new(RetrievalFilters::default()).plan("open a pharmacy", None)
    }

    #[tokio::test]
    async fn test_round_covers_every_facet() {
        let mut backend = MockSearchBackend::new();
        backend.expect_search().returning(|_, _| {
            Ok(vec![RawHit {
                chunk_id: "c1".to_string(),
                content: "some rule".to_string(),
                doc_name: "Luật Dược 105/2016/QH13".to_string(),
                ..RawHit::default()
            }])
        });
        let retriever = Retriever::new(RetrievalGateway::new(Arc::new(backend), 1));
        let round = retriever.retrieve_all(&plan(), as_of()).await;
        assert_eq!(round.packs.len(), Facet::ALL.len());
        assert!(round.unavailable_facets.is_empty());
        assert!(!round.total_outage());
    }

    #[tokio::test]
    async fn test_failed_facet_degrades_to_empty_pack() {
        let mut backend = MockSearchBackend::new();
        backend.expect_search().returning(|query, _| {
            if query.contains("competent authority") {
                Err(RetrievalError::Request("http 500".to_string()))
            } else {
                Ok(vec![RawHit {
                    chunk_id: "c1".to_string(),
                    content: "some rule".to_string(),
                    doc_name: "Luật Dược 105/2016/QH13".to_string(),
                    ..RawHit::default()
                }])
            }
        });
        let retriever = Retriever::new(RetrievalGateway::new(Arc::new(backend), 1));
        let round = retriever.retrieve_all(&plan(), as_of()).await;
        assert_eq!(round.unavailable_facets, vec![Facet::Authority]);
        let authority = &round.packs["authority"];
        assert!(authority.items.is_empty());
        assert!(authority.degraded);
        assert!(!round.total_outage());
    }

    #[tokio::test]
    async fn test_total_outage_detected() {
        let mut backend = MockSearchBackend::new();
        backend
            .expect_search()
            .returning(|_, _| Err(RetrievalError::Request("http 500".to_string())));
        let retriever = Retriever::new(RetrievalGateway::new(Arc::new(backend), 1));
        let round = retriever.retrieve_all(&plan(), as_of()).await;
        assert!(round.total_outage());
        assert_eq!(round.unavailable_facets.len(), Facet::ALL.len());
    }
}
