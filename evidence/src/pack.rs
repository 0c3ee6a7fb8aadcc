//! Evidence packs and retrieval filters.
//!
//! A pack holds the evidence gathered for one sub-question, in retrieval
//! rank order. Rank order is preserved end-to-end into the audit log —
//! it implicitly signals relevance to downstream consumers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::item::{DocumentType, EvidenceItem};

/// Minimum item count for a pack to be considered minimally acceptable.
/// Below this the pack is degraded and the shortfall flows into the
/// refinement directive context.
pub const MIN_ACCEPTABLE_ITEMS: usize = 5;

/// Filters passed to the retrieval backend alongside a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalFilters {
    pub top_k: usize,
    pub similarity_threshold: f64,
    /// Backend knowledge-base ids to search within.
    pub dataset_ids: Vec<String>,
    /// Drop items whose recomputed validity is expired.
    pub effective_only: bool,
    /// Rank preference hint produced by a hierarchy violation.
    pub prefer_document_type: Option<DocumentType>,
}

impl Default for RetrievalFilters {
    fn default() -> Self {
        Self {
            top_k: 10,
            similarity_threshold: 0.5,
            dataset_ids: Vec::new(),
            effective_only: false,
            prefer_document_type: None,
        }
    }
}

impl RetrievalFilters {
    /// Apply string-keyed overrides from a refinement directive.
    ///
    /// Unknown keys and unparseable values are ignored with a warning —
    /// a malformed directive must not abort a refinement pass.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) {
        for (key, value) in overrides {
            match key.as_str() {
                "effective_only" => match value.parse::<bool>() {
                    Ok(v) => self.effective_only = v,
                    Err(_) => tracing::warn!(%key, %value, "Ignoring unparseable filter override"),
                },
                "prefer_document_type" => match value.parse::<DocumentType>() {
                    Ok(ty) => self.prefer_document_type = Some(ty),
                    Err(_) => tracing::warn!(%key, %value, "Ignoring unparseable filter override"),
                },
                "top_k" => match value.parse::<usize>() {
                    Ok(v) if v > 0 => self.top_k = v,
                    _ => tracing::warn!(%key, %value, "Ignoring unparseable filter override"),
                },
                "similarity_threshold" => match value.parse::<f64>() {
                    Ok(v) if (0.0..=1.0).contains(&v) => self.similarity_threshold = v,
                    _ => tracing::warn!(%key, %value, "Ignoring unparseable filter override"),
                },
                _ => tracing::warn!(%key, "Ignoring unknown filter override key"),
            }
        }
    }
}

/// Evidence gathered for one sub-question, in retrieval rank order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePack {
    pub sub_question_id: String,
    pub items: Vec<EvidenceItem>,
    pub retrieval_filters_used: RetrievalFilters,
    /// Set when retrieval was unavailable or returned too few items.
    pub degraded: bool,
}

impl EvidencePack {
    pub fn new(
        sub_question_id: impl Into<String>,
        items: Vec<EvidenceItem>,
        retrieval_filters_used: RetrievalFilters,
    ) -> Self {
        let degraded = items.len() < MIN_ACCEPTABLE_ITEMS;
        Self {
            sub_question_id: sub_question_id.into(),
            items,
            retrieval_filters_used,
            degraded,
        }
    }

    /// An empty pack standing in for a sub-question whose retrieval was
    /// unavailable. Never a valid result — downstream rules flag it.
    pub fn unavailable(
        sub_question_id: impl Into<String>,
        retrieval_filters_used: RetrievalFilters,
    ) -> Self {
        Self {
            sub_question_id: sub_question_id.into(),
            items: Vec::new(),
            retrieval_filters_used,
            degraded: true,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded || self.items.len() < MIN_ACCEPTABLE_ITEMS
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn resolve(&self, id: &str) -> Option<&EvidenceItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Item ids in rank order, for audit summaries.
    pub fn item_ids(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.id.as_str()).collect()
    }
}

/// Resolve an evidence id across every pack consumed in the current run.
pub fn resolve_in<'a>(
    packs: &'a BTreeMap<String, EvidencePack>,
    id: &str,
) -> Option<&'a EvidenceItem> {
    packs.values().find_map(|pack| pack.resolve(id))
}
