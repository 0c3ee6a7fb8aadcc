//! Draft report types — the analyzer's structured output, pre-synthesis.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four fixed report facets. Order here is the final output order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Conditions,
    Documentation,
    Authority,
    ProcessingTime,
}

impl Facet {
    pub const ALL: [Facet; 4] = [
        Facet::Conditions,
        Facet::Documentation,
        Facet::Authority,
        Facet::ProcessingTime,
    ];

    /// Stable slug used as the sub-question id for this facet.
    pub fn sub_question_id(self) -> &'static str {
        match self {
            Self::Conditions => "conditions",
            Self::Documentation => "documentation",
            Self::Authority => "authority",
            Self::ProcessingTime => "processing_time",
        }
    }

    /// Section heading in the final report.
    pub fn title(self) -> &'static str {
        match self {
            Self::Conditions => "Conditions",
            Self::Documentation => "Documentation",
            Self::Authority => "Authority",
            Self::ProcessingTime => "Processing Time",
        }
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sub_question_id())
    }
}

/// One claim in a draft section, bound to the evidence that backs it.
///
/// `evidence_ids` is ordered: the first id is the primary citation the
/// stale-authority rule checks. Duplicates are dropped on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub text: String,
    pub evidence_ids: Vec<String>,
}

impl Assertion {
    pub fn new(text: impl Into<String>, evidence_ids: Vec<String>) -> Self {
        let mut seen = Vec::new();
        for id in evidence_ids {
            if !seen.contains(&id) {
                seen.push(id);
            }
        }
        Self {
            text: text.into(),
            evidence_ids: seen,
        }
    }

    pub fn primary_evidence_id(&self) -> Option<&str> {
        self.evidence_ids.first().map(String::as_str)
    }
}

/// One facet's worth of drafted assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSection {
    pub facet: Facet,
    pub assertions: Vec<Assertion>,
}

impl DraftSection {
    pub fn new(facet: Facet, assertions: Vec<Assertion>) -> Self {
        Self { facet, assertions }
    }

    /// An empty section standing in for an analyzer response that failed
    /// its contract parse. The critic flags it rather than the parser
    /// aborting the iteration.
    pub fn empty(facet: Facet) -> Self {
        Self {
            facet,
            assertions: Vec::new(),
        }
    }

    /// Stable assertion id (`facet:index`) used in violation reports.
    pub fn assertion_id(&self, index: usize) -> String {
        format!("{}:{index}", self.facet)
    }
}

/// Reorder sections into the fixed facet order, keeping at most one
/// section per facet (first occurrence wins).
pub fn in_facet_order(sections: &[DraftSection]) -> Vec<DraftSection> {
    Facet::ALL
        .iter()
        .filter_map(|facet| sections.iter().find(|s| s.facet == *facet).cloned())
        .collect()
}
