//! Response contracts for LLM-backed agents.
//!
//! Model output is untrusted. Every parse here fails CLOSED: a
//! malformed response never produces fabricated structure, it produces
//! the empty or unchanged value, and the violation is left for the
//! deterministic gates downstream to catch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use evidence::{resolve_in, Assertion, DraftSection, EvidencePack, Facet};

/// An assertion as emitted by the analyzer model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssertionContract {
    pub text: String,
    #[serde(default)]
    pub evidence_ids: Vec<String>,
}

/// The analyzer's full per-section response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionContract {
    #[serde(default)]
    pub assertions: Vec<AssertionContract>,
}

/// The synthesizer's per-section response: rewritten assertion texts,
/// one per input assertion, same order.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RewriteContract {
    #[serde(default)]
    pub assertions: Vec<String>,
}

/// Extract the JSON payload from a model response that may wrap it in
/// a fenced block or surround it with prose.
pub fn extract_json_block(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    if let Some(start) = trimmed.find("```") {
        let rest = &trimmed[start + 3..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim());
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end > start {
        Some(&trimmed[start..=end])
    } else {
        None
    }
}

/// Parse an analyzer response into a draft section.
///
/// Evidence ids that do not resolve against the iteration's packs are
/// dropped (the model hallucinated them); the assertion itself is kept
/// so the citation-coverage gate can flag it. Any parse failure yields
/// an empty section for the facet.
pub fn parse_section_response(
    raw: &str,
    facet: Facet,
    packs: &BTreeMap<String, EvidencePack>,
) -> DraftSection {
    let Some(json) = extract_json_block(raw) else {
        warn!(%facet, "Analyzer response contained no JSON payload");
        return DraftSection::empty(facet);
    };
    let contract: SectionContract = match serde_json::from_str(json) {
        Ok(contract) => contract,
        Err(e) => {
            warn!(%facet, error = %e, "Analyzer response failed contract parse");
            return DraftSection::empty(facet);
        }
    };

    let mut assertions = Vec::with_capacity(contract.assertions.len());
    for entry in contract.assertions {
        let text = entry.text.trim().to_string();
        if text.is_empty() {
            continue;
        }
        let mut ids = Vec::with_capacity(entry.evidence_ids.len());
        for id in entry.evidence_ids {
            if resolve_in(packs, &id).is_some() {
                ids.push(id);
            } else {
                warn!(%facet, evidence_id = %id, "Dropping unresolvable evidence id");
            }
        }
        assertions.push(Assertion::new(text, ids));
    }
    DraftSection { facet, assertions }
}

/// Parse a synthesizer response into rewritten texts. Returns `None` on
/// any contract failure — the caller keeps the original texts.
pub fn parse_rewrite_response(raw: &str) -> Option<Vec<String>> {
    let json = extract_json_block(raw)?;
    let contract: RewriteContract = serde_json::from_str(json).ok()?;
    if contract.assertions.iter().any(|t| t.trim().is_empty()) {
        return None;
    }
    Some(contract.assertions)
}
