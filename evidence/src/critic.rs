//! The critic — five mandatory evidence gates over a draft.
//!
//! Each rule is an independent predicate over `(draft, packs, as_of)`
//! returning zero or more violations; the verdict aggregates everything,
//! not just the first hit. Rules run in fixed order so verdicts are
//! reproducible in the audit log. The text-understanding pieces of rules
//! 4 and 5 (contradiction, entailment) are injected strategies — the
//! default [`LexicalJudge`] is a deterministic token heuristic, and an
//! LLM-backed judge is just another impl of the same traits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::draft::{DraftSection, Facet};
use crate::item::{DocumentType, EvidenceItem, ValidityStatus};
use crate::pack::{resolve_in, EvidencePack};

/// The five rule kinds, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    MissingCitation,
    StaleAuthority,
    HierarchyViolation,
    UnresolvedConflict,
    UnsupportedInference,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCitation => write!(f, "missing_citation"),
            Self::StaleAuthority => write!(f, "stale_authority"),
            Self::HierarchyViolation => write!(f, "hierarchy_violation"),
            Self::UnresolvedConflict => write!(f, "unresolved_conflict"),
            Self::UnsupportedInference => write!(f, "unsupported_inference"),
        }
    }
}

/// One rule violation found in a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: RuleKind,
    pub facet: Facet,
    pub detail: String,
    /// `facet:index` ids of the assertions involved.
    pub affected_assertion_ids: Vec<String>,
}

/// A refinement query tagged to the facet it should strengthen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetQuery {
    pub facet: Facet,
    pub query: String,
}

/// Structured feedback for the planner: which facets need new queries
/// and how their retrieval filters should change. Present iff the
/// verdict failed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RefinementDirective {
    pub missing_queries: Vec<FacetQuery>,
    pub new_filters: BTreeMap<Facet, BTreeMap<String, String>>,
}

/// The critic's pass/fail verdict plus everything it found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticVerdict {
    pub passed: bool,
    pub violations: Vec<Violation>,
    pub refinement_directive: Option<RefinementDirective>,
}

/// Pluggable contradiction check for rule 4 (and the "same point"
/// half of rule 3). Domain-specific text comparison lives behind this
/// seam.
pub trait ContradictionJudge: Send + Sync {
    fn contradicts(&self, a: &EvidenceItem, b: &EvidenceItem) -> bool;
}

/// Pluggable textual-entailment check for rule 5: is the assertion
/// substantively derivable from its cited quotes?
pub trait EntailmentJudge: Send + Sync {
    fn supports(&self, assertion: &str, quotes: &[&str]) -> bool;
}

/// Deterministic lexical judge — the default strategy.
///
/// Entailment: the fraction of the assertion's content tokens that
/// appear in some cited quote must reach `entailment_threshold`.
/// Contradiction: same article locator, a negation-marker asymmetry
/// between the two quotes, and enough shared content tokens that the
/// quotes are plausibly about the same provision.
#[derive(Debug, Clone)]
pub struct LexicalJudge {
    pub entailment_threshold: f64,
    pub overlap_threshold: f64,
}

impl Default for LexicalJudge {
    fn default() -> Self {
        Self {
            entailment_threshold: 0.5,
            overlap_threshold: 0.4,
        }
    }
}

const NEGATION_MARKERS: [&str; 8] = [
    "not", "no ", "shall not", "must not", "prohibited", "không", "cấm", "chưa",
];

fn content_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_string)
        .collect()
}

fn has_negation(text: &str) -> bool {
    let lower = text.to_lowercase();
    NEGATION_MARKERS.iter().any(|m| lower.contains(m))
}

fn token_overlap(a: &str, b: &str) -> f64 {
    let ta = content_tokens(a);
    let tb = content_tokens(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.iter().filter(|t| tb.contains(t)).count();
    shared as f64 / ta.len().min(tb.len()) as f64
}

impl ContradictionJudge for LexicalJudge {
    fn contradicts(&self, a: &EvidenceItem, b: &EvidenceItem) -> bool {
        // Only quotes anchored to the same article locator can be
        // compared mechanically.
        match (&a.article_ref, &b.article_ref) {
            (Some(ra), Some(rb)) if !ra.is_empty() && ra == rb => {}
            _ => return false,
        }
        if has_negation(&a.quote) == has_negation(&b.quote) {
            return false;
        }
        token_overlap(&a.quote, &b.quote) >= self.overlap_threshold
    }
}

impl EntailmentJudge for LexicalJudge {
    fn supports(&self, assertion: &str, quotes: &[&str]) -> bool {
        let tokens = content_tokens(assertion);
        if tokens.is_empty() {
            return false;
        }
        if quotes.is_empty() {
            return false;
        }
        let quote_tokens: Vec<String> = quotes.iter().flat_map(|q| content_tokens(q)).collect();
        let covered = tokens.iter().filter(|t| quote_tokens.contains(t)).count();
        covered as f64 / tokens.len() as f64 >= self.entailment_threshold
    }
}

/// The critic itself: the five rules plus its injected judges.
pub struct Critic {
    contradiction: Box<dyn ContradictionJudge>,
    entailment: Box<dyn EntailmentJudge>,
}

impl Default for Critic {
    fn default() -> Self {
        Self {
            contradiction: Box::new(LexicalJudge::default()),
            entailment: Box::new(LexicalJudge::default()),
        }
    }
}

impl Critic {
    pub fn new(
        contradiction: Box<dyn ContradictionJudge>,
        entailment: Box<dyn EntailmentJudge>,
    ) -> Self {
        Self {
            contradiction,
            entailment,
        }
    }

    /// Evaluate all five rules against the draft. Pure relative to its
    /// inputs — the same draft and packs always produce the same verdict.
    pub fn review(
        &self,
        draft: &[DraftSection],
        packs: &BTreeMap<String, EvidencePack>,
    ) -> CriticVerdict {
        let mut violations = Vec::new();
        violations.extend(check_citation_coverage(draft, packs));
        violations.extend(check_stale_authority(draft, packs));
        violations.extend(check_hierarchy(draft, packs, self.contradiction.as_ref()));
        violations.extend(check_source_conflict(
            draft,
            packs,
            self.contradiction.as_ref(),
        ));
        violations.extend(check_unsupported_inference(
            draft,
            packs,
            self.entailment.as_ref(),
        ));

        let passed = violations.is_empty();
        for v in &violations {
            tracing::debug!(rule = %v.rule, facet = %v.facet, detail = %v.detail, "Critic violation");
        }
        let refinement_directive = if passed {
            None
        } else {
            Some(build_directive(&violations, packs))
        };
        CriticVerdict {
            passed,
            violations,
            refinement_directive,
        }
    }
}

/// Rule 1 — every assertion cites at least one resolvable evidence id;
/// a facet section with zero assertions counts too (it is what a
/// degraded pack naturally produces).
fn check_citation_coverage(
    draft: &[DraftSection],
    packs: &BTreeMap<String, EvidencePack>,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for section in draft {
        if section.assertions.is_empty() {
            violations.push(Violation {
                rule: RuleKind::MissingCitation,
                facet: section.facet,
                detail: "facet produced no cited assertions".to_string(),
                affected_assertion_ids: Vec::new(),
            });
            continue;
        }
        for (i, assertion) in section.assertions.iter().enumerate() {
            if assertion.evidence_ids.is_empty() {
                violations.push(Violation {
                    rule: RuleKind::MissingCitation,
                    facet: section.facet,
                    detail: "assertion cites no evidence".to_string(),
                    affected_assertion_ids: vec![section.assertion_id(i)],
                });
                continue;
            }
            for id in &assertion.evidence_ids {
                if resolve_in(packs, id).is_none() {
                    violations.push(Violation {
                        rule: RuleKind::MissingCitation,
                        facet: section.facet,
                        detail: format!("evidence id `{id}` does not resolve to any pack"),
                        affected_assertion_ids: vec![section.assertion_id(i)],
                    });
                }
            }
        }
    }
    violations
}

/// Rule 2 — an assertion's primary (first-listed) evidence item must not
/// be expired.
fn check_stale_authority(
    draft: &[DraftSection],
    packs: &BTreeMap<String, EvidencePack>,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for section in draft {
        for (i, assertion) in section.assertions.iter().enumerate() {
            let Some(primary) = assertion.primary_evidence_id() else {
                continue;
            };
            let Some(item) = resolve_in(packs, primary) else {
                continue;
            };
            if item.validity_status == ValidityStatus::Expired {
                violations.push(Violation {
                    rule: RuleKind::StaleAuthority,
                    facet: section.facet,
                    detail: format!(
                        "primary citation `{}` ({}) is expired",
                        primary, item.document_title
                    ),
                    affected_assertion_ids: vec![section.assertion_id(i)],
                });
            }
        }
    }
    violations
}

/// Whether `higher` plausibly covers the same point as `lower`: same
/// article locator, or the judge says the two quotes are in conflict.
fn covers_same_point(
    lower: &EvidenceItem,
    higher: &EvidenceItem,
    judge: &dyn ContradictionJudge,
) -> bool {
    match (&lower.article_ref, &higher.article_ref) {
        (Some(a), Some(b)) if !a.is_empty() && a == b => true,
        _ => judge.contradicts(lower, higher),
    }
}

/// Rule 3 — a lower-rank document must not stand as an assertion's sole
/// primary evidence when a higher-rank item covering the same point is
/// sitting in that facet's pack.
fn check_hierarchy(
    draft: &[DraftSection],
    packs: &BTreeMap<String, EvidencePack>,
    judge: &dyn ContradictionJudge,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for section in draft {
        let Some(pack) = packs.get(section.facet.sub_question_id()) else {
            continue;
        };
        for (i, assertion) in section.assertions.iter().enumerate() {
            // Only sole-primary citations are in scope for this rule.
            if assertion.evidence_ids.len() != 1 {
                continue;
            }
            let Some(cited) = pack.resolve(&assertion.evidence_ids[0]) else {
                continue;
            };
            let overriding = pack.items.iter().find(|candidate| {
                candidate.document_type.rank() < cited.document_type.rank()
                    && covers_same_point(cited, candidate, judge)
            });
            if let Some(higher) = overriding {
                violations.push(Violation {
                    rule: RuleKind::HierarchyViolation,
                    facet: section.facet,
                    detail: format!(
                        "`{}` ({}) cited as sole evidence while higher-rank `{}` ({}) covers the same point",
                        cited.id, cited.document_type, higher.id, higher.document_type
                    ),
                    affected_assertion_ids: vec![section.assertion_id(i)],
                });
            }
        }
    }
    violations
}

/// Rule 4 — contradictory items cited within one facet must be addressed
/// by an assertion citing both; otherwise the conflict is unresolved.
fn check_source_conflict(
    draft: &[DraftSection],
    packs: &BTreeMap<String, EvidencePack>,
    judge: &dyn ContradictionJudge,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for section in draft {
        // Every item cited anywhere in this facet, in citation order.
        let mut cited: Vec<&EvidenceItem> = Vec::new();
        for assertion in &section.assertions {
            for id in &assertion.evidence_ids {
                if let Some(item) = resolve_in(packs, id) {
                    if !cited.iter().any(|c| c.id == item.id) {
                        cited.push(item);
                    }
                }
            }
        }

        for (ai, a) in cited.iter().enumerate() {
            for b in cited.iter().skip(ai + 1) {
                if !judge.contradicts(a, b) {
                    continue;
                }
                let addressed = section.assertions.iter().any(|assertion| {
                    assertion.evidence_ids.contains(&a.id)
                        && assertion.evidence_ids.contains(&b.id)
                });
                if !addressed {
                    violations.push(Violation {
                        rule: RuleKind::UnresolvedConflict,
                        facet: section.facet,
                        detail: format!(
                            "`{}` and `{}` materially disagree and no assertion reconciles them",
                            a.id, b.id
                        ),
                        affected_assertion_ids: Vec::new(),
                    });
                }
            }
        }
    }
    violations
}

/// Rule 5 — assertion text must be substantively derivable from the
/// quotes of its cited items.
fn check_unsupported_inference(
    draft: &[DraftSection],
    packs: &BTreeMap<String, EvidencePack>,
    judge: &dyn EntailmentJudge,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    for section in draft {
        for (i, assertion) in section.assertions.iter().enumerate() {
            let quotes: Vec<&str> = assertion
                .evidence_ids
                .iter()
                .filter_map(|id| resolve_in(packs, id))
                .map(|item| item.quote.as_str())
                .collect();
            // Rule 1 already covers assertions with nothing resolvable.
            if quotes.is_empty() {
                continue;
            }
            if !judge.supports(&assertion.text, &quotes) {
                violations.push(Violation {
                    rule: RuleKind::UnsupportedInference,
                    facet: section.facet,
                    detail: "assertion text is not derivable from its cited quotes".to_string(),
                    affected_assertion_ids: vec![section.assertion_id(i)],
                });
            }
        }
    }
    violations
}

/// Derive the refinement directive: one query per distinct
/// `(facet, rule)` pair in violation order, and filter overrides per
/// rule kind.
fn build_directive(
    violations: &[Violation],
    packs: &BTreeMap<String, EvidencePack>,
) -> RefinementDirective {
    let mut directive = RefinementDirective::default();
    let mut seen: Vec<(Facet, RuleKind)> = Vec::new();

    for v in violations {
        if seen.contains(&(v.facet, v.rule)) {
            continue;
        }
        seen.push((v.facet, v.rule));

        let query = match v.rule {
            RuleKind::MissingCitation => {
                "specific legal provisions with exact article and clause numbers".to_string()
            }
            RuleKind::StaleAuthority => {
                "currently effective replacement documents and amendments".to_string()
            }
            RuleKind::HierarchyViolation => {
                "the governing higher-rank document for this requirement".to_string()
            }
            RuleKind::UnresolvedConflict => {
                "the provision reconciling the conflicting requirements".to_string()
            }
            RuleKind::UnsupportedInference => {
                "verbatim provisions directly supporting the drafted claims".to_string()
            }
        };
        directive.missing_queries.push(FacetQuery {
            facet: v.facet,
            query,
        });

        let overrides = directive.new_filters.entry(v.facet).or_default();
        match v.rule {
            RuleKind::StaleAuthority => {
                overrides.insert("effective_only".to_string(), "true".to_string());
            }
            RuleKind::HierarchyViolation => {
                let preferred = highest_rank_in_facet(packs, v.facet)
                    .unwrap_or(DocumentType::LawOrResolution);
                overrides.insert(
                    "prefer_document_type".to_string(),
                    preferred.to_string(),
                );
            }
            RuleKind::MissingCitation | RuleKind::UnsupportedInference => {
                overrides.insert("top_k".to_string(), "15".to_string());
            }
            // Conflict resolution needs a better query, not different filters.
            RuleKind::UnresolvedConflict => {}
        }
    }
    directive
}

fn highest_rank_in_facet(
    packs: &BTreeMap<String, EvidencePack>,
    facet: Facet,
) -> Option<DocumentType> {
    packs
        .get(facet.sub_question_id())?
        .items
        .iter()
        .map(|item| item.document_type)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::Assertion;
    use crate::item::ArticleRef;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(id: &str, quote: &str, ty: DocumentType) -> EvidenceItem {
        EvidenceItem::new(id, quote, format!("Doc for {id}"), ty).unwrap()
    }

    fn packs_for(facet: Facet, items: Vec<EvidenceItem>) -> BTreeMap<String, EvidencePack> {
        let mut packs = BTreeMap::new();
        packs.insert(
            facet.sub_question_id().to_string(),
            EvidencePack::new(facet.sub_question_id(), items, Default::default()),
        );
        packs
    }

    fn draft_with(facet: Facet, assertions: Vec<Assertion>) -> Vec<DraftSection> {
        vec![DraftSection::new(facet, assertions)]
    }

    #[test]
    fn test_passing_draft_has_no_directive() {
        let quote = "The mining licence duration must not exceed thirty years total";
        let packs = packs_for(
            Facet::Conditions,
            vec![item("e1", quote, DocumentType::LawOrResolution)],
        );
        let draft = draft_with(
            Facet::Conditions,
            vec![Assertion::new(
                "The mining licence duration must not exceed thirty years",
                vec!["e1".into()],
            )],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(verdict.passed, "violations: {:?}", verdict.violations);
        assert!(verdict.refinement_directive.is_none());
    }

    #[test]
    fn test_missing_citation_on_empty_evidence_ids() {
        // Scenario B: an assertion citing zero evidence ids.
        let packs = packs_for(
            Facet::Conditions,
            vec![item("e1", "The licence conditions quote", DocumentType::Decree)],
        );
        let draft = draft_with(
            Facet::Conditions,
            vec![Assertion::new("Unsupported claim", vec![])],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(!verdict.passed);
        assert!(verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::MissingCitation
                && v.affected_assertion_ids == vec!["conditions:0"]));
        assert!(verdict.refinement_directive.is_some());
    }

    #[test]
    fn test_missing_citation_on_unresolvable_id() {
        let packs = packs_for(Facet::Authority, vec![]);
        let draft = draft_with(
            Facet::Authority,
            vec![Assertion::new("claim", vec!["ghost".into()])],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::MissingCitation && v.detail.contains("ghost")));
    }

    #[test]
    fn test_empty_section_is_missing_citation() {
        let packs = packs_for(Facet::Documentation, vec![]);
        let draft = draft_with(Facet::Documentation, vec![]);
        let verdict = Critic::default().review(&draft, &packs);
        assert!(verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::MissingCitation && v.facet == Facet::Documentation));
    }

    #[test]
    fn test_stale_authority_on_expired_primary() {
        // Scenario A: expiry 2020-01-01, as_of 2024-01-01, item is the
        // assertion's primary citation.
        let mut expired = item(
            "old",
            "The licensing authority for mineral extraction permits",
            DocumentType::LawOrResolution,
        )
        .with_effective_date(date(2006, 1, 1))
        .with_expiry_date(date(2020, 1, 1));
        expired.refresh_validity(date(2024, 1, 1));

        let packs = packs_for(Facet::Authority, vec![expired]);
        let draft = draft_with(
            Facet::Authority,
            vec![Assertion::new(
                "The licensing authority for mineral extraction permits",
                vec!["old".into()],
            )],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(!verdict.passed);
        assert!(verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::StaleAuthority && v.facet == Facet::Authority));
    }

    #[test]
    fn test_stale_authority_ignores_non_primary_expired() {
        let mut expired = item("old", "superseded older provision text", DocumentType::Decree)
            .with_expiry_date(date(2020, 1, 1));
        expired.refresh_validity(date(2024, 1, 1));
        let mut active = item(
            "new",
            "the current provision text on licence conditions",
            DocumentType::Decree,
        )
        .with_effective_date(date(2021, 1, 1));
        active.refresh_validity(date(2024, 1, 1));

        let packs = packs_for(Facet::Conditions, vec![active, expired]);
        let draft = draft_with(
            Facet::Conditions,
            vec![Assertion::new(
                "the current provision text on licence conditions",
                vec!["new".into(), "old".into()],
            )],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(!verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::StaleAuthority));
    }

    #[test]
    fn test_hierarchy_violation_sole_lower_rank_primary() {
        let locator = ArticleRef::article(54);
        let law = item(
            "law",
            "licence duration thirty years per extraction project",
            DocumentType::LawOrResolution,
        )
        .with_article_ref(locator.clone());
        let letter = item(
            "letter",
            "licence duration thirty years per extraction project",
            DocumentType::OfficialLetter,
        )
        .with_article_ref(locator);

        let packs = packs_for(Facet::Conditions, vec![law, letter]);
        let draft = draft_with(
            Facet::Conditions,
            vec![Assertion::new(
                "licence duration thirty years per extraction project",
                vec!["letter".into()],
            )],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::HierarchyViolation));
        // Directive prefers the highest rank present in the facet pack.
        let directive = verdict.refinement_directive.unwrap();
        assert_eq!(
            directive.new_filters[&Facet::Conditions]["prefer_document_type"],
            "law_or_resolution"
        );
    }

    #[test]
    fn test_hierarchy_ok_when_higher_rank_also_cited() {
        let locator = ArticleRef::article(54);
        let law = item(
            "law",
            "licence duration thirty years per extraction project",
            DocumentType::LawOrResolution,
        )
        .with_article_ref(locator.clone());
        let letter = item(
            "letter",
            "licence duration thirty years per extraction project",
            DocumentType::OfficialLetter,
        )
        .with_article_ref(locator);

        let packs = packs_for(Facet::Conditions, vec![law, letter]);
        let draft = draft_with(
            Facet::Conditions,
            vec![Assertion::new(
                "licence duration thirty years per extraction project",
                vec!["letter".into(), "law".into()],
            )],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(!verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::HierarchyViolation));
    }

    #[test]
    fn test_unresolved_conflict_flagged_and_cleared_by_reconciling_assertion() {
        let locator = ArticleRef::article(70);
        let permits = item(
            "permits",
            "household mining extraction is permitted within licensed areas",
            DocumentType::Decree,
        )
        .with_article_ref(locator.clone());
        let forbids = item(
            "forbids",
            "household mining extraction is not permitted within licensed areas",
            DocumentType::Decree,
        )
        .with_article_ref(locator);

        let packs = packs_for(Facet::Conditions, vec![permits, forbids]);

        // Two assertions cite the conflicting items separately.
        let draft = draft_with(
            Facet::Conditions,
            vec![
                Assertion::new(
                    "household mining extraction is permitted within licensed areas",
                    vec!["permits".into()],
                ),
                Assertion::new(
                    "household mining extraction is not permitted within licensed areas",
                    vec!["forbids".into()],
                ),
            ],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::UnresolvedConflict));

        // An assertion citing both items addresses the conflict.
        let reconciled = draft_with(
            Facet::Conditions,
            vec![Assertion::new(
                "household mining extraction is permitted within licensed areas although earlier text says not permitted",
                vec!["permits".into(), "forbids".into()],
            )],
        );
        let verdict = Critic::default().review(&reconciled, &packs);
        assert!(!verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::UnresolvedConflict));
    }

    #[test]
    fn test_unsupported_inference() {
        let packs = packs_for(
            Facet::ProcessingTime,
            vec![item(
                "e1",
                "the application dossier includes a map of the extraction area",
                DocumentType::Circular,
            )],
        );
        let draft = draft_with(
            Facet::ProcessingTime,
            vec![Assertion::new(
                "processing takes ninety days from submission until final approval decision",
                vec!["e1".into()],
            )],
        );
        let verdict = Critic::default().review(&draft, &packs);
        assert!(verdict
            .violations
            .iter()
            .any(|v| v.rule == RuleKind::UnsupportedInference));
    }

    #[test]
    fn test_directive_one_query_per_facet_rule_pair() {
        // Scenario D shape: StaleAuthority on Authority only.
        let mut expired = item(
            "old",
            "the provincial committee issues extraction licences",
            DocumentType::Decree,
        )
        .with_expiry_date(date(2020, 1, 1));
        expired.refresh_validity(date(2024, 1, 1));

        let packs = packs_for(Facet::Authority, vec![expired]);
        let draft = draft_with(
            Facet::Authority,
            vec![
                Assertion::new(
                    "the provincial committee issues extraction licences",
                    vec!["old".into()],
                ),
                Assertion::new(
                    "the provincial committee issues extraction licences",
                    vec!["old".into()],
                ),
            ],
        );
        let verdict = Critic::default().review(&draft, &packs);
        let directive = verdict.refinement_directive.unwrap();
        let stale_queries: Vec<_> = directive
            .missing_queries
            .iter()
            .filter(|q| q.facet == Facet::Authority)
            .collect();
        // Two violations of the same (facet, rule) collapse into one query.
        assert_eq!(stale_queries.len(), 1);
        assert_eq!(
            directive.new_filters[&Facet::Authority]["effective_only"],
            "true"
        );
    }

    #[test]
    fn test_verdict_aggregates_all_rules_not_just_first() {
        let mut expired = item(
            "old",
            "the old licensing provision text here",
            DocumentType::Decree,
        )
        .with_expiry_date(date(2020, 1, 1));
        expired.refresh_validity(date(2024, 1, 1));

        let packs = packs_for(Facet::Conditions, vec![expired]);
        let draft = draft_with(
            Facet::Conditions,
            vec![
                Assertion::new("no citation here", vec![]),
                Assertion::new("the old licensing provision text here", vec!["old".into()]),
            ],
        );
        let verdict = Critic::default().review(&draft, &packs);
        let kinds: Vec<_> = verdict.violations.iter().map(|v| v.rule).collect();
        assert!(kinds.contains(&RuleKind::MissingCitation));
        assert!(kinds.contains(&RuleKind::StaleAuthority));
    }

    #[test]
    fn test_lexical_judge_entailment() {
        let judge = LexicalJudge::default();
        assert!(judge.supports(
            "licence duration must not exceed thirty years",
            &["the licence duration must not exceed thirty years in total"],
        ));
        assert!(!judge.supports(
            "processing takes ninety days",
            &["the dossier includes a topographic map"],
        ));
        assert!(!judge.supports("anything", &[]));
    }

    #[test]
    fn test_verdict_serde_roundtrip() {
        let verdict = CriticVerdict {
            passed: false,
            violations: vec![Violation {
                rule: RuleKind::StaleAuthority,
                facet: Facet::Authority,
                detail: "expired".into(),
                affected_assertion_ids: vec!["authority:0".into()],
            }],
            refinement_directive: Some(RefinementDirective {
                missing_queries: vec![FacetQuery {
                    facet: Facet::Authority,
                    query: "replacement documents".into(),
                }],
                new_filters: BTreeMap::new(),
            }),
        };
        let json = serde_json::to_string(&verdict).unwrap();
        let restored: CriticVerdict = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, verdict);
    }
}
