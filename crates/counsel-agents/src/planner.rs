//! Planner — decomposes a research question into the four facet
//! sub-questions.
//!
//! Planning is deterministic: the same question with the same directive
//! always yields the same plan, so reruns of an audit log replay
//! identically.

use serde::{Deserialize, Serialize};
use tracing::info;

use evidence::{Facet, RefinementDirective, RetrievalFilters};

/// One sub-question in a research plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubQuestion {
    /// Stable id, equal to the facet's sub-question id.
    pub id: String,
    pub facet: Facet,
    pub query: String,
    pub filters: RetrievalFilters,
}

/// Deterministic query-template planner.
pub struct Planner {
    base_filters: RetrievalFilters,
}

impl Planner {
    pub fn new(base_filters: RetrievalFilters) -> Self {
        Self { base_filters }
    }

    /// Build the plan for `question`, applying refinement feedback from
    /// the previous iteration when present.
    ///
    /// Directive queries for a facet are appended to that facet's base
    /// query; filter overrides apply only to the facets they name.
    pub fn plan(
        &self,
        question: &str,
        directive: Option<&RefinementDirective>,
    ) -> Vec<SubQuestion> {
        let mut plan = Vec::with_capacity(Facet::ALL.len());
        for facet in Facet::ALL {
            let mut query = Self::base_query(question, facet);
            let mut filters = self.base_filters.clone();

            if let Some(directive) = directive {
                for fq in directive
                    .missing_queries
                    .iter()
                    .filter(|fq| fq.facet == facet)
                {
                    query.push_str("; ");
                    query.push_str(&fq.query);
                }
                if let Some(overrides) = directive.new_filters.get(&facet) {
                    filters.apply_overrides(overrides);
                }
            }

            plan.push(SubQuestion {
                id: facet.sub_question_id().to_string(),
                facet,
                query,
                filters,
            });
        }
        info!(
            question,
            refined = directive.is_some(),
            sub_questions = plan.len(),
            "Built research plan"
        );
        plan
    }

    fn base_query(question: &str, facet: Facet) -> String {
        match facet {
            Facet::Conditions => {
                format!("{question} — conditions and legal requirements")
            }
            Facet::Documentation => {
                format!("{question} — required dossier and documentation")
            }
            Facet::Authority => {
                format!("{question} — competent authority and licensing agency")
            }
            Facet::ProcessingTime => {
                format!("{question} — processing time limits and deadlines")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidence::FacetQuery;
    use std::collections::BTreeMap;

    const QUESTION: &str = "What are the requirements to open a pharmacy?";

    #[test]
    fn test_plan_covers_all_facets_in_order() {
        let planner = Planner::new(RetrievalFilters::default());
        let plan = planner.plan(QUESTION, None);
        let facets: Vec<Facet> = plan.iter().map(|sq| sq.facet).collect();
        assert_eq!(facets, Facet::ALL.to_vec());
        assert_eq!(plan[0].id, "conditions");
        assert_eq!(plan[3].id, "processing_time");
    }

    #[test]
    fn test_plan_is_deterministic() {
        let planner = Planner::new(RetrievalFilters::default());
        let a = serde_json::to_string(&planner.plan(QUESTION, None)).unwrap();
        let b = serde_json::to_string(&planner.plan(QUESTION, None)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_directive_extends_only_flagged_facet() {
        let planner = Planner::new(RetrievalFilters::default());
        let directive = RefinementDirective {
            missing_queries: vec![FacetQuery {
                facet: Facet::Authority,
                query: "issuing agency and its legal basis".to_string(),
            }],
            new_filters: BTreeMap::new(),
        };
        let plan = planner.plan(QUESTION, Some(&directive));
        let authority = plan.iter().find(|sq| sq.facet == Facet::Authority).unwrap();
        assert!(authority.query.contains("; issuing agency and its legal basis"));
        let conditions = plan.iter().find(|sq| sq.facet == Facet::Conditions).unwrap();
        assert!(!conditions.query.contains(';'));
    }

    #[test]
    fn test_directive_filter_overrides_scoped_per_facet() {
        let planner = Planner::new(RetrievalFilters::default());
        let mut new_filters = BTreeMap::new();
        let mut overrides = BTreeMap::new();
        overrides.insert("effective_only".to_string(), "true".to_string());
        new_filters.insert(Facet::Conditions, overrides);
        let directive = RefinementDirective {
            missing_queries: vec![],
            new_filters,
        };
        let plan = planner.plan(QUESTION, Some(&directive));
        let conditions = plan.iter().find(|sq| sq.facet == Facet::Conditions).unwrap();
        assert!(conditions.filters.effective_only);
        let authority = plan.iter().find(|sq| sq.facet == Facet::Authority).unwrap();
        assert!(!authority.filters.effective_only);
    }
}
