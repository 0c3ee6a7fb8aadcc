//! Analyzer — drafts one evidence-grounded section per facet.
//!
//! Each section is produced from exactly the facet's evidence pack; a
//! backend failure degrades that facet to an empty section, which the
//! citation-coverage gate then flags.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use evidence::{format_citation, DraftSection, EvidencePack, Facet};

use crate::completion::{AgentRole, CompletionBackend};
use crate::contracts::parse_section_response;
use crate::prompts::ANALYZER_PREAMBLE;

pub struct Analyzer {
    backend: Arc<dyn CompletionBackend>,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Draft every facet's section from the round's packs.
    pub async fn draft(
        &self,
        question: &str,
        packs: &BTreeMap<String, EvidencePack>,
    ) -> Vec<DraftSection> {
        let mut sections = Vec::with_capacity(Facet::ALL.len());
        for facet in Facet::ALL {
            sections.push(self.draft_section(question, facet, packs).await);
        }
        sections
    }

    async fn draft_section(
        &self,
        question: &str,
        facet: Facet,
        packs: &BTreeMap<String, EvidencePack>,
    ) -> DraftSection {
        let Some(pack) = packs.get(facet.sub_question_id()) else {
            return DraftSection::empty(facet);
        };
        if pack.items.is_empty() {
            return DraftSection::empty(facet);
        }

        let prompt = Self::build_prompt(question, facet, pack);
        match self
            .backend
            .complete(AgentRole::Analyzer, ANALYZER_PREAMBLE, &prompt)
            .await
        {
            Ok(raw) => parse_section_response(&raw, facet, packs),
            Err(e) => {
                warn!(%facet, error = %e, "Analyzer backend failed, emitting empty section");
                DraftSection::empty(facet)
            }
        }
    }

    fn build_prompt(question: &str, facet: Facet, pack: &EvidencePack) -> String {
        let mut prompt = format!(
            "Research question: {question}\nSection: {}\n\nEvidence:\n",
            facet.title()
        );
        for item in &pack.items {
            prompt.push_str(&format!(
                "[{}] {}\n{}\n\n",
                item.id,
                format_citation(item),
                item.quote
            ));
        }
        prompt
    }
}
