//! Synthesizer — turns a passed draft into the final cited report.
//!
//! Runs only after the critic passes. Rewrites assertion prose for
//! readability but never touches evidence bindings: every rewritten
//! assertion keeps exactly the evidence ids it had. If the rewrite
//! contract fails, the original text is kept verbatim — a passed draft
//! can never be lost to a flaky backend.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use evidence::{
    build_references, in_facet_order, DraftSection, EvidencePack, Report,
};

use crate::completion::{AgentRole, CompletionBackend};
use crate::contracts::parse_rewrite_response;
use crate::prompts::SYNTHESIZER_PREAMBLE;

pub struct Synthesizer {
    backend: Arc<dyn CompletionBackend>,
}

impl Synthesizer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    pub async fn synthesize(
        &self,
        question: &str,
        as_of: NaiveDate,
        sections: Vec<DraftSection>,
        packs: &BTreeMap<String, EvidencePack>,
    ) -> Report {
        let mut polished = Vec::with_capacity(sections.len());
        for section in in_facet_order(&sections) {
            polished.push(self.polish_section(question, section).await);
        }
        let references = build_references(&polished, packs);
        Report {
            question: question.to_string(),
            as_of_date: as_of,
            sections: polished,
            references,
        }
    }

    /// Rewrite one section's assertion texts, keeping evidence ids.
    /// Accepted only when the backend returns exactly one text per
    /// assertion; otherwise the section is returned unchanged.
    async fn polish_section(&self, question: &str, mut section: DraftSection) -> DraftSection {
        if section.assertions.is_empty() {
            return section;
        }
        let prompt = Self::build_prompt(question, &section);
        let raw = match self
            .backend
            .complete(AgentRole::Synthesizer, SYNTHESIZER_PREAMBLE, &prompt)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(facet = %section.facet, error = %e, "Synthesizer backend failed, keeping draft text");
                return section;
            }
        };
        match parse_rewrite_response(&raw) {
            Some(texts) if texts.len() == section.assertions.len() => {
                for (assertion, text) in section.assertions.iter_mut().zip(texts) {
                    assertion.text = text;
                }
                section
            }
            _ => {
                warn!(facet = %section.facet, "Synthesizer rewrite contract mismatch, keeping draft text");
                section
            }
        }
    }

    fn build_prompt(question: &str, section: &DraftSection) -> String {
        let mut prompt = format!(
            "Research question: {question}\nSection: {}\n\nAssertions to rewrite:\n",
            section.facet.title()
        );
        for (idx, assertion) in section.assertions.iter().enumerate() {
            prompt.push_str(&format!("{}. {}\n", idx + 1, assertion.text));
        }
        prompt
    }
}
