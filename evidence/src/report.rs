//! The final administrative-style report and its reference list.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::citation::format_citation;
use crate::draft::DraftSection;
use crate::item::DocumentType;
use crate::pack::{resolve_in, EvidencePack};

/// One entry in the "documents used" list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub document_title: String,
    pub document_type: DocumentType,
    pub issued_date: Option<NaiveDate>,
    pub citation: String,
}

/// The synthesized run output: sections in fixed facet order plus the
/// deduplicated reference list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub question: String,
    pub as_of_date: NaiveDate,
    pub sections: Vec<DraftSection>,
    pub references: Vec<Reference>,
}

impl Report {
    /// Render the report as a markdown brief for CLI output.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Legal Research Report\n\n");
        out.push_str(&format!("**Question:** {}\n\n", self.question));
        out.push_str(&format!("**As of:** {}\n\n", self.as_of_date));

        for section in &self.sections {
            out.push_str(&format!("## {}\n\n", section.facet.title()));
            for assertion in &section.assertions {
                let ids = assertion.evidence_ids.join(", ");
                out.push_str(&format!("- {} [{}]\n", assertion.text, ids));
            }
            out.push('\n');
        }

        out.push_str("## Documents Used\n\n");
        for reference in &self.references {
            out.push_str(&format!("- {}\n", reference.citation));
        }
        out
    }
}

/// Union every cited evidence item across the draft, dedupe by document
/// title, and sort by `(document_type rank, issued_date)`.
pub fn build_references(
    draft: &[DraftSection],
    packs: &BTreeMap<String, EvidencePack>,
) -> Vec<Reference> {
    let mut references: Vec<Reference> = Vec::new();
    for section in draft {
        for assertion in &section.assertions {
            for id in &assertion.evidence_ids {
                let Some(item) = resolve_in(packs, id) else {
                    continue;
                };
                if references
                    .iter()
                    .any(|r| r.document_title == item.document_title)
                {
                    continue;
                }
                references.push(Reference {
                    document_title: item.document_title.clone(),
                    document_type: item.document_type,
                    issued_date: item.issued_date,
                    citation: format_citation(item),
                });
            }
        }
    }
    references.sort_by(|a, b| {
        (a.document_type.rank(), a.issued_date).cmp(&(b.document_type.rank(), b.issued_date))
    });
    references
}
