//! Deterministic domain core for the counsel research loop.
//!
//! Everything in this crate is pure data plus pure functions: the evidence
//! model with legal-validity semantics, the canonical citation formatter,
//! the draft/report types, and the five critic rules that gate a draft
//! before it may be synthesized. No I/O and no async — the agents crate
//! owns all backend calls and feeds immutable snapshots in.

pub mod citation;
pub mod critic;
pub mod draft;
pub mod item;
pub mod pack;
pub mod report;

pub use citation::{format_citation, parse_citation, ParsedCitation};
pub use critic::{
    Critic, CriticVerdict, ContradictionJudge, EntailmentJudge, FacetQuery, LexicalJudge,
    RefinementDirective, RuleKind, Violation,
};
pub use draft::{in_facet_order, Assertion, DraftSection, Facet};
pub use item::{
    extract_document_id, ArticleRef, DocumentType, EvidenceItem, ValidationError, ValidityStatus,
};
pub use pack::{resolve_in, EvidencePack, RetrievalFilters, MIN_ACCEPTABLE_ITEMS};
pub use report::{build_references, Reference, Report};
