//! Evidence model — typed records for retrieved legal material.
//!
//! An [`EvidenceItem`] is one fact-bearing quote from a legal document,
//! normalized out of whatever the retrieval backend returned. Validity is
//! always derived from the item's own dates against a caller-supplied
//! `as_of` date via [`EvidenceItem::compute_validity`] — it is never
//! trusted from the backend and never cached across runs.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when an evidence item fails construction-time validation.
///
/// Local and non-retryable — malformed evidence is surfaced immediately
/// rather than routed through the refinement loop.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("evidence item has an empty id")]
    EmptyId,
    #[error("evidence item `{id}` has an empty quote")]
    EmptyQuote { id: String },
    #[error("evidence item `{id}` has an empty document title")]
    EmptyTitle { id: String },
}

/// Legal document types, ordered by precedence (highest first).
///
/// The derived `Ord` follows declaration order, so a lower `rank()`
/// means higher legal authority. Laws and National Assembly resolutions
/// share the top rank.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Laws and National Assembly resolutions (QH / NQ).
    LawOrResolution,
    /// Government decrees (ND-CP).
    Decree,
    /// Ministry circulars (TT).
    Circular,
    /// Decisions (QD).
    Decision,
    /// Official letters (CV) — lowest precedence, also the fallback for
    /// document ids that match no known suffix.
    OfficialLetter,
}

impl DocumentType {
    /// Precedence rank: 0 is the highest legal authority.
    pub fn rank(self) -> u8 {
        match self {
            Self::LawOrResolution => 0,
            Self::Decree => 1,
            Self::Circular => 2,
            Self::Decision => 3,
            Self::OfficialLetter => 4,
        }
    }

    /// Infer the document type from a Vietnamese document id or title
    /// (e.g. `60/2010/QH12` → law, `15/2012/ND-CP` → decree).
    ///
    /// Unknown suffixes fall back to [`DocumentType::OfficialLetter`] so
    /// unrecognized material never outranks recognized authority.
    pub fn detect(id_or_title: &str) -> Self {
        let upper = id_or_title.to_uppercase();
        if upper.contains("QH") || upper.contains("NQ-") {
            Self::LawOrResolution
        } else if upper.contains("ND-CP") || upper.contains("NĐ-CP") {
            Self::Decree
        } else if upper.contains("TT-") {
            Self::Circular
        } else if upper.contains("QD-") || upper.contains("QĐ-") {
            Self::Decision
        } else {
            Self::OfficialLetter
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LawOrResolution => write!(f, "law_or_resolution"),
            Self::Decree => write!(f, "decree"),
            Self::Circular => write!(f, "circular"),
            Self::Decision => write!(f, "decision"),
            Self::OfficialLetter => write!(f, "official_letter"),
        }
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "law_or_resolution" => Ok(Self::LawOrResolution),
            "decree" => Ok(Self::Decree),
            "circular" => Ok(Self::Circular),
            "decision" => Ok(Self::Decision),
            "official_letter" => Ok(Self::OfficialLetter),
            other => Err(format!("unknown document type `{other}`")),
        }
    }
}

/// Derived validity of a document relative to a reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityStatus {
    /// In force as of the reference date.
    Active,
    /// Expiry date has passed the reference date.
    Expired,
    /// Replaced by a newer document (reported by the backend).
    Superseded,
    /// Effective date absent or not yet reached — cannot be established.
    Unknown,
}

impl fmt::Display for ValidityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Expired => write!(f, "expired"),
            Self::Superseded => write!(f, "superseded"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for ValidityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "superseded" => Ok(Self::Superseded),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown validity status `{other}`")),
        }
    }
}

/// Structured article/clause/point locator within a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleRef {
    pub article: Option<u32>,
    pub clause: Option<u32>,
    pub point: Option<String>,
}

impl ArticleRef {
    pub fn article(article: u32) -> Self {
        Self {
            article: Some(article),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.article.is_none() && self.clause.is_none() && self.point.is_none()
    }
}

impl fmt::Display for ArticleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(a) = self.article {
            parts.push(format!("Article {a}"));
        }
        if let Some(c) = self.clause {
            parts.push(format!("Clause {c}"));
        }
        if let Some(p) = &self.point {
            parts.push(format!("Point {p}"));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// One retrieved fact-bearing quote with its legal metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Unique identifier, stable across retries (backend chunk id).
    pub id: String,
    /// Verbatim excerpt text.
    pub quote: String,
    pub document_title: String,
    pub issuing_authority: Option<String>,
    pub document_type: DocumentType,
    /// Article/clause/point locator, when the backend exposes one.
    pub article_ref: Option<ArticleRef>,
    pub issued_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    /// Replacement document id, when the backend reports supersession.
    pub superseded_by: Option<String>,
    /// Relevance score reported by the backend. Informational only.
    pub similarity: Option<f64>,
    /// Derived status — recomputed at pack-assembly time, never trusted
    /// from the source backend.
    pub validity_status: ValidityStatus,
}

impl EvidenceItem {
    /// Construct a validated item. Optional metadata starts absent; use
    /// the `with_*` builders to attach what the backend actually mapped.
    pub fn new(
        id: impl Into<String>,
        quote: impl Into<String>,
        document_title: impl Into<String>,
        document_type: DocumentType,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        let quote = quote.into();
        let document_title = document_title.into();

        if id.trim().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if quote.trim().is_empty() {
            return Err(ValidationError::EmptyQuote { id });
        }
        if document_title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle { id });
        }

        Ok(Self {
            id,
            quote,
            document_title,
            issuing_authority: None,
            document_type,
            article_ref: None,
            issued_date: None,
            effective_date: None,
            expiry_date: None,
            superseded_by: None,
            similarity: None,
            validity_status: ValidityStatus::Unknown,
        })
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.issuing_authority = Some(authority.into());
        self
    }

    pub fn with_article_ref(mut self, article_ref: ArticleRef) -> Self {
        self.article_ref = Some(article_ref);
        self
    }

    pub fn with_issued_date(mut self, date: NaiveDate) -> Self {
        self.issued_date = Some(date);
        self
    }

    pub fn with_effective_date(mut self, date: NaiveDate) -> Self {
        self.effective_date = Some(date);
        self
    }

    pub fn with_expiry_date(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }

    pub fn with_superseded_by(mut self, replacement: impl Into<String>) -> Self {
        self.superseded_by = Some(replacement.into());
        self
    }

    pub fn with_similarity(mut self, score: f64) -> Self {
        self.similarity = Some(score);
        self
    }

    /// Derive this item's validity relative to `as_of`. Pure — no side
    /// effects, no clock access.
    ///
    /// Precedence: expiry beats everything (once expired, an item never
    /// reverts to active for any later `as_of`), supersession beats the
    /// effective-date check, and an absent or future effective date means
    /// validity cannot be established.
    pub fn compute_validity(&self, as_of: NaiveDate) -> ValidityStatus {
        if let Some(expiry) = self.expiry_date {
            if expiry <= as_of {
                return ValidityStatus::Expired;
            }
        }
        if self.superseded_by.is_some() {
            return ValidityStatus::Superseded;
        }
        match self.effective_date {
            Some(effective) if effective <= as_of => ValidityStatus::Active,
            _ => ValidityStatus::Unknown,
        }
    }

    /// Recompute and store the derived status. Called once per item at
    /// pack-assembly time with the run's `as_of_date`.
    pub fn refresh_validity(&mut self, as_of: NaiveDate) {
        self.validity_status = self.compute_validity(as_of);
    }
}

/// Extract a Vietnamese legal document id (`NN/YYYY/BODY`) out of a
/// document name or citation text, e.g. `"Law No. 60/2010/QH12"` →
/// `"60/2010/QH12"`.
pub fn extract_document_id(document_name: &str) -> Option<String> {
    // Suffix alternatives cover laws, decrees, circulars, resolutions,
    // decisions and official letters.
    static PATTERN: &str =
        r"(\d+/\d{4}/(?:QH\d+|N[DĐ]-CP|TT-[A-Z]+|NQ-[A-Z0-9]+|Q[DĐ]-[A-Z]+|CV-[A-Z]+))";
    let re = regex::Regex::new(PATTERN).expect("document id pattern is valid");
    re.captures(&document_name.to_uppercase())
        .map(|c| c[1].to_string())
}
