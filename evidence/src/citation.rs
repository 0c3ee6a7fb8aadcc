//! Canonical citation serialization and its best-effort inverse.
//!
//! The canonical form is a pointer, not the source:
//! `<DocumentTitle>–<Locator>–<IssuingAuthority>–<IssuedDate>–<ValidityStatus>`
//! (en-dash separated). The quote is intentionally not recoverable from
//! it. [`parse_citation`] exists for round-trip assertions in tests.

use chrono::NaiveDate;
use regex::Regex;

use crate::item::{ArticleRef, EvidenceItem, ValidityStatus};

/// Field separator. Titles may contain en dashes; the trailing four
/// segments never do, so parsing splits from the right.
const SEPARATOR: char = '–';

/// Placeholder for an absent article locator.
const NO_LOCATOR: &str = "General";
/// Placeholder for an absent issuing authority.
const NO_AUTHORITY: &str = "Unknown";
/// Placeholder for an absent issued date.
const NO_DATE: &str = "n.d.";

/// Serialize an item into its canonical citation string.
///
/// Deterministic and total for any validated [`EvidenceItem`].
pub fn format_citation(item: &EvidenceItem) -> String {
    let locator = match &item.article_ref {
        Some(r) if !r.is_empty() => r.to_string(),
        _ => NO_LOCATOR.to_string(),
    };
    let authority = item
        .issuing_authority
        .as_deref()
        .unwrap_or(NO_AUTHORITY)
        .to_string();
    let issued = item
        .issued_date
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NO_DATE.to_string());

    format!(
        "{}{sep}{}{sep}{}{sep}{}{sep}{}",
        item.document_title,
        locator,
        authority,
        issued,
        item.validity_status,
        sep = SEPARATOR,
    )
}

/// The fields a citation string can give back. The quote is lost by
/// design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCitation {
    pub document_title: String,
    pub article_ref: Option<ArticleRef>,
    pub issuing_authority: Option<String>,
    pub issued_date: Option<NaiveDate>,
    pub validity_status: ValidityStatus,
}

/// Best-effort inverse of [`format_citation`]. Returns `None` when the
/// string does not have the canonical five-segment shape.
pub fn parse_citation(citation: &str) -> Option<ParsedCitation> {
    // rsplitn yields segments right-to-left; the remainder is the title.
    let mut parts = citation.rsplitn(5, SEPARATOR);
    let status = parts.next()?;
    let issued = parts.next()?;
    let authority = parts.next()?;
    let locator = parts.next()?;
    let title = parts.next()?;
    if title.is_empty() {
        return None;
    }

    let validity_status = status.parse::<ValidityStatus>().ok()?;
    let issued_date = if issued == NO_DATE {
        None
    } else {
        Some(NaiveDate::parse_from_str(issued, "%Y-%m-%d").ok()?)
    };
    let issuing_authority = if authority == NO_AUTHORITY {
        None
    } else {
        Some(authority.to_string())
    };
    let article_ref = if locator == NO_LOCATOR {
        None
    } else {
        Some(parse_locator(locator)?)
    };

    Some(ParsedCitation {
        document_title: title.to_string(),
        article_ref,
        issuing_authority,
        issued_date,
        validity_status,
    })
}

fn parse_locator(locator: &str) -> Option<ArticleRef> {
    let re = Regex::new(
        r"^(?:Article (?P<article>\d+))?(?:, )?(?:Clause (?P<clause>\d+))?(?:, )?(?:Point (?P<point>[A-Za-z0-9]+))?$",
    )
    .expect("locator pattern is valid");
    let caps = re.captures(locator)?;
    let parsed = ArticleRef {
        article: caps.name("article").and_then(|m| m.as_str().parse().ok()),
        clause: caps.name("clause").and_then(|m| m.as_str().parse().ok()),
        point: caps.name("point").map(|m| m.as_str().to_string()),
    };
    if parsed.is_empty() {
        None
    } else {
        Some(parsed)
    }
}
