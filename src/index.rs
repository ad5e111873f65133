//! # Search Index Module
//!
//! ## Purpose
//! The denormalized search projection and its relevance scoring. Each
//! primary row owns exactly one `SearchDoc` in its family's index tree; the
//! store writes both in one transaction, and the query engine scores these
//! documents directly, so ranking behavior is explicit and testable rather
//! than delegated to a database engine.
//!
//! ## Input/Output Specification
//! - **Input**: Primary records at upsert time, query terms at search time
//! - **Output**: Scored matches with a short matched-text excerpt
//! - **Ranking**: Field-weighted term frequency, length-damped body score

use crate::{Family, LegalSection, RuleDocument};
use serde::{Deserialize, Serialize};

const IDENTIFIER_WEIGHT: f32 = 5.0;
const NAME_WEIGHT: f32 = 3.0;

/// Denormalized projection of one primary row's searchable fields. Never
/// authoritative; rebuilt wholesale on every upsert of its primary row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchDoc {
    pub family: Family,
    /// Primary key in the family's tree (citation or `SET/number`)
    pub key: String,
    /// Human-readable identifier, e.g. `RCW 9A.36.011` or `CRLJ 1.1`
    pub display: String,
    /// Display name(s), when the source carried them
    pub name: Option<String>,
    /// Full normalized body text
    pub text: String,
}

impl SearchDoc {
    pub fn from_section(family: Family, section: &LegalSection) -> Self {
        let name = [
            section.section_name.clone(),
            section.chapter_name.clone(),
            section.title_name.clone(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");
        Self {
            family,
            key: section.citation.clone(),
            display: format!("{} {}", family.tag(), section.citation),
            name: if name.is_empty() { None } else { Some(name) },
            text: section.full_text.clone(),
        }
    }

    pub fn from_rule(rule: &RuleDocument) -> Self {
        Self {
            family: Family::CourtRules,
            key: rule.key(),
            display: format!("{} {}", rule.rule_set.tag(), rule.rule_number),
            name: rule.rule_name.clone(),
            text: rule.full_text.clone(),
        }
    }
}

/// Lowercased query terms; punctuation-only fragments are dropped.
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_alphanumeric() || *c == '.')
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Relevance of a document for the given terms. Identifier hits dominate,
/// name hits outrank body hits, and the body contribution is damped by
/// document length so short rules do not drown under long statutes.
pub fn score(doc: &SearchDoc, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let display = doc.display.to_lowercase();
    let name = doc.name.as_deref().unwrap_or("").to_lowercase();
    let body = doc.text.to_lowercase();
    let length_damp = 1.0 + (1.0 + doc.text.split_whitespace().count() as f32).ln();

    let mut total = 0.0;
    for term in terms {
        if display.contains(term.as_str()) {
            total += IDENTIFIER_WEIGHT;
        }
        total += name.matches(term.as_str()).count() as f32 * NAME_WEIGHT;
        total += body.matches(term.as_str()).count() as f32 / length_damp;
    }
    total
}

/// Short excerpt centered on the first term occurrence, `width` characters
/// wide, safe on UTF-8 boundaries. Falls back to the document head when no
/// term occurs in the body.
pub fn excerpt(text: &str, terms: &[String], width: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let lower: String = text.to_lowercase();

    let hit = terms
        .iter()
        .filter_map(|t| lower.find(t.as_str()))
        .min()
        .map(|byte_pos| lower[..byte_pos].chars().count())
        .unwrap_or(0);

    let start = hit.saturating_sub(width / 4).min(chars.len());
    let end = (start + width).min(chars.len());
    let mut out: String = chars[start..end].iter().collect();
    if start > 0 {
        out = format!("...{}", out.trim_start());
    }
    if end < chars.len() {
        out = format!("{}...", out.trim_end());
    }
    out
}
