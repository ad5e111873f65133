//! # Citation Normalization Module
//!
//! ## Purpose
//! Turns raw discovery artifacts — anchor hrefs, anchor text, PDF filenames —
//! into canonical hierarchical identifiers with a defined total order, and
//! deduplicates equivalent spellings onto one representation.
//!
//! ## Input/Output Specification
//! - **Input**: Anchor hrefs with `cite=` query parameters, anchor text shaped
//!   `"<RuleSet> <number> <name>"`, fixed-width PDF filenames
//! - **Output**: Canonical dotted citations and rule numbers, sort keys
//! - **Grammars**: Dotted hierarchical (statutes/admin code) and per-rule-set
//!   rule numbering (anchor-derived or filename-derived)
//!
//! ## Key Features
//! - Explicit, independently testable numbering grammar per family
//! - Stable first-wins deduplication on discovery order
//! - Integer-aware sort keys (chapter `9` sorts before `46`)

use crate::errors::{CorpusError, Result};
use crate::{RuleSet, SubPartStyle};
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

/// A parsed dotted citation, e.g. `9A.36.011`. The hierarchy is positional:
/// the first segment is the title, the first two segments the chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DottedCitation {
    /// Canonical form: segments joined with `.`
    pub citation: String,
    segments: Vec<String>,
}

impl DottedCitation {
    /// Parse a dotted citation. Segments are digits with an optional alpha
    /// suffix (`9A`, `36`, `011`); one to three segments are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let segments: Vec<&str> = trimmed.split('.').collect();
        if segments.is_empty() || segments.len() > 3 {
            return Err(CorpusError::Citation {
                raw: raw.to_string(),
                details: format!("expected 1-3 dotted segments, got {}", segments.len()),
            });
        }
        for seg in &segments {
            if seg.is_empty()
                || !seg.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false)
                || !seg.chars().all(|c| c.is_ascii_alphanumeric())
            {
                return Err(CorpusError::Citation {
                    raw: raw.to_string(),
                    details: format!("segment '{}' is not numeric with optional suffix", seg),
                });
            }
        }
        let segments: Vec<String> = segments.iter().map(|s| s.to_uppercase()).collect();
        Ok(Self {
            citation: segments.join("."),
            segments,
        })
    }

    /// Title component: the first segment.
    pub fn title(&self) -> &str {
        &self.segments[0]
    }

    /// Chapter component: the first two segments joined, or the title alone
    /// for a bare title citation.
    pub fn chapter(&self) -> String {
        self.segments
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Integer-aware sort key. Each segment compares by its numeric value
    /// first and its alpha suffix second, so `9A.4` sorts before `9A.36`.
    pub fn sort_key(&self) -> Vec<(u64, String)> {
        self.segments.iter().map(|s| segment_key(s)).collect()
    }
}

/// Split one citation segment into (numeric value, alpha suffix).
pub fn segment_key(segment: &str) -> (u64, String) {
    let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix: String = segment.chars().skip_while(|c| c.is_ascii_digit()).collect();
    (digits.parse().unwrap_or(0), suffix)
}

/// Compare two dotted citation strings in canonical numeric order. Unparsable
/// inputs fall back to plain string order so sorting never fails.
pub fn compare_dotted(a: &str, b: &str) -> Ordering {
    match (DottedCitation::parse(a), DottedCitation::parse(b)) {
        (Ok(ca), Ok(cb)) => ca.sort_key().cmp(&cb.sort_key()),
        _ => a.cmp(b),
    }
}

/// A normalized rule number within a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleNumber {
    pub major: u32,
    pub minor: u32,
    /// Zero means no sub-part
    pub sub: u32,
}

impl RuleNumber {
    /// Canonical string for this number under the given rule set's sub-part
    /// style. Sub-part zero never renders; both source spellings of a
    /// nonzero sub-part converge here.
    pub fn canonical(&self, set: RuleSet) -> String {
        if self.sub == 0 {
            return format!("{}.{}", self.major, self.minor);
        }
        match set.sub_part_style() {
            SubPartStyle::Decimal => format!("{}.{}.{}", self.major, self.minor, self.sub),
            SubPartStyle::Letter => {
                let letter = (b'a' + (self.sub as u8 - 1).min(25)) as char;
                format!("{}.{}{}", self.major, self.minor, letter)
            }
        }
    }
}

/// Sort key for a canonical rule number string: (major, minor, sub). Parses
/// both the decimal-extension and the letter-suffix spelling.
pub fn rule_sort_key(number: &str) -> (u64, u64, u64) {
    let mut parts = number.split('.');
    let major = parts
        .next()
        .map(|p| segment_key(p).0)
        .unwrap_or(0);
    let minor_raw = parts.next().unwrap_or("0");
    let (minor, letter) = segment_key(minor_raw);
    let sub_from_letter = letter
        .chars()
        .next()
        .map(|c| (c.to_ascii_lowercase() as u64).saturating_sub('a' as u64) + 1)
        .unwrap_or(0);
    let sub_from_decimal = parts.next().map(|p| segment_key(p).0).unwrap_or(0);
    (major, minor, sub_from_letter.max(sub_from_decimal))
}

/// The zero-sub-part fallback form for a bare rule number: `"4"` becomes
/// `"4.0"`. Returns `None` when the number already carries a fractional or
/// sub part, so the lookup fallback is applied at most once.
pub fn zero_sub_form(number: &str) -> Option<String> {
    if number.contains('.') {
        return None;
    }
    let (major, suffix) = segment_key(number);
    if major == 0 || !suffix.is_empty() {
        return None;
    }
    Some(format!("{}.0", major))
}

/// A raw discovery artifact paired with its canonical identifier and the URL
/// it resolves to. Produced by the normalizer, consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovered {
    /// Canonical identifier (dotted citation or rule number)
    pub id: String,
    /// Absolute or listing-relative URL of the item
    pub href: String,
    /// Display name carried by the anchor, when present
    pub name: Option<String>,
}

/// Citation normalizer holding the compiled discovery grammars.
pub struct CitationNormalizer {
    cite_param: Regex,
    rule_anchor: Regex,
    rule_filename: Regex,
}

impl Default for CitationNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl CitationNormalizer {
    pub fn new() -> Self {
        Self {
            // default.aspx?cite=9A.36.011 (possibly among other params)
            cite_param: Regex::new(r"(?i)[?&]cite=([0-9][0-9A-Za-z.]*)").unwrap(),
            // "CRLJ 4.1 Service of Summons" / "CR 56 - Summary Judgment"
            rule_anchor: Regex::new(
                r"(?i)^\s*([A-Z]{2,4})\s+(\d+(?:\.\d+){0,2}[a-z]?)\s*[-–—:]?\s*(.*?)\s*$",
            )
            .unwrap(),
            // crlj040102.pdf — lowercased set tag + three zero-padded fields
            rule_filename: Regex::new(r"(?i)([a-z]{2,4})(\d{2})(\d{2})(\d{2})\.pdf\s*$").unwrap(),
        }
    }

    /// Extract the dotted citation carried by an anchor href's `cite=`
    /// query parameter.
    pub fn citation_from_href(&self, href: &str) -> Option<DottedCitation> {
        let raw = self.cite_param.captures(href)?.get(1)?.as_str();
        DottedCitation::parse(raw).ok()
    }

    /// Parse structured anchor text of the form `"<RuleSet> <number> <name>"`.
    /// The number is re-canonicalized through the set's sub-part style so
    /// page-derived spellings converge with filename-derived ones.
    pub fn rule_from_anchor_text(&self, text: &str) -> Option<(RuleSet, String, Option<String>)> {
        let caps = self.rule_anchor.captures(text)?;
        let set = RuleSet::from_tag(caps.get(1)?.as_str())?;
        let number = self.canonicalize_rule_number(set, caps.get(2)?.as_str())?;
        let name = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());
        Some((set, number, name))
    }

    /// Parse a fixed-width PDF filename `<set><MM><mm><ss>.pdf` into its
    /// rule set and canonical rule number.
    pub fn rule_from_filename(&self, filename: &str) -> Option<(RuleSet, String)> {
        let caps = self.rule_filename.captures(filename)?;
        let set = RuleSet::from_tag(caps.get(1)?.as_str())?;
        let number = RuleNumber {
            major: caps.get(2)?.as_str().parse().ok()?,
            minor: caps.get(3)?.as_str().parse().ok()?,
            sub: caps.get(4)?.as_str().parse().ok()?,
        };
        Some((set, number.canonical(set)))
    }

    /// Re-parse a page-derived rule number spelling into the canonical form
    /// for the given set. Accepts `4`, `4.1`, `4.1.2`, and `18.1a`.
    fn canonicalize_rule_number(&self, set: RuleSet, raw: &str) -> Option<String> {
        let (major, minor, sub) = {
            let key = rule_sort_key(raw);
            (key.0 as u32, key.1 as u32, key.2 as u32)
        };
        if major == 0 {
            return None;
        }
        Some(RuleNumber { major, minor, sub }.canonical(set))
    }
}

/// Keep only the first artifact for each canonical identifier, stable on
/// discovery order.
pub fn dedup_first(items: Vec<Discovered>) -> Vec<Discovered> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_dotted_citation() {
        let cite = DottedCitation::parse("9A.36.011").unwrap();
        assert_eq!(cite.title(), "9A");
        assert_eq!(cite.chapter(), "9A.36");
        assert_eq!(cite.citation, "9A.36.011");
        assert_eq!(cite.depth(), 3);
    }

    #[test]
    fn chapter_of_two_segment_citation_is_itself() {
        let cite = DottedCitation::parse("46.61").unwrap();
        assert_eq!(cite.title(), "46");
        assert_eq!(cite.chapter(), "46.61");
    }

    #[test]
    fn rejects_malformed_citations() {
        assert!(DottedCitation::parse("").is_err());
        assert!(DottedCitation::parse("A.1").is_err());
        assert!(DottedCitation::parse("1.2.3.4").is_err());
        assert!(DottedCitation::parse("9..011").is_err());
    }

    #[test]
    fn numeric_order_beats_string_order() {
        // "46" < "9" lexicographically; numeric order must win
        assert_eq!(compare_dotted("9", "46"), Ordering::Less);
        assert_eq!(compare_dotted("9A.04", "9A.36"), Ordering::Less);
        assert_eq!(compare_dotted("9", "9A"), Ordering::Less);
    }

    #[test]
    fn extracts_citation_from_href() {
        let normalizer = CitationNormalizer::new();
        let cite = normalizer
            .citation_from_href("default.aspx?cite=9A.36.011&full=true")
            .unwrap();
        assert_eq!(cite.citation, "9A.36.011");
        assert!(normalizer.citation_from_href("default.aspx?foo=bar").is_none());
    }

    #[test]
    fn filename_triples_converge() {
        let normalizer = CitationNormalizer::new();
        let (set_a, num_a) = normalizer.rule_from_filename("crlj010100.pdf").unwrap();
        let (set_b, num_b) = normalizer.rule_from_filename("CRLJ010100.PDF").unwrap();
        assert_eq!(set_a, RuleSet::Crlj);
        assert_eq!(set_a, set_b);
        assert_eq!(num_a, "1.1");
        assert_eq!(num_a, num_b);
    }

    #[test]
    fn sub_part_styles_diverge_per_set() {
        let crlj = RuleNumber { major: 4, minor: 1, sub: 2 };
        assert_eq!(crlj.canonical(RuleSet::Crlj), "4.1.2");
        let rap = RuleNumber { major: 18, minor: 1, sub: 1 };
        assert_eq!(rap.canonical(RuleSet::Rap), "18.1a");
        // Sub-part zero renders the same everywhere
        let bare = RuleNumber { major: 56, minor: 0, sub: 0 };
        assert_eq!(bare.canonical(RuleSet::Rap), "56.0");
    }

    #[test]
    fn anchor_text_matches_filename_canonical_form() {
        let normalizer = CitationNormalizer::new();
        let (set, number, name) = normalizer
            .rule_from_anchor_text("RAP 18.1a Attorney Fees")
            .unwrap();
        assert_eq!(set, RuleSet::Rap);
        assert_eq!(number, "18.1a");
        assert_eq!(name.as_deref(), Some("Attorney Fees"));

        let (_, from_file) = normalizer.rule_from_filename("rap180101.pdf").unwrap();
        assert_eq!(from_file, number);
    }

    #[test]
    fn rule_sort_orders_by_integer_fields() {
        let mut numbers = vec!["10.2", "2.1", "2.1a", "2.10"];
        numbers.sort_by_key(|n| rule_sort_key(n));
        assert_eq!(numbers, vec!["2.1", "2.1a", "2.10", "10.2"]);
    }

    #[test]
    fn zero_sub_fallback_applies_once() {
        assert_eq!(zero_sub_form("4"), Some("4.0".to_string()));
        assert_eq!(zero_sub_form("4.0"), None);
        assert_eq!(zero_sub_form("4.1.2"), None);
    }

    #[test]
    fn dedup_keeps_first_encountered() {
        let items = vec![
            Discovered { id: "1.1".into(), href: "a".into(), name: None },
            Discovered { id: "1.2".into(), href: "b".into(), name: None },
            Discovered { id: "1.1".into(), href: "c".into(), name: None },
        ];
        let deduped = dedup_first(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].href, "a");
    }
}
