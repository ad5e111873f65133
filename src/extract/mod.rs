//! # Text Extraction Module
//!
//! ## Purpose
//! Produces normalized plain text from fetched source documents. The HTML
//! path strips navigation and boilerplate and probes structural selectors
//! for the content region; the PDF path decodes per-page text runs in layout
//! order and strips header/footer artifacts. Both paths share one
//! whitespace normalizer and one body-start locator.
//!
//! ## Input/Output Specification
//! - **Input**: Raw HTML strings or PDF byte streams, plus the family tag
//!   and identifier of the unit being extracted
//! - **Output**: Normalized UTF-8 plain text
//! - **Contract**: Near-empty output is a soft warning, not a failure; the
//!   record is still stored so a citation is never silently dropped

pub mod html;
pub mod pdf;

pub use html::HtmlExtractor;
pub use pdf::extract_pdf_text;

use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Output below this length triggers a soft warning at the call site.
pub const MIN_BODY_CHARS: usize = 40;

/// Bound for the PDF body-start search: a `"<tag> <id>"` match later than
/// this offset is a table-of-contents echo, not the body.
pub const PDF_BODY_START_WINDOW: usize = 600;

static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());

static EFFECTIVE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)effective\s+((?:[A-Z][a-z]+ \d{1,2}, \d{4})|(?:\d{1,2}/\d{1,2}/\d{2,4}))")
        .unwrap()
});

static LAST_AMENDED: LazyLock<Regex> = LazyLock::new(|| {
    // Trailing session-law history bracket, e.g. "[2011 c 336 s 2; 1975 c 260 s 9A.36.011.]"
    Regex::new(r"\[\s*((?:19|20)\d{2})\s+c\s+\d+[^\]]*\]").unwrap()
});

/// Collapse whitespace runs to single spaces, normalize newline sequences,
/// and collapse three or more consecutive newlines to exactly one blank
/// line. Applies NFKC so typographic variants from PDFs compare equal.
pub fn normalize_text(raw: &str) -> String {
    let unified: String = raw.nfkc().collect();
    let mut lines: Vec<String> = Vec::new();
    for line in unified.replace("\r\n", "\n").replace('\r', "\n").lines() {
        lines.push(line.split_whitespace().collect::<Vec<_>>().join(" "));
    }
    let joined = lines.join("\n");
    BLANK_RUNS.replace_all(&joined, "\n\n").trim().to_string()
}

/// Locate the start of true body text: the first case-insensitive occurrence
/// of `"<tag> <identifier>"`. Everything before it is discarded when the
/// match sits beyond position 0 and within `window` (when given).
pub fn locate_body_start(text: &str, tag: &str, identifier: &str, window: Option<usize>) -> String {
    let needle = format!("{} {}", tag, identifier).to_lowercase();
    let haystack = text.to_lowercase();
    match haystack.find(&needle) {
        Some(pos) if pos > 0 => {
            if let Some(limit) = window {
                if pos > limit {
                    return text.to_string();
                }
            }
            // Lowercasing can shift byte offsets on non-ASCII text; fall
            // back to the full text rather than split a character
            text.get(pos..)
                .map(|body| body.to_string())
                .unwrap_or_else(|| text.to_string())
        }
        _ => text.to_string(),
    }
}

/// Free-text effective-date annotation, when the body carries one.
pub fn effective_date(text: &str) -> Option<String> {
    EFFECTIVE_DATE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Most recent session-law year from the trailing history bracket.
pub fn last_amended(text: &str) -> Option<String> {
    LAST_AMENDED
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .max()
}
