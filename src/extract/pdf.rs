//! # PDF Text Extraction
//!
//! ## Purpose
//! Decodes per-rule PDF documents into normalized plain text: pages are
//! extracted in layout order, each page's text runs joined with spaces and
//! pages joined with newlines, then page-number and footer artifacts are
//! stripped. The body-start search is bounded near the top of the text so a
//! table-of-contents echo never truncates the real body.

use crate::errors::{CorpusError, Result};
use crate::extract::{locate_body_start, normalize_text, PDF_BODY_START_WINDOW};
use regex::Regex;
use std::sync::LazyLock;

static PAGE_NUMBER_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:-\s*)?\d{1,4}(?:\s*-)?\s*$").unwrap());

static PAGE_OF_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bpage \d{1,4}(?: of \d{1,4})?\b").unwrap());

static EFFECTIVE_FOOTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*effective\s+[a-z0-9 ,/]+\s*$").unwrap()
});

static RESERVED_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\[\s*reserved\.?\s*\]").unwrap());

/// Extract normalized text from a PDF byte stream. A malformed document is
/// a parse failure for this item; an unreadable single page degrades to an
/// empty page with a warning.
pub fn extract_pdf_text(bytes: &[u8], tag: &str, identifier: &str) -> Result<String> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| CorpusError::PdfDecode {
        origin: format!("{} {}", tag, identifier),
        details: e.to_string(),
    })?;

    let mut pages: Vec<String> = Vec::new();
    for (page_number, _) in doc.get_pages() {
        match doc.extract_text(&[page_number]) {
            Ok(content) => {
                // Join the page's text runs with single spaces
                pages.push(content.split_whitespace().collect::<Vec<_>>().join(" "));
            }
            Err(e) => {
                tracing::warn!(
                    "Skipping unreadable page {} of {} {}: {}",
                    page_number,
                    tag,
                    identifier,
                    e
                );
                pages.push(String::new());
            }
        }
    }

    let joined = pages.join("\n");
    let normalized = normalize_text(&joined);
    let body = locate_body_start(&normalized, tag, identifier, Some(PDF_BODY_START_WINDOW));
    Ok(strip_page_artifacts(&body))
}

fn strip_page_artifacts(text: &str) -> String {
    let mut cleaned = PAGE_NUMBER_LINES.replace_all(text, "").to_string();
    cleaned = PAGE_OF_MARKER.replace_all(&cleaned, "").to_string();
    cleaned = EFFECTIVE_FOOTER.replace_all(&cleaned, "").to_string();
    cleaned = RESERVED_PLACEHOLDER.replace_all(&cleaned, "").to_string();
    normalize_text(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_page_numbers_and_footers() {
        let text = "CRLJ 1.1 Scope of rules.\n12\nThese rules govern procedure.\nPage 2 of 3\nEffective September 1, 2016";
        let cleaned = strip_page_artifacts(text);
        assert!(cleaned.contains("These rules govern procedure."));
        assert!(!cleaned.contains("12\n"));
        assert!(!cleaned.contains("Page 2"));
        assert!(!cleaned.to_lowercase().contains("effective september"));
    }

    #[test]
    fn strips_reserved_placeholders() {
        let text = "CRLJ 78.0 [Reserved]";
        let cleaned = strip_page_artifacts(text);
        assert!(!cleaned.contains("[Reserved]"));
    }

    #[test]
    fn rejects_garbage_bytes() {
        let result = extract_pdf_text(b"not a pdf", "CRLJ", "1.1");
        assert!(matches!(result, Err(CorpusError::PdfDecode { .. })));
    }
}
