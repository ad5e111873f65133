//! # HTML Text Extraction
//!
//! ## Purpose
//! Extracts normalized body text from statute and rule detail pages:
//! removes script/style/navigation/breadcrumb chrome, probes an ordered
//! list of structural selectors for the content region (page body last),
//! and strips known boilerplate phrases around the located body text.

use crate::extract::{locate_body_start, normalize_text};
use ego_tree::NodeId;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

// Elements that never contribute body text.
const REMOVE_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    "aside",
    "noscript",
    ".breadcrumb",
    ".breadcrumbs",
    "#breadcrumb",
    ".navigation",
    ".header",
    ".footer",
    ".menu",
    ".sidebar",
    "#sidebar",
];

// Content-region probe order: the most specific container first, the page
// body last. The first selector with non-empty text wins.
const CONTENT_SELECTORS: &[&str] = &[
    "#contentWrapper",
    "#divContent",
    "main",
    "[role='main']",
    "#content",
    ".content",
    "body",
];

// Boilerplate phrases that survive element removal on some pages.
static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)washington state legislature\s*",
        r"(?i)search within (?:this )?(?:chapter|title)\.?",
        r"(?i)complete chapter\s*(?:\|)?",
        r"(?i)(?:<<\s*)?previous chapter(?:\s*>>)?",
        r"(?i)(?:<<\s*)?next chapter(?:\s*>>)?",
        r"(?i)print version\s*(?:\|)?",
        r"(?i)rcw dispositions",
        r"(?i)beginning of chapter",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// HTML extractor with the removal and probe selector sets compiled once.
pub struct HtmlExtractor {
    remove: Vec<Selector>,
    probes: Vec<Selector>,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlExtractor {
    pub fn new() -> Self {
        let parse = |list: &[&str]| {
            list.iter()
                .map(|s| Selector::parse(s).expect("hardcoded CSS selector is invalid"))
                .collect()
        };
        Self {
            remove: parse(REMOVE_SELECTORS),
            probes: parse(CONTENT_SELECTORS),
        }
    }

    /// Extract normalized body text from a detail page. `tag` and
    /// `identifier` drive the body-start locator (`"RCW 9A.36.011"` style).
    pub fn extract(&self, html: &str, tag: &str, identifier: &str) -> String {
        let document = Html::parse_document(html);

        let to_remove = self.removal_set(&document);

        let mut region_text = String::new();
        for probe in &self.probes {
            if let Some(element) = document.select(probe).next() {
                let text = collect_text(element, &to_remove);
                if !text.trim().is_empty() {
                    region_text = text;
                    break;
                }
            }
        }
        if region_text.trim().is_empty() {
            // No selector matched anything with text: fall back to the
            // whole document rather than dropping the citation.
            region_text = document
                .root_element()
                .text()
                .collect::<Vec<_>>()
                .join(" ");
        }

        let normalized = normalize_text(&region_text);
        let body = locate_body_start(&normalized, tag, identifier, None);
        strip_boilerplate(&body)
    }

    /// Enumerate `(href, anchor text)` pairs from a listing page. Discovery
    /// feeds these to the citation normalizer.
    pub fn anchors(&self, html: &str) -> Vec<(String, String)> {
        let document = Html::parse_document(html);
        document
            .select(&ANCHOR_SELECTOR)
            .filter_map(|a| {
                let href = a.value().attr("href")?.to_string();
                let text = normalize_text(&a.text().collect::<Vec<_>>().join(" "));
                Some((href, text))
            })
            .collect()
    }

    fn removal_set(&self, document: &Html) -> HashSet<NodeId> {
        let mut set = HashSet::new();
        for selector in &self.remove {
            for element in document.select(selector) {
                set.insert(element.id());
            }
        }
        set
    }
}

/// Walk an element's subtree collecting text nodes, skipping any element in
/// the removal set together with its descendants.
fn collect_text(element: ElementRef, to_remove: &HashSet<NodeId>) -> String {
    let mut out = String::new();
    push_text(element, to_remove, &mut out);
    out
}

fn push_text(element: ElementRef, to_remove: &HashSet<NodeId>, out: &mut String) {
    if to_remove.contains(&element.id()) {
        return;
    }
    for child in element.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            scraper::Node::Element(_) => {
                if let Some(child_elem) = ElementRef::wrap(child) {
                    push_text(child_elem, to_remove, out);
                }
            }
            _ => {}
        }
    }
}

fn strip_boilerplate(text: &str) -> String {
    let mut cleaned = text.to_string();
    for pattern in BOILERPLATE.iter() {
        cleaned = pattern.replace_all(&cleaned, "").to_string();
    }
    normalize_text(&cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_specific_content_container() {
        let html = r#"
            <html><body>
                <nav>Site navigation</nav>
                <div id="contentWrapper">RCW 9A.36.011 Assault in the first degree. Body text.</div>
                <footer>Footer junk</footer>
            </body></html>
        "#;
        let extractor = HtmlExtractor::new();
        let text = extractor.extract(html, "RCW", "9A.36.011");
        assert!(text.starts_with("RCW 9A.36.011"));
        assert!(!text.contains("Site navigation"));
        assert!(!text.contains("Footer junk"));
    }

    #[test]
    fn falls_back_to_body_when_no_container_matches() {
        let html = "<html><body><p>RCW 1.04.010 Plain page text.</p></body></html>";
        let extractor = HtmlExtractor::new();
        let text = extractor.extract(html, "RCW", "1.04.010");
        assert!(text.contains("Plain page text"));
    }

    #[test]
    fn falls_back_to_full_document_for_fragment_input() {
        // No body element at all: full-page text extraction, not a failure
        let html = "<p>WAC 16.54.010 Orphan fragment.</p>";
        let extractor = HtmlExtractor::new();
        let text = extractor.extract(html, "WAC", "16.54.010");
        assert!(text.contains("Orphan fragment"));
    }

    #[test]
    fn discards_text_before_body_start() {
        let html = r#"
            <html><body><div id="content">
                Home &gt; Title 9A &gt; Chapter 9A.36
                RCW 9A.36.011 Assault in the first degree. (1) A person is guilty...
            </div></body></html>
        "#;
        let extractor = HtmlExtractor::new();
        let text = extractor.extract(html, "RCW", "9A.36.011");
        assert!(text.starts_with("RCW 9A.36.011"));
        assert!(!text.contains("Home"));
    }

    #[test]
    fn strips_boilerplate_phrases() {
        let html = r#"
            <html><body><div id="content">
                RCW 9A.36.011 Assault. Body.
                Complete Chapter | Print Version
            </div></body></html>
        "#;
        let extractor = HtmlExtractor::new();
        let text = extractor.extract(html, "RCW", "9A.36.011");
        assert!(!text.contains("Complete Chapter"));
        assert!(!text.contains("Print Version"));
    }

    #[test]
    fn enumerates_listing_anchors() {
        let html = r#"
            <html><body>
                <a href="default.aspx?cite=9A.36">Chapter 9A.36</a>
                <a href="default.aspx?cite=9A.40">Chapter 9A.40</a>
                <a name="no-href-anchor">skip me</a>
            </body></html>
        "#;
        let extractor = HtmlExtractor::new();
        let anchors = extractor.anchors(html);
        assert_eq!(anchors.len(), 2);
        assert_eq!(anchors[0].0, "default.aspx?cite=9A.36");
        assert_eq!(anchors[0].1, "Chapter 9A.36");
    }
}
