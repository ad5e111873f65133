//! # Court-Rule Source
//!
//! ## Purpose
//! Crawl strategy for court rules. One unit per rule set; the set's listing
//! page yields either HTML detail-page anchors whose text is shaped
//! `"<RuleSet> <number> <name>"`, or PDF anchors whose filenames encode the
//! rule number as three zero-padded fields. Both numbering schemes
//! normalize through the citation grammar so equivalent spellings land on
//! one canonical rule number.

use super::{CorpusRecord, CrawlItem, CrawlUnit, FamilySource};
use crate::citation::{dedup_first, rule_sort_key, CitationNormalizer, Discovered};
use crate::client::SourceClient;
use crate::config::RuleSourceConfig;
use crate::errors::{CorpusError, Result};
use crate::extract::{extract_pdf_text, HtmlExtractor};
use crate::{Family, RuleDocument, RuleSet};
use async_trait::async_trait;
use chrono::Utc;
use url::Url;

/// Publication format of one rule set's documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    /// HTML detail pages, numbering from anchor text
    HtmlPage,
    /// One PDF per rule, numbering from the filename
    Pdf,
}

/// How each rule set is published at the source.
pub fn publication_format(set: RuleSet) -> RuleFormat {
    match set {
        RuleSet::Cr => RuleFormat::HtmlPage,
        RuleSet::Crlj | RuleSet::Rap => RuleFormat::Pdf,
    }
}

pub struct RuleSource {
    set: RuleSet,
    config: RuleSourceConfig,
    normalizer: CitationNormalizer,
    extractor: HtmlExtractor,
}

impl RuleSource {
    pub fn new(set: RuleSet, config: RuleSourceConfig) -> Self {
        Self {
            set,
            config,
            normalizer: CitationNormalizer::new(),
            extractor: HtmlExtractor::new(),
        }
    }

    fn listing_url(&self) -> String {
        format!("{}/list.aspx?set={}", self.config.base_url, self.set.tag())
    }

    fn resolve(&self, href: &str) -> Result<String> {
        let base = Url::parse(&self.listing_url()).map_err(|e| CorpusError::Config {
            message: format!("Invalid base URL {}: {}", self.config.base_url, e),
        })?;
        let resolved = base.join(href).map_err(|e| CorpusError::Parse {
            what: "href".to_string(),
            origin: href.to_string(),
            details: e.to_string(),
        })?;
        Ok(resolved.to_string())
    }

    /// Discover this set's rules from its listing page, under the set's
    /// publication format.
    fn discover_rules(&self, html: &str) -> Result<Vec<Discovered>> {
        let mut found = Vec::new();
        for (href, text) in self.extractor.anchors(html) {
            let discovered = match publication_format(self.set) {
                RuleFormat::HtmlPage => {
                    self.normalizer
                        .rule_from_anchor_text(&text)
                        .and_then(|(set, number, name)| {
                            // Anchors for other sets share the listing chrome
                            (set == self.set).then_some(Discovered {
                                id: number,
                                href: href.clone(),
                                name,
                            })
                        })
                }
                RuleFormat::Pdf => {
                    self.normalizer
                        .rule_from_filename(&href)
                        .and_then(|(set, number)| {
                            (set == self.set).then_some(Discovered {
                                id: number,
                                href: href.clone(),
                                name: rule_name_from_anchor(&self.normalizer, &text),
                            })
                        })
                }
            };
            if let Some(mut item) = discovered {
                item.href = self.resolve(&item.href)?;
                found.push(item);
            }
        }
        let mut deduped = dedup_first(found);
        deduped.sort_by_key(|d| rule_sort_key(&d.id));
        Ok(deduped)
    }
}

#[async_trait]
impl FamilySource for RuleSource {
    fn family(&self) -> Family {
        Family::CourtRules
    }

    fn label(&self) -> String {
        self.set.tag().to_string()
    }

    /// One unit: the rule set's own listing page.
    async fn discover_units(&self, _client: &SourceClient) -> Result<Vec<CrawlUnit>> {
        Ok(vec![CrawlUnit {
            id: self.set.tag().to_string(),
            label: None,
            url: self.listing_url(),
        }])
    }

    async fn discover_items(
        &self,
        client: &SourceClient,
        unit: &CrawlUnit,
    ) -> Result<Vec<CrawlItem>> {
        let html = client.fetch_text(&unit.url).await?;
        Ok(self
            .discover_rules(&html)?
            .into_iter()
            .map(|rule| CrawlItem {
                id: rule.id,
                name: rule.name,
                url: rule.href,
            })
            .collect())
    }

    async fn fetch_item(&self, client: &SourceClient, item: &CrawlItem) -> Result<CorpusRecord> {
        let text = match publication_format(self.set) {
            RuleFormat::HtmlPage => {
                let html = client.fetch_text(&item.url).await?;
                self.extractor.extract(&html, self.set.tag(), &item.id)
            }
            RuleFormat::Pdf => {
                let bytes = client.fetch_binary(&item.url).await?;
                extract_pdf_text(&bytes, self.set.tag(), &item.id)?
            }
        };

        Ok(CorpusRecord::Rule(RuleDocument {
            rule_set: self.set,
            rule_number: item.id.clone(),
            rule_name: item.name.clone(),
            full_text: text,
            updated_at: Utc::now(),
        }))
    }
}

/// PDF listing anchors usually read `"CRLJ 4.1 Service of Summons"`; keep
/// the name part when the text parses, otherwise keep the whole anchor.
fn rule_name_from_anchor(normalizer: &CitationNormalizer, text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    normalizer
        .rule_from_anchor_text(trimmed)
        .and_then(|(_, _, name)| name)
        .or_else(|| Some(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(set: RuleSet) -> RuleSource {
        RuleSource::new(
            set,
            RuleSourceConfig {
                base_url: "https://example.gov/court_rules".to_string(),
                rule_sets: Vec::new(),
            },
        )
    }

    #[test]
    fn pdf_listing_discovers_by_filename() {
        let html = r#"
            <html><body>
                <a href="pdf/crlj040102.pdf">CRLJ 4.1.2 Amended Service</a>
                <a href="pdf/crlj010100.pdf">CRLJ 1.1 Scope of Rules</a>
                <a href="pdf/crlj010100.pdf">CRLJ 1.1 duplicate listing row</a>
                <a href="pdf/rap180101.pdf">RAP 18.1a belongs to another set</a>
                <a href="about.aspx">About these rules</a>
            </body></html>
        "#;
        let rules = source(RuleSet::Crlj).discover_rules(html).unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1.1", "4.1.2"]);
        assert_eq!(rules[0].name.as_deref(), Some("Scope of Rules"));
        assert!(rules[1].href.ends_with("/court_rules/pdf/crlj040102.pdf"));
    }

    #[test]
    fn html_listing_discovers_by_anchor_text() {
        let html = r#"
            <html><body>
                <a href="display.aspx?set=CR&ruleid=56">CR 56 Summary Judgment</a>
                <a href="display.aspx?set=CR&ruleid=11">CR 11 Signing of Pleadings</a>
                <a href="display.aspx?set=CRLJ&ruleid=1">CRLJ 1.1 not this set</a>
            </body></html>
        "#;
        let rules = source(RuleSet::Cr).discover_rules(html).unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        // Canonical form carries the zero minor; numeric order holds
        assert_eq!(ids, vec!["11.0", "56.0"]);
        assert_eq!(rules[1].name.as_deref(), Some("Summary Judgment"));
    }

    #[test]
    fn equivalent_spellings_converge_across_formats() {
        // The same rule discovered from a filename and from anchor text
        // must normalize to one identifier
        let normalizer = CitationNormalizer::new();
        let (_, from_file) = normalizer.rule_from_filename("rap180101.pdf").unwrap();
        let (_, from_text, _) = normalizer.rule_from_anchor_text("RAP 18.1a Fees").unwrap();
        assert_eq!(from_file, from_text);
    }
}
