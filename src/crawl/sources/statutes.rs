//! # Sectioned HTML Source
//!
//! ## Purpose
//! Crawl strategy for the dotted-citation families (statutes and
//! administrative code). Listing pages embed child citations in anchor
//! `cite=` query parameters: the family index lists titles, a title page
//! lists chapters, a chapter page lists sections, and each section has an
//! HTML detail page.

use super::{CorpusRecord, CrawlItem, CrawlUnit, FamilySource};
use crate::citation::{compare_dotted, dedup_first, CitationNormalizer, Discovered};
use crate::client::SourceClient;
use crate::config::HtmlSourceConfig;
use crate::errors::{CorpusError, Result};
use crate::extract::{self, HtmlExtractor};
use crate::{Family, LegalSection};
use async_trait::async_trait;
use chrono::Utc;
use url::Url;

pub struct StatuteHtmlSource {
    family: Family,
    config: HtmlSourceConfig,
    normalizer: CitationNormalizer,
    extractor: HtmlExtractor,
}

impl StatuteHtmlSource {
    pub fn new(family: Family, config: HtmlSourceConfig) -> Self {
        Self {
            family,
            config,
            normalizer: CitationNormalizer::new(),
            extractor: HtmlExtractor::new(),
        }
    }

    fn cite_url(&self, citation: &str) -> String {
        format!("{}?cite={}", self.config.base_url, citation)
    }

    /// Resolve a listing-relative href against the base URL.
    fn resolve(&self, href: &str) -> Result<String> {
        let base = Url::parse(&self.config.base_url).map_err(|e| CorpusError::Config {
            message: format!("Invalid base URL {}: {}", self.config.base_url, e),
        })?;
        let resolved = base.join(href).map_err(|e| CorpusError::Parse {
            what: "href".to_string(),
            origin: href.to_string(),
            details: e.to_string(),
        })?;
        Ok(resolved.to_string())
    }

    /// Pull citations of exactly `depth` dotted segments out of a listing
    /// page, deduplicated first-wins and sorted canonically.
    fn discover_citations(&self, html: &str, depth: usize) -> Result<Vec<Discovered>> {
        let mut found = Vec::new();
        for (href, text) in self.extractor.anchors(html) {
            if let Some(cite) = self.normalizer.citation_from_href(&href) {
                if cite.depth() == depth {
                    found.push(Discovered {
                        id: cite.citation,
                        href: self.resolve(&href)?,
                        name: anchor_display_name(&text),
                    });
                }
            }
        }
        let mut deduped = dedup_first(found);
        deduped.sort_by(|a, b| compare_dotted(&a.id, &b.id));
        Ok(deduped)
    }

    /// Titles to crawl: configured explicitly, or discovered from the
    /// family index page.
    async fn titles(&self, client: &SourceClient) -> Result<Vec<Discovered>> {
        if !self.config.titles.is_empty() {
            return Ok(self
                .config
                .titles
                .iter()
                .map(|t| Discovered {
                    id: t.to_uppercase(),
                    href: self.cite_url(t),
                    name: None,
                })
                .collect());
        }
        let html = client.fetch_text(&self.config.base_url).await?;
        self.discover_citations(&html, 1)
    }
}

#[async_trait]
impl FamilySource for StatuteHtmlSource {
    fn family(&self) -> Family {
        self.family
    }

    fn label(&self) -> String {
        self.config.tag.clone()
    }

    /// Units are chapters: walk each title's listing page for its chapter
    /// anchors.
    async fn discover_units(&self, client: &SourceClient) -> Result<Vec<CrawlUnit>> {
        let mut units = Vec::new();
        for title in self.titles(client).await? {
            let html = client.fetch_text(&title.href).await?;
            for chapter in self.discover_citations(&html, 2)? {
                units.push(CrawlUnit {
                    id: chapter.id,
                    label: chapter.name,
                    url: chapter.href,
                });
            }
        }
        Ok(units)
    }

    async fn discover_items(
        &self,
        client: &SourceClient,
        unit: &CrawlUnit,
    ) -> Result<Vec<CrawlItem>> {
        let html = client.fetch_text(&unit.url).await?;
        Ok(self
            .discover_citations(&html, 3)?
            .into_iter()
            .map(|section| CrawlItem {
                id: section.id,
                name: section.name,
                url: section.href,
            })
            .collect())
    }

    async fn fetch_item(&self, client: &SourceClient, item: &CrawlItem) -> Result<CorpusRecord> {
        let html = client.fetch_text(&item.url).await?;
        let text = self.extractor.extract(&html, &self.config.tag, &item.id);

        let cite = crate::citation::DottedCitation::parse(&item.id)?;
        let now = Utc::now();
        let section = LegalSection {
            citation: cite.citation.clone(),
            title_num: cite.title().to_string(),
            chapter_num: cite.chapter(),
            section_num: cite.citation.clone(),
            title_name: None,
            chapter_name: None,
            section_name: item.name.clone(),
            effective_date: extract::effective_date(&text),
            last_amended: extract::last_amended(&text),
            full_text: text,
            created_at: now,
            updated_at: now,
        };
        Ok(CorpusRecord::Section(self.family, section))
    }
}

/// Anchor text minus the citation echo most listing anchors lead with
/// (`"9A.36.011 Assault in the first degree."` keeps only the name part).
fn anchor_display_name(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let name = trimmed
        .split_once(char::is_whitespace)
        .filter(|(head, _)| head.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false))
        .map(|(_, rest)| rest.trim())
        .unwrap_or(trimmed);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
