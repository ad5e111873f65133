//! # Crawl Sources Module
//!
//! ## Purpose
//! Defines the per-family strategy interface consumed by the generic crawl
//! orchestrator, and provides the concrete implementations: dotted-citation
//! HTML sources (statutes, administrative code) and court-rule sources
//! (HTML-anchor and PDF-filename publication formats).
//!
//! ## Architecture
//! - `FamilySource` trait: listing discovery, per-item extraction, citation
//!   normalization — one strategy object per document family
//! - `statutes.rs`: HTML listing/detail source shared by both sectioned
//!   families
//! - `rules.rs`: court-rule source covering both publication formats

pub mod rules;
pub mod statutes;

pub use rules::RuleSource;
pub use statutes::StatuteHtmlSource;

use crate::client::SourceClient;
use crate::config::SourcesConfig;
use crate::errors::Result;
use crate::{Family, LegalSection, RuleDocument, RuleSet};
use async_trait::async_trait;

/// One hierarchical grouping of work: a chapter of a sectioned family, or a
/// whole rule set. Progress is ledgered at this granularity.
#[derive(Debug, Clone)]
pub struct CrawlUnit {
    /// Canonical unit identifier (chapter citation or rule-set tag)
    pub id: String,
    /// Display label carried by the listing anchor, when present
    pub label: Option<String>,
    /// Absolute URL of the unit's listing page
    pub url: String,
}

/// One leaf document to fetch: a section detail page or a rule page/PDF.
#[derive(Debug, Clone)]
pub struct CrawlItem {
    /// Canonical identifier (dotted citation or rule number)
    pub id: String,
    /// Display name from the listing anchor, when present
    pub name: Option<String>,
    /// Absolute URL of the detail page or PDF
    pub url: String,
}

/// A normalized record ready for upsert.
#[derive(Debug, Clone)]
pub enum CorpusRecord {
    Section(Family, LegalSection),
    Rule(RuleDocument),
}

impl CorpusRecord {
    pub fn key(&self) -> String {
        match self {
            CorpusRecord::Section(family, s) => format!("{} {}", family.tag(), s.citation),
            CorpusRecord::Rule(r) => format!("{} {}", r.rule_set.tag(), r.rule_number),
        }
    }

    pub fn body_len(&self) -> usize {
        match self {
            CorpusRecord::Section(_, s) => s.full_text.len(),
            CorpusRecord::Rule(r) => r.full_text.len(),
        }
    }
}

/// Per-family crawl strategy: how to discover hierarchical units, how to
/// discover the items under one unit, and how to turn one fetched item into
/// a canonical record. The orchestrator owns everything else (concurrency,
/// politeness, failure isolation, progress, persistence).
#[async_trait]
pub trait FamilySource: Send + Sync {
    fn family(&self) -> Family;

    /// Human-readable label for logs
    fn label(&self) -> String;

    /// Discover the hierarchical units to crawl, deduplicated and in
    /// canonical order.
    async fn discover_units(&self, client: &SourceClient) -> Result<Vec<CrawlUnit>>;

    /// Discover the leaf items under one unit, deduplicated and in
    /// canonical order.
    async fn discover_items(&self, client: &SourceClient, unit: &CrawlUnit)
        -> Result<Vec<CrawlItem>>;

    /// Fetch one item and produce its normalized record.
    async fn fetch_item(&self, client: &SourceClient, item: &CrawlItem) -> Result<CorpusRecord>;
}

/// Build the full strategy list from configuration: the two sectioned
/// families plus one source per selected rule set.
pub fn sources_from_config(config: &SourcesConfig) -> Vec<Box<dyn FamilySource>> {
    let mut sources: Vec<Box<dyn FamilySource>> = vec![
        Box::new(StatuteHtmlSource::new(Family::Statutes, config.statutes.clone())),
        Box::new(StatuteHtmlSource::new(Family::AdminCode, config.admin_code.clone())),
    ];

    let selected: Vec<RuleSet> = if config.court_rules.rule_sets.is_empty() {
        RuleSet::ALL.to_vec()
    } else {
        config
            .court_rules
            .rule_sets
            .iter()
            .filter_map(|tag| RuleSet::from_tag(tag))
            .collect()
    };
    for set in selected {
        sources.push(Box::new(RuleSource::new(set, config.court_rules.clone())));
    }
    sources
}
