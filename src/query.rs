//! # Query Engine Module
//!
//! ## Purpose
//! Read-only access over the document store: exact-citation lookup,
//! hierarchical enumeration in canonical numeric order, merged ranked
//! full-text search across all document families, and corpus statistics.
//! Runs with zero network dependency and no dependency on the orchestrator;
//! it may read concurrently with an in-progress crawl because every upsert
//! is independently atomic.
//!
//! ## Input/Output Specification
//! - **Input**: Citations, rule numbers, hierarchy keys, query strings
//! - **Output**: Records, ordered child lists, scored search hits, counts
//! - **Contract**: Lookup misses are `None`/empty results, never errors

use crate::citation::{compare_dotted, rule_sort_key, segment_key, zero_sub_form, DottedCitation};
use crate::config::SearchConfig;
use crate::errors::{CorpusError, Result};
use crate::index::{excerpt, score, tokenize_query};
use crate::store::{StoreReader, StoreStats};
use crate::{Family, LegalSection, RuleDocument, RuleSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One ranked search result with enough context for a caller to decide
/// whether to fetch the full record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub family: Family,
    /// Primary key of the matched record
    pub key: String,
    /// Human-readable identifier, e.g. `RCW 9A.36.011`
    pub display: String,
    pub name: Option<String>,
    /// Short matched-text excerpt
    pub excerpt: String,
    pub score: f32,
}

/// Read-only query engine over a store reader handle.
pub struct QueryEngine {
    reader: StoreReader,
    config: SearchConfig,
}

impl QueryEngine {
    pub fn new(reader: StoreReader, config: SearchConfig) -> Self {
        Self { reader, config }
    }

    /// Exact lookup of a statute or administrative-code section by its
    /// dotted citation. The citation is re-canonicalized first so case and
    /// spacing variants hit the same key.
    pub fn get_section(&self, family: Family, citation: &str) -> Result<Option<LegalSection>> {
        let canonical = match DottedCitation::parse(citation) {
            Ok(cite) => cite.citation,
            // An unparsable citation is a miss, not an error
            Err(_) => return Ok(None),
        };
        self.reader.get_section(family, &canonical)
    }

    /// Exact lookup of a court rule. When the bare form is absent and the
    /// supplied number has no fractional or sub part, the zero-sub-part
    /// form is tried exactly once before declaring not-found.
    pub fn get_rule(&self, set: RuleSet, number: &str) -> Result<Option<RuleDocument>> {
        let number = number.trim();
        if let Some(rule) = self.reader.get_rule(set, number)? {
            return Ok(Some(rule));
        }
        if let Some(fallback) = zero_sub_form(number) {
            return self.reader.get_rule(set, &fallback);
        }
        Ok(None)
    }

    /// Distinct titles of a family, ascending by parsed integer value.
    pub fn list_titles(&self, family: Family) -> Result<Vec<String>> {
        let keys = self.reader.section_keys(family, None)?;
        let mut titles: Vec<String> = keys
            .iter()
            .filter_map(|k| DottedCitation::parse(k).ok())
            .map(|c| c.title().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        titles.sort_by(|a, b| segment_key(a).cmp(&segment_key(b)));
        Ok(titles)
    }

    /// Distinct chapters under a title, ascending numeric order.
    pub fn list_chapters(&self, family: Family, title: &str) -> Result<Vec<String>> {
        let prefix = format!("{}.", title.trim().to_uppercase());
        let keys = self.reader.section_keys(family, Some(&prefix))?;
        let mut chapters: Vec<String> = keys
            .iter()
            .filter_map(|k| DottedCitation::parse(k).ok())
            .map(|c| c.chapter())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        chapters.sort_by(|a, b| compare_dotted(a, b));
        Ok(chapters)
    }

    /// Sections under a chapter, ascending numeric order.
    pub fn list_sections(&self, family: Family, chapter: &str) -> Result<Vec<LegalSection>> {
        let prefix = format!("{}.", chapter.trim().to_uppercase());
        let mut keys = self.reader.section_keys(family, Some(&prefix))?;
        keys.sort_by(|a, b| compare_dotted(a, b));

        let mut sections = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(section) = self.reader.get_section(family, &key)? {
                sections.push(section);
            }
        }
        Ok(sections)
    }

    /// Rules of one set (or all sets), in canonical (major, minor, sub)
    /// order; across sets, grouped by set tag.
    pub fn list_rules(&self, set: Option<RuleSet>) -> Result<Vec<RuleDocument>> {
        let mut rules = self.reader.rules(set)?;
        rules.sort_by(|a, b| {
            (a.rule_set.tag(), rule_sort_key(&a.rule_number))
                .cmp(&(b.rule_set.tag(), rule_sort_key(&b.rule_number)))
        });
        Ok(rules)
    }

    /// Ranked full-text search merged across all families. Each family's
    /// index is queried independently and capped at a fair share of the
    /// overall limit, then the partial result sets are merged, re-sorted by
    /// descending relevance, and truncated to the limit.
    pub fn search(&self, query: &str, limit: Option<usize>) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.len() < self.config.min_query_length {
            return Err(CorpusError::Query {
                reason: format!("query shorter than {} characters", self.config.min_query_length),
            });
        }
        if query.len() > self.config.max_query_length {
            return Err(CorpusError::Query {
                reason: format!("query longer than {} characters", self.config.max_query_length),
            });
        }

        let limit = limit.unwrap_or(self.config.default_limit);
        let share = (limit / Family::ALL.len()).max(1);
        let terms = tokenize_query(query);

        let mut merged: Vec<SearchHit> = Vec::new();
        for family in Family::ALL {
            let mut hits: Vec<SearchHit> = self
                .reader
                .search_docs(family)?
                .into_iter()
                .filter_map(|doc| {
                    let doc_score = score(&doc, &terms);
                    if doc_score <= 0.0 {
                        return None;
                    }
                    Some(SearchHit {
                        family: doc.family,
                        key: doc.key.clone(),
                        display: doc.display.clone(),
                        name: doc.name.clone(),
                        excerpt: excerpt(&doc.text, &terms, self.config.excerpt_chars),
                        score: doc_score,
                    })
                })
                .collect();
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
            hits.truncate(share);
            merged.extend(hits);
        }

        merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        merged.truncate(limit);
        Ok(merged)
    }

    /// Per-family counts and the last-update marker.
    pub fn statistics(&self) -> Result<StoreStats> {
        self.reader.stats()
    }
}
