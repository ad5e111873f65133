//! # Legal Corpus Ingestion & Search Engine
//!
//! ## Overview
//! This library crawls a heterogeneous corpus of legal text — statutes,
//! administrative-code sections, and court rules published as structured HTML
//! and per-rule PDF documents — normalizes every unit into a canonical record,
//! and persists it into an embedded store that supports exact-citation lookup,
//! hierarchical browsing, and ranked full-text search with zero network
//! dependency at query time.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `client`: Rate-limited HTTP source client (the single point of outbound I/O)
//! - `citation`: Citation and rule-number normalization grammar
//! - `extract`: Plain-text extraction from HTML pages and PDF documents
//! - `store`: Persistent document store with synchronized search indexes
//! - `index`: Search-index projection and relevance scoring
//! - `crawl`: Generic crawl orchestrator parameterized by document family
//! - `query`: Read-only lookup, browse, search, and statistics operations
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Remote listing/detail HTML pages and rule PDFs, search queries
//! - **Output**: Canonical section/rule records, ranked search results
//! - **Guarantee**: Every primary row has exactly one matching search-index row
//!
//! ## Usage
//! ```rust,no_run
//! use legal_corpus_search::{Config, store::DocumentStore, query::QueryEngine};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.toml")?;
//!     let store = DocumentStore::open(&config.storage)?;
//!     let engine = QueryEngine::new(store.reader(), config.search.clone());
//!     let results = engine.search("firearm possession", Some(10))?;
//!     println!("Found {} results", results.len());
//!     Ok(())
//! }
//! ```

// Core modules
pub mod citation;
pub mod client;
pub mod config;
pub mod crawl;
pub mod errors;
pub mod extract;
pub mod index;
pub mod query;
pub mod store;

// Utilities
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use errors::{CorpusError, Result};
pub use query::{QueryEngine, SearchHit};

// Core types used throughout the system
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Document families held in the corpus. Each family owns its own primary
/// table and search index in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Family {
    /// Statute sections (Revised Code), dotted hierarchical citations
    Statutes,
    /// Administrative-code sections, same citation grammar as statutes
    AdminCode,
    /// Court rules, grouped into rule sets with their own numbering
    CourtRules,
}

impl Family {
    pub const ALL: [Family; 3] = [Family::Statutes, Family::AdminCode, Family::CourtRules];

    /// Stable tag used in store keys, logs, and search results.
    pub fn tag(&self) -> &'static str {
        match self {
            Family::Statutes => "RCW",
            Family::AdminCode => "WAC",
            Family::CourtRules => "rule",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Family> {
        match tag.to_ascii_uppercase().as_str() {
            "RCW" | "STATUTES" => Some(Family::Statutes),
            "WAC" | "ADMIN" | "ADMIN_CODE" => Some(Family::AdminCode),
            "RULE" | "RULES" | "COURT_RULES" => Some(Family::CourtRules),
            _ => None,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// How a nonzero filename sub-part field renders into the canonical rule
/// number. The source corpus is not uniform here: one rule set spells
/// sub-parts as a second decimal extension, another as a letter suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubPartStyle {
    /// `(4, 1, 2)` renders as `4.1.2`
    Decimal,
    /// `(18, 1, 1)` renders as `18.1a`
    Letter,
}

/// Court-rule sets covered by the crawler. Fixed enumeration; each set has
/// one numbering scheme and one publication format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleSet {
    /// Civil Rules — HTML detail pages, anchor-text numbering
    Cr,
    /// Civil Rules for Courts of Limited Jurisdiction — per-rule PDFs
    Crlj,
    /// Rules of Appellate Procedure — per-rule PDFs
    Rap,
}

impl RuleSet {
    pub const ALL: [RuleSet; 3] = [RuleSet::Cr, RuleSet::Crlj, RuleSet::Rap];

    pub fn tag(&self) -> &'static str {
        match self {
            RuleSet::Cr => "CR",
            RuleSet::Crlj => "CRLJ",
            RuleSet::Rap => "RAP",
        }
    }

    pub fn from_tag(tag: &str) -> Option<RuleSet> {
        match tag.to_ascii_uppercase().as_str() {
            "CR" => Some(RuleSet::Cr),
            "CRLJ" => Some(RuleSet::Crlj),
            "RAP" => Some(RuleSet::Rap),
            _ => None,
        }
    }

    /// Per-set sub-part rendering. The divergence is deliberate: both
    /// spellings exist in the published corpus and must round-trip to one
    /// canonical value per set.
    pub fn sub_part_style(&self) -> SubPartStyle {
        match self {
            RuleSet::Crlj => SubPartStyle::Decimal,
            RuleSet::Cr | RuleSet::Rap => SubPartStyle::Letter,
        }
    }
}

impl fmt::Display for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A statute or administrative-code section. The citation is globally unique
/// within its family; re-ingestion overwrites body and metadata in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalSection {
    /// Canonical dotted citation, e.g. `9A.36.011`
    pub citation: String,
    /// First citation segment, e.g. `9A`
    pub title_num: String,
    /// First two segments, e.g. `9A.36`
    pub chapter_num: String,
    /// Full dotted path (equal to `citation`)
    pub section_num: String,
    /// Display label of the title, when the listing page carried one
    pub title_name: Option<String>,
    /// Display label of the chapter
    pub chapter_name: Option<String>,
    /// Display label of the section
    pub section_name: Option<String>,
    /// Normalized body text, non-empty
    pub full_text: String,
    /// Free-text effective-date annotation extracted from the body
    pub effective_date: Option<String>,
    /// Free-text last-amended annotation
    pub last_amended: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single court rule. `(rule_set, rule_number)` is globally unique; the
/// rule number is canonical after normalization so file-derived and
/// page-derived spellings converge on one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub rule_set: RuleSet,
    /// Canonical rule number, e.g. `1.1`, `4.1.2`, `18.1a`
    pub rule_number: String,
    /// Display title of the rule
    pub rule_name: Option<String>,
    /// Normalized body text, non-empty
    pub full_text: String,
    pub updated_at: DateTime<Utc>,
}

impl RuleDocument {
    /// Store key for this rule: `<SET>/<number>`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.rule_set.tag(), self.rule_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_tags_round_trip() {
        for family in Family::ALL {
            assert_eq!(Family::from_tag(family.tag()), Some(family));
        }
        assert_eq!(Family::from_tag("unknown"), None);
    }

    #[test]
    fn rule_set_tags_round_trip() {
        for set in RuleSet::ALL {
            assert_eq!(RuleSet::from_tag(set.tag()), Some(set));
            assert_eq!(RuleSet::from_tag(&set.tag().to_lowercase()), Some(set));
        }
    }
}
