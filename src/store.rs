//! # Document Store Module
//!
//! ## Purpose
//! The persistent relational model: one primary tree per document family,
//! each with a synchronized search-index tree, plus a progress ledger for
//! resumability. Upsert is the only write path and covers the primary row
//! and its index row in one atomic unit of work, so a reader never observes
//! one without the other.
//!
//! ## Input/Output Specification
//! - **Input**: Canonical section/rule records from the crawl orchestrator
//! - **Output**: Keyed retrieval, prefix scans, search-doc scans, statistics
//! - **Storage**: Sled embedded database, bincode values, optional gzip
//!   body compression
//!
//! ## Key Features
//! - Insert-or-replace keyed by natural unique identity
//! - Multi-tree transaction keeping primary and index rows in lockstep
//! - Explicit open/close lifecycle; queries go through a read-only handle

use crate::config::StorageConfig;
use crate::errors::{CorpusError, Result};
use crate::index::SearchDoc;
use crate::{Family, LegalSection, RuleDocument, RuleSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::TransactionError;
use sled::Transactional;
use std::io::{Read, Write};

const LAST_UPSERT_KEY: &[u8] = b"__meta/last_upsert";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Crawl state of one hierarchical unit (a chapter or a rule set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrawlStatus {
    Pending,
    Completed,
    Error,
}

/// Progress-ledger record. Observability only; correctness of the primary
/// tables never depends on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub status: CrawlStatus,
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Per-family row counts and the last-update marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub statute_sections: usize,
    pub admin_code_sections: usize,
    pub court_rules: usize,
    pub last_upsert: Option<DateTime<Utc>>,
}

/// The document store. Exclusively owns all persisted entities; constructed
/// explicitly and closed explicitly, never ambient global state.
pub struct DocumentStore {
    db: sled::Db,
    compress: bool,
    statutes: sled::Tree,
    statutes_search: sled::Tree,
    admin_code: sled::Tree,
    admin_code_search: sled::Tree,
    rules: sled::Tree,
    rules_search: sled::Tree,
    progress: sled::Tree,
}

/// Read-only handle over the same trees. The query engine accepts only this
/// type, which is how the read-only discipline of the query phase is
/// enforced over an embedded database without a kernel-level read-only open.
#[derive(Clone)]
pub struct StoreReader {
    statutes: sled::Tree,
    statutes_search: sled::Tree,
    admin_code: sled::Tree,
    admin_code_search: sled::Tree,
    rules: sled::Tree,
    rules_search: sled::Tree,
    progress: sled::Tree,
}

impl DocumentStore {
    /// Open or create the store. Inability to open is the only startup-fatal
    /// failure in the system.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = sled::open(&config.db_path)?;

        let store = Self {
            statutes: db.open_tree("statutes")?,
            statutes_search: db.open_tree("statutes_search")?,
            admin_code: db.open_tree("admin_code")?,
            admin_code_search: db.open_tree("admin_code_search")?,
            rules: db.open_tree("court_rules")?,
            rules_search: db.open_tree("court_rules_search")?,
            progress: db.open_tree("crawl_progress")?,
            compress: config.enable_compression,
            db,
        };

        tracing::info!(
            "Document store opened at {:?} ({} statutes, {} admin sections, {} rules)",
            config.db_path,
            store.statutes.len(),
            store.admin_code.len(),
            store.rules.len()
        );
        Ok(store)
    }

    /// Flush and close. Dropping without close loses nothing sled has
    /// already committed; this exists to make the lifecycle explicit.
    pub fn close(self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Read-only handle for the query phase.
    pub fn reader(&self) -> StoreReader {
        StoreReader {
            statutes: self.statutes.clone(),
            statutes_search: self.statutes_search.clone(),
            admin_code: self.admin_code.clone(),
            admin_code_search: self.admin_code_search.clone(),
            rules: self.rules.clone(),
            rules_search: self.rules_search.clone(),
            progress: self.progress.clone(),
        }
    }

    /// Insert-or-replace a statute or administrative-code section, keyed by
    /// citation. Writes the primary row and its rebuilt search-index row in
    /// one transaction.
    pub fn upsert_section(&self, family: Family, section: &LegalSection) -> Result<()> {
        if section.full_text.trim().is_empty() {
            return Err(CorpusError::Constraint {
                key: section.citation.clone(),
                reason: "empty body text".to_string(),
            });
        }
        let (primary, search) = self.section_trees(family)?;

        // Preserve the original creation timestamp across overwrites
        let mut record = section.clone();
        if let Some(existing) = read_value::<LegalSection>(primary, section.citation.as_bytes())? {
            record.created_at = existing.created_at;
        }

        let key = record.citation.as_bytes().to_vec();
        let primary_bytes = encode(&record, self.compress)?;
        let index_bytes = encode(&SearchDoc::from_section(family, &record), self.compress)?;

        (primary, search)
            .transaction(|(p, s)| {
                p.insert(key.as_slice(), primary_bytes.as_slice())?;
                s.remove(key.as_slice())?;
                s.insert(key.as_slice(), index_bytes.as_slice())?;
                Ok(())
            })
            .map_err(flatten_txn)?;

        self.mark_upsert()?;
        tracing::debug!("Upserted {} {}", family.tag(), record.citation);
        Ok(())
    }

    /// Insert-or-replace a court rule, keyed by `(rule set, rule number)`.
    pub fn upsert_rule(&self, rule: &RuleDocument) -> Result<()> {
        if rule.full_text.trim().is_empty() {
            return Err(CorpusError::Constraint {
                key: rule.key(),
                reason: "empty body text".to_string(),
            });
        }

        let key = rule.key().into_bytes();
        let primary_bytes = encode(rule, self.compress)?;
        let index_bytes = encode(&SearchDoc::from_rule(rule), self.compress)?;

        (&self.rules, &self.rules_search)
            .transaction(|(p, s)| {
                p.insert(key.as_slice(), primary_bytes.as_slice())?;
                s.remove(key.as_slice())?;
                s.insert(key.as_slice(), index_bytes.as_slice())?;
                Ok(())
            })
            .map_err(flatten_txn)?;

        self.mark_upsert()?;
        tracing::debug!("Upserted {} {}", rule.rule_set.tag(), rule.rule_number);
        Ok(())
    }

    /// Record crawl progress for one hierarchical unit.
    pub fn set_progress(
        &self,
        family: Family,
        unit: &str,
        status: CrawlStatus,
        message: Option<String>,
    ) -> Result<()> {
        let record = ProgressRecord {
            status,
            message,
            updated_at: Utc::now(),
        };
        let key = format!("{}/{}", family.tag(), unit);
        self.progress
            .insert(key.as_bytes(), bincode::serialize(&record)?)?;
        Ok(())
    }

    fn mark_upsert(&self) -> Result<()> {
        self.progress
            .insert(LAST_UPSERT_KEY, bincode::serialize(&Utc::now())?)?;
        Ok(())
    }

    fn section_trees(&self, family: Family) -> Result<(&sled::Tree, &sled::Tree)> {
        match family {
            Family::Statutes => Ok((&self.statutes, &self.statutes_search)),
            Family::AdminCode => Ok((&self.admin_code, &self.admin_code_search)),
            Family::CourtRules => Err(CorpusError::Internal {
                message: "court rules are not sectioned; use upsert_rule".to_string(),
            }),
        }
    }
}

impl StoreReader {
    pub fn get_section(&self, family: Family, citation: &str) -> Result<Option<LegalSection>> {
        let tree = self.section_tree(family)?;
        read_value(tree, citation.as_bytes())
    }

    pub fn get_rule(&self, set: RuleSet, number: &str) -> Result<Option<RuleDocument>> {
        let key = format!("{}/{}", set.tag(), number);
        read_value(&self.rules, key.as_bytes())
    }

    /// All section citations of a family, optionally bounded to a key
    /// prefix (`"9A."` for chapters of a title, `"9A.36."` for sections of
    /// a chapter). Order is raw key order; callers apply canonical sorting.
    pub fn section_keys(&self, family: Family, prefix: Option<&str>) -> Result<Vec<String>> {
        let tree = self.section_tree(family)?;
        let iter = match prefix {
            Some(p) => tree.scan_prefix(p.as_bytes()),
            None => tree.iter(),
        };
        let mut keys = Vec::new();
        for entry in iter {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(&key).to_string());
        }
        Ok(keys)
    }

    /// All rules of one set, or of all sets.
    pub fn rules(&self, set: Option<RuleSet>) -> Result<Vec<RuleDocument>> {
        let iter = match set {
            Some(s) => self.rules.scan_prefix(format!("{}/", s.tag()).as_bytes()),
            None => self.rules.iter(),
        };
        let mut out = Vec::new();
        for entry in iter {
            let (_, value) = entry?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Full scan of one family's search index.
    pub fn search_docs(&self, family: Family) -> Result<Vec<SearchDoc>> {
        let tree = match family {
            Family::Statutes => &self.statutes_search,
            Family::AdminCode => &self.admin_code_search,
            Family::CourtRules => &self.rules_search,
        };
        let mut docs = Vec::new();
        for entry in tree.iter() {
            let (_, value) = entry?;
            docs.push(decode(&value)?);
        }
        Ok(docs)
    }

    pub fn get_progress(&self, family: Family, unit: &str) -> Result<Option<ProgressRecord>> {
        let key = format!("{}/{}", family.tag(), unit);
        match self.progress.get(key.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let last_upsert = match self.progress.get(LAST_UPSERT_KEY)? {
            Some(value) => Some(bincode::deserialize(&value)?),
            None => None,
        };
        Ok(StoreStats {
            statute_sections: self.statutes.len(),
            admin_code_sections: self.admin_code.len(),
            court_rules: self.rules.len(),
            last_upsert,
        })
    }

    /// Index-row count for one family; used by consistency checks and tests.
    pub fn search_doc_count(&self, family: Family) -> usize {
        match family {
            Family::Statutes => self.statutes_search.len(),
            Family::AdminCode => self.admin_code_search.len(),
            Family::CourtRules => self.rules_search.len(),
        }
    }

    fn section_tree(&self, family: Family) -> Result<&sled::Tree> {
        match family {
            Family::Statutes => Ok(&self.statutes),
            Family::AdminCode => Ok(&self.admin_code),
            Family::CourtRules => Err(CorpusError::Internal {
                message: "court rules are not sectioned; use get_rule".to_string(),
            }),
        }
    }
}

fn flatten_txn(err: TransactionError<()>) -> CorpusError {
    match err {
        TransactionError::Storage(e) => CorpusError::Storage(e),
        TransactionError::Abort(()) => CorpusError::Internal {
            message: "upsert transaction aborted".to_string(),
        },
    }
}

fn encode<T: Serialize>(value: &T, compress: bool) -> Result<Vec<u8>> {
    let raw = bincode::serialize(value)?;
    if !compress {
        return Ok(raw);
    }
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&raw)?;
    Ok(encoder.finish()?)
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = flate2::read::GzDecoder::new(bytes);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw)?;
        Ok(bincode::deserialize(&raw)?)
    } else {
        Ok(bincode::deserialize(bytes)?)
    }
}

fn read_value<T: for<'de> Deserialize<'de>>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>> {
    match tree.get(key)? {
        Some(value) => Ok(Some(decode(&value)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(compress: bool) -> (TempDir, DocumentStore) {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            db_path: dir.path().join("corpus.db"),
            enable_compression: compress,
        };
        let store = DocumentStore::open(&config).unwrap();
        (dir, store)
    }

    fn section(citation: &str, text: &str) -> LegalSection {
        let parsed = crate::citation::DottedCitation::parse(citation).unwrap();
        LegalSection {
            citation: parsed.citation.clone(),
            title_num: parsed.title().to_string(),
            chapter_num: parsed.chapter(),
            section_num: parsed.citation.clone(),
            title_name: None,
            chapter_name: None,
            section_name: Some("Test section".to_string()),
            full_text: text.to_string(),
            effective_date: None,
            last_amended: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rule(set: RuleSet, number: &str, text: &str) -> RuleDocument {
        RuleDocument {
            rule_set: set,
            rule_number: number.to_string(),
            rule_name: None,
            full_text: text.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_is_idempotent_with_synchronized_index() {
        let (_dir, store) = open_store(false);
        let record = section("9A.36.011", "Assault in the first degree.");

        store.upsert_section(Family::Statutes, &record).unwrap();
        store.upsert_section(Family::Statutes, &record).unwrap();

        let reader = store.reader();
        assert_eq!(reader.section_keys(Family::Statutes, None).unwrap().len(), 1);
        assert_eq!(reader.search_doc_count(Family::Statutes), 1);

        let docs = reader.search_docs(Family::Statutes).unwrap();
        assert_eq!(docs[0].key, "9A.36.011");
    }

    #[test]
    fn overwrite_updates_body_and_index_without_duplicates() {
        let (_dir, store) = open_store(false);
        let first = section("9A.36.011", "Original body.");
        store.upsert_section(Family::Statutes, &first).unwrap();

        let created = store
            .reader()
            .get_section(Family::Statutes, "9A.36.011")
            .unwrap()
            .unwrap()
            .created_at;

        let second = section("9A.36.011", "Amended body.");
        store.upsert_section(Family::Statutes, &second).unwrap();

        let reader = store.reader();
        let stored = reader
            .get_section(Family::Statutes, "9A.36.011")
            .unwrap()
            .unwrap();
        assert_eq!(stored.full_text, "Amended body.");
        assert_eq!(stored.created_at, created);
        assert_eq!(reader.search_doc_count(Family::Statutes), 1);
        assert!(reader.search_docs(Family::Statutes).unwrap()[0]
            .text
            .contains("Amended"));
    }

    #[test]
    fn rejects_empty_body_before_persistence() {
        let (_dir, store) = open_store(false);
        let record = section("9A.36.011", "   ");
        let err = store.upsert_section(Family::Statutes, &record).unwrap_err();
        assert!(matches!(err, CorpusError::Constraint { .. }));
        assert_eq!(store.reader().section_keys(Family::Statutes, None).unwrap().len(), 0);
    }

    #[test]
    fn rule_reingestion_overwrites_single_row() {
        let (_dir, store) = open_store(false);
        store
            .upsert_rule(&rule(RuleSet::Crlj, "1.1", "Scope of rules."))
            .unwrap();
        store
            .upsert_rule(&rule(RuleSet::Crlj, "1.1", "Scope of rules, amended."))
            .unwrap();

        let reader = store.reader();
        let rules = reader.rules(Some(RuleSet::Crlj)).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].full_text, "Scope of rules, amended.");
        assert_eq!(reader.search_doc_count(Family::CourtRules), 1);
    }

    #[test]
    fn rule_sets_do_not_collide() {
        let (_dir, store) = open_store(false);
        store.upsert_rule(&rule(RuleSet::Crlj, "1.1", "CRLJ body")).unwrap();
        store.upsert_rule(&rule(RuleSet::Cr, "1.1", "CR body")).unwrap();

        let reader = store.reader();
        assert_eq!(reader.rules(None).unwrap().len(), 2);
        assert_eq!(reader.rules(Some(RuleSet::Cr)).unwrap().len(), 1);
    }

    #[test]
    fn prefix_scan_bounds_hierarchy() {
        let (_dir, store) = open_store(false);
        for cite in ["9A.36.011", "9A.36.021", "9A.40.010", "10.01.010"] {
            store
                .upsert_section(Family::Statutes, &section(cite, "text"))
                .unwrap();
        }
        let reader = store.reader();
        let chapter = reader.section_keys(Family::Statutes, Some("9A.36.")).unwrap();
        assert_eq!(chapter, vec!["9A.36.011", "9A.36.021"]);
    }

    #[test]
    fn compressed_records_round_trip() {
        let (_dir, store) = open_store(true);
        let record = section("9A.36.011", &"long body text ".repeat(200));
        store.upsert_section(Family::Statutes, &record).unwrap();

        let stored = store
            .reader()
            .get_section(Family::Statutes, "9A.36.011")
            .unwrap()
            .unwrap();
        assert_eq!(stored.full_text, record.full_text);
    }

    #[test]
    fn progress_ledger_round_trips() {
        let (_dir, store) = open_store(false);
        store
            .set_progress(Family::Statutes, "9A.36", CrawlStatus::Error, Some("timeout".into()))
            .unwrap();
        let record = store
            .reader()
            .get_progress(Family::Statutes, "9A.36")
            .unwrap()
            .unwrap();
        assert_eq!(record.status, CrawlStatus::Error);
        assert_eq!(record.message.as_deref(), Some("timeout"));
        assert!(store.reader().get_progress(Family::Statutes, "9A.40").unwrap().is_none());
    }

    #[test]
    fn stats_reflect_counts_and_last_upsert() {
        let (_dir, store) = open_store(false);
        let reader = store.reader();
        assert!(reader.stats().unwrap().last_upsert.is_none());

        store
            .upsert_section(Family::Statutes, &section("9A.36.011", "text"))
            .unwrap();
        store.upsert_rule(&rule(RuleSet::Rap, "18.1a", "fees")).unwrap();

        let stats = reader.stats().unwrap();
        assert_eq!(stats.statute_sections, 1);
        assert_eq!(stats.admin_code_sections, 0);
        assert_eq!(stats.court_rules, 1);
        assert!(stats.last_upsert.is_some());
    }
}
