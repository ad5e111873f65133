//! # Crawl Orchestration Module
//!
//! ## Purpose
//! Drives discovery → fetch → extract → normalize → upsert for one document
//! family at a time through a per-family strategy object. One listing
//! unit's children are fetched with bounded concurrency under the source
//! client's politeness policy; a failure on one item is caught, logged with
//! family and identifier context, and never aborts the remaining items.
//!
//! ## Input/Output Specification
//! - **Input**: `FamilySource` strategies, the shared source client, the store
//! - **Output**: Upserted records, progress-ledger entries, run statistics
//! - **Workflow**: Discover units → discover items → fetch/extract → upsert
//!
//! ## Key Features
//! - One generic pipeline instead of one scraper per source
//! - Per-item failure isolation; re-runs are safe because upsert is idempotent
//! - Progress ledger distinguishes unattempted, failed, and completed units

pub mod sources;

pub use sources::{sources_from_config, CorpusRecord, FamilySource};

use crate::client::SourceClient;
use crate::errors::Result;
use crate::extract::MIN_BODY_CHARS;
use crate::store::{CrawlStatus, DocumentStore};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of one item's trip through the pipeline.
enum ItemOutcome {
    Stored,
    StoredShort,
    Failed,
}

/// Run statistics for one family crawl (or an aggregate over families).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlStats {
    pub units_total: usize,
    pub units_completed: usize,
    pub units_failed: usize,
    pub items_discovered: usize,
    pub items_stored: usize,
    pub items_failed: usize,
    /// Stored, but with suspiciously little text
    pub items_short_text: usize,
}

impl CrawlStats {
    fn absorb(&mut self, other: &CrawlStats) {
        self.units_total += other.units_total;
        self.units_completed += other.units_completed;
        self.units_failed += other.units_failed;
        self.items_discovered += other.items_discovered;
        self.items_stored += other.items_stored;
        self.items_failed += other.items_failed;
        self.items_short_text += other.items_short_text;
    }
}

/// The generic crawl orchestrator. Single writer to the store for the
/// duration of a run; readers may query concurrently at any time.
pub struct Crawler {
    client: SourceClient,
    store: Arc<DocumentStore>,
    item_concurrency: usize,
}

impl Crawler {
    pub fn new(client: SourceClient, store: Arc<DocumentStore>, item_concurrency: usize) -> Self {
        Self {
            client,
            store,
            item_concurrency: item_concurrency.max(1),
        }
    }

    /// Crawl every family in turn. A family-level failure (discovery, dead
    /// source) is logged and the next family proceeds.
    pub async fn run_all(&self, family_sources: &[Box<dyn FamilySource>]) -> CrawlStats {
        let mut total = CrawlStats::default();
        for source in family_sources {
            match self.run(source.as_ref()).await {
                Ok(stats) => total.absorb(&stats),
                Err(e) => {
                    tracing::error!("Crawl of {} aborted: {}", source.label(), e);
                }
            }
        }
        total
    }

    /// Crawl one family: discover its units, then process each unit's items
    /// with bounded concurrency. Units are walked in the canonical order the
    /// source returned them; item completion order is unspecified.
    pub async fn run(&self, source: &dyn FamilySource) -> Result<CrawlStats> {
        let family = source.family();
        let start = Instant::now();
        tracing::info!("Starting crawl of {} ({})", family, source.label());

        let units = source.discover_units(&self.client).await?;
        tracing::info!("{}: discovered {} units", source.label(), units.len());

        let mut stats = CrawlStats {
            units_total: units.len(),
            ..CrawlStats::default()
        };

        for unit in &units {
            self.store
                .set_progress(family, &unit.id, CrawlStatus::Pending, None)?;

            match self.crawl_unit(source, unit, &mut stats).await {
                Ok(0) => {
                    self.store
                        .set_progress(family, &unit.id, CrawlStatus::Completed, None)?;
                    stats.units_completed += 1;
                }
                Ok(failed) => {
                    self.store.set_progress(
                        family,
                        &unit.id,
                        CrawlStatus::Error,
                        Some(format!("{} item(s) failed", failed)),
                    )?;
                    stats.units_failed += 1;
                }
                Err(e) => {
                    tracing::error!("{} {}: unit failed: {}", source.label(), unit.id, e);
                    self.store.set_progress(
                        family,
                        &unit.id,
                        CrawlStatus::Error,
                        Some(e.to_string()),
                    )?;
                    stats.units_failed += 1;
                }
            }
        }

        tracing::info!(
            "{}: crawl finished in {:.1}s: {}/{} units completed, {} items stored, {} failed",
            source.label(),
            start.elapsed().as_secs_f64(),
            stats.units_completed,
            stats.units_total,
            stats.items_stored,
            stats.items_failed
        );
        Ok(stats)
    }

    /// Process one unit's items. Returns the number of failed items; a
    /// discovery failure for the unit itself propagates as an error.
    async fn crawl_unit(
        &self,
        source: &dyn FamilySource,
        unit: &sources::CrawlUnit,
        stats: &mut CrawlStats,
    ) -> Result<usize> {
        let items = source.discover_items(&self.client, unit).await?;
        tracing::debug!("{} {}: {} items", source.label(), unit.id, items.len());
        stats.items_discovered += items.len();

        let outcomes: Vec<ItemOutcome> = stream::iter(items.into_iter().map(|item| {
            let client = &self.client;
            let store = &self.store;
            async move {
                let record = match source.fetch_item(client, &item).await {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::error!("{} {}: {}", source.label(), item.id, e);
                        return ItemOutcome::Failed;
                    }
                };

                let short = record.body_len() < MIN_BODY_CHARS;
                if short {
                    // Absence of text must not silently drop a citation
                    tracing::warn!(
                        "{}: extracted only {} chars, storing anyway",
                        record.key(),
                        record.body_len()
                    );
                }

                let stored = match &record {
                    CorpusRecord::Section(family, section) => {
                        store.upsert_section(*family, section)
                    }
                    CorpusRecord::Rule(rule) => store.upsert_rule(rule),
                };
                match stored {
                    Ok(()) if short => ItemOutcome::StoredShort,
                    Ok(()) => ItemOutcome::Stored,
                    Err(e) => {
                        tracing::error!("{}: store rejected record: {}", record.key(), e);
                        ItemOutcome::Failed
                    }
                }
            }
        }))
        .buffer_unordered(self.item_concurrency)
        .collect()
        .await;

        let mut failed = 0;
        for outcome in outcomes {
            match outcome {
                ItemOutcome::Stored => stats.items_stored += 1,
                ItemOutcome::StoredShort => {
                    stats.items_stored += 1;
                    stats.items_short_text += 1;
                }
                ItemOutcome::Failed => {
                    stats.items_failed += 1;
                    failed += 1;
                }
            }
        }
        Ok(failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CrawlerConfig, HtmlSourceConfig, RuleSourceConfig, StorageConfig};
    use crate::crawl::sources::{RuleSource, StatuteHtmlSource};
    use crate::store::CrawlStatus;
    use crate::{Family, RuleSet};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn crawler(store: Arc<DocumentStore>) -> Crawler {
        let client = SourceClient::new(&CrawlerConfig {
            max_concurrent_requests: 2,
            min_request_delay_ms: 0,
            timeout_seconds: 5,
            user_agent: "legal-corpus-search-test".to_string(),
        })
        .unwrap();
        Crawler::new(client, store, 2)
    }

    fn open_store(dir: &TempDir) -> Arc<DocumentStore> {
        Arc::new(
            DocumentStore::open(&StorageConfig {
                db_path: dir.path().join("corpus.db"),
                enable_compression: false,
            })
            .unwrap(),
        )
    }

    fn listing(anchors: &[(&str, &str)]) -> String {
        let rows: String = anchors
            .iter()
            .map(|(href, text)| format!(r#"<a href="{}">{}</a>"#, href, text))
            .collect();
        format!("<html><body><div id=\"content\">{}</div></body></html>", rows)
    }

    fn detail(tag: &str, cite: &str, body: &str) -> String {
        format!(
            "<html><body><nav>Site chrome</nav><div id=\"contentWrapper\">{} {} {}</div></body></html>",
            tag, cite, body
        )
    }

    #[tokio::test]
    async fn crawls_statute_family_with_item_isolation() {
        let server = MockServer::start().await;
        let base = format!("{}/RCW/default.aspx", server.uri());

        // Title 9A lists two chapters
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[
                ("default.aspx?cite=9A.36", "9A.36 Assault"),
                ("default.aspx?cite=9A.40", "9A.40 Kidnapping"),
            ])))
            .mount(&server)
            .await;

        // Chapter 9A.36: one good section, one that will 500
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A.36"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[
                ("default.aspx?cite=9A.36.011", "9A.36.011 Assault in the first degree."),
                ("default.aspx?cite=9A.36.021", "9A.36.021 Assault in the second degree."),
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A.36.011"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail(
                "RCW",
                "9A.36.011",
                "Assault in the first degree. A person is guilty of assault in the first degree...",
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A.36.021"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        // Chapter 9A.40: one good section
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A.40"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[(
                "default.aspx?cite=9A.40.010",
                "9A.40.010 Definitions.",
            )])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A.40.010"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail(
                "RCW",
                "9A.40.010",
                "Definitions. The following definitions apply throughout this chapter...",
            )))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let source = StatuteHtmlSource::new(
            Family::Statutes,
            HtmlSourceConfig {
                base_url: base,
                tag: "RCW".to_string(),
                titles: vec!["9A".to_string()],
            },
        );

        let stats = crawler(store.clone()).run(&source).await.unwrap();
        assert_eq!(stats.units_total, 2);
        assert_eq!(stats.units_completed, 1);
        assert_eq!(stats.units_failed, 1);
        assert_eq!(stats.items_stored, 2);
        assert_eq!(stats.items_failed, 1);

        let reader = store.reader();
        let stored = reader
            .get_section(Family::Statutes, "9A.36.011")
            .unwrap()
            .unwrap();
        assert!(stored.full_text.starts_with("RCW 9A.36.011"));
        assert_eq!(stored.chapter_num, "9A.36");
        assert!(reader.get_section(Family::Statutes, "9A.36.021").unwrap().is_none());

        // Progress distinguishes the failed chapter from the completed one
        let failed_unit = reader.get_progress(Family::Statutes, "9A.36").unwrap().unwrap();
        assert_eq!(failed_unit.status, CrawlStatus::Error);
        let done_unit = reader.get_progress(Family::Statutes, "9A.40").unwrap().unwrap();
        assert_eq!(done_unit.status, CrawlStatus::Completed);
    }

    #[tokio::test]
    async fn rerun_overwrites_without_duplicates() {
        let server = MockServer::start().await;
        let base = format!("{}/RCW/default.aspx", server.uri());

        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[(
                "default.aspx?cite=9A.36",
                "9A.36 Assault",
            )])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A.36"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[(
                "default.aspx?cite=9A.36.011",
                "9A.36.011 Assault in the first degree.",
            )])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/RCW/default.aspx"))
            .and(query_param("cite", "9A.36.011"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail(
                "RCW",
                "9A.36.011",
                "Assault in the first degree body text that is long enough to not warn.",
            )))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let source = StatuteHtmlSource::new(
            Family::Statutes,
            HtmlSourceConfig {
                base_url: base,
                tag: "RCW".to_string(),
                titles: vec!["9A".to_string()],
            },
        );

        let crawler = crawler(store.clone());
        crawler.run(&source).await.unwrap();
        crawler.run(&source).await.unwrap();

        let reader = store.reader();
        assert_eq!(reader.section_keys(Family::Statutes, None).unwrap().len(), 1);
        assert_eq!(reader.search_doc_count(Family::Statutes), 1);
    }

    #[tokio::test]
    async fn crawls_html_rule_set() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/court_rules/list.aspx"))
            .and(query_param("set", "CR"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing(&[
                ("display.aspx?set=CR&ruleid=56", "CR 56 Summary Judgment"),
                ("display.aspx?set=CR&ruleid=11", "CR 11 Signing of Pleadings"),
            ])))
            .mount(&server)
            .await;
        for (ruleid, number, body) in [
            ("56", "56.0", "Summary judgment may be rendered when there is no genuine issue..."),
            ("11", "11.0", "Every pleading, motion, and legal memorandum shall be dated and signed..."),
        ] {
            Mock::given(method("GET"))
                .and(path("/court_rules/display.aspx"))
                .and(query_param("set", "CR"))
                .and(query_param("ruleid", ruleid))
                .respond_with(ResponseTemplate::new(200)
                    .set_body_string(detail("CR", number, body)))
                .mount(&server)
                .await;
        }

        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let source = RuleSource::new(
            RuleSet::Cr,
            RuleSourceConfig {
                base_url: format!("{}/court_rules", server.uri()),
                rule_sets: Vec::new(),
            },
        );

        let stats = crawler(store.clone()).run(&source).await.unwrap();
        assert_eq!(stats.units_total, 1);
        assert_eq!(stats.units_completed, 1);
        assert_eq!(stats.items_stored, 2);

        let reader = store.reader();
        let rule = reader.get_rule(RuleSet::Cr, "56.0").unwrap().unwrap();
        assert_eq!(rule.rule_name.as_deref(), Some("Summary Judgment"));
        assert!(rule.full_text.contains("genuine issue"));
    }
}
