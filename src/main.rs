//! # Legal Corpus CLI Driver
//!
//! ## Purpose
//! Thin command-line shell around the corpus engine: loads configuration,
//! initializes logging, opens the document store, and dispatches to the
//! crawl or query entry points. All query operations print a found record,
//! a not-found line, or an error string; nothing panics past this boundary.
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open the document store (the only startup-fatal step)
//! 4. Run the requested subcommand
//! 5. Close the store

use clap::{Arg, ArgAction, Command};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use legal_corpus_search::{
    citation::DottedCitation,
    client::SourceClient,
    config::Config,
    crawl::{sources_from_config, Crawler},
    query::QueryEngine,
    store::DocumentStore,
    utils, Family, RuleSet,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = Command::new("legal-corpus")
        .version("0.1.0")
        .author("Legal Search Team")
        .about("Legal corpus crawler and offline search engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .subcommand(
            Command::new("crawl")
                .about("Crawl the configured sources into the store")
                .arg(
                    Arg::new("family")
                        .long("family")
                        .value_name("TAG")
                        .help("Crawl only this family (RCW, WAC, rule)"),
                ),
        )
        .subcommand(
            Command::new("lookup")
                .about("Look up a statute or administrative-code section")
                .arg(Arg::new("family").required(true).help("Family tag: RCW or WAC"))
                .arg(Arg::new("citation").required(true).help("Dotted citation, e.g. 9A.36.011")),
        )
        .subcommand(
            Command::new("rule")
                .about("Look up a court rule")
                .arg(Arg::new("set").required(true).help("Rule set tag, e.g. CRLJ"))
                .arg(Arg::new("number").required(true).help("Rule number, e.g. 1.1")),
        )
        .subcommand(
            Command::new("rules")
                .about("List court rules")
                .arg(Arg::new("set").long("set").value_name("TAG").help("Only this rule set")),
        )
        .subcommand(
            Command::new("browse")
                .about("Browse titles, chapters, or sections")
                .arg(Arg::new("family").required(true).help("Family tag: RCW or WAC"))
                .arg(Arg::new("parent").help("Title or chapter to expand; omit for all titles")),
        )
        .subcommand(
            Command::new("search")
                .about("Ranked full-text search across all families")
                .arg(Arg::new("query").required(true).num_args(1..).help("Query terms"))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_name("N")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum number of results"),
                ),
        )
        .subcommand(Command::new("stats").about("Per-family counts and last update"))
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Debug-level logging")
                .global(true),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = Config::from_file(config_path)?;

    let level = if matches.get_flag("verbose") {
        "debug"
    } else {
        &config.logging.level
    };
    init_logging(level);

    let store = DocumentStore::open(&config.storage)?;

    match matches.subcommand() {
        Some(("crawl", sub)) => {
            let only = sub
                .get_one::<String>("family")
                .map(|tag| {
                    Family::from_tag(tag).ok_or_else(|| anyhow::anyhow!("unknown family: {}", tag))
                })
                .transpose()?;

            let client = SourceClient::new(&config.crawler)?;
            let store = Arc::new(store);
            let crawler = Crawler::new(
                client,
                store.clone(),
                config.crawler.max_concurrent_requests,
            );

            let sources = sources_from_config(&config.sources);
            let selected: Vec<_> = sources
                .into_iter()
                .filter(|s| only.map(|f| s.family() == f).unwrap_or(true))
                .collect();

            let start = Instant::now();
            let stats = crawler.run_all(&selected).await;
            println!(
                "Crawl finished in {}: {} units ({} completed, {} failed), {} items stored, {} failed, {} short",
                utils::format_duration(start.elapsed()),
                stats.units_total,
                stats.units_completed,
                stats.units_failed,
                stats.items_stored,
                stats.items_failed,
                stats.items_short_text
            );

            drop(crawler);
            match Arc::try_unwrap(store) {
                Ok(store) => store.close()?,
                Err(_) => tracing::warn!("Store still shared at shutdown; skipping explicit close"),
            }
            return Ok(());
        }
        Some(("lookup", sub)) => {
            let engine = QueryEngine::new(store.reader(), config.search.clone());
            let family = parse_section_family(sub.get_one::<String>("family").unwrap())?;
            let citation = sub.get_one::<String>("citation").unwrap();
            match engine.get_section(family, citation)? {
                Some(section) => {
                    println!(
                        "{} {}  {}",
                        family.tag(),
                        section.citation,
                        section.section_name.as_deref().unwrap_or("")
                    );
                    if let Some(date) = &section.effective_date {
                        println!("Effective: {}", date);
                    }
                    println!("\n{}", section.full_text);
                }
                None => println!("{} {} not found", family.tag(), citation),
            }
        }
        Some(("rule", sub)) => {
            let engine = QueryEngine::new(store.reader(), config.search.clone());
            let tag = sub.get_one::<String>("set").unwrap();
            let set = RuleSet::from_tag(tag)
                .ok_or_else(|| anyhow::anyhow!("unknown rule set: {}", tag))?;
            let number = sub.get_one::<String>("number").unwrap();
            match engine.get_rule(set, number)? {
                Some(rule) => {
                    println!(
                        "{} {}  {}",
                        rule.rule_set.tag(),
                        rule.rule_number,
                        rule.rule_name.as_deref().unwrap_or("")
                    );
                    println!("\n{}", rule.full_text);
                }
                None => println!("{} {} not found", set.tag(), number),
            }
        }
        Some(("rules", sub)) => {
            let engine = QueryEngine::new(store.reader(), config.search.clone());
            let set = match sub.get_one::<String>("set") {
                Some(tag) => Some(
                    RuleSet::from_tag(tag)
                        .ok_or_else(|| anyhow::anyhow!("unknown rule set: {}", tag))?,
                ),
                None => None,
            };
            for rule in engine.list_rules(set)? {
                println!(
                    "{} {}  {}",
                    rule.rule_set.tag(),
                    rule.rule_number,
                    rule.rule_name.as_deref().unwrap_or("")
                );
            }
        }
        Some(("browse", sub)) => {
            let engine = QueryEngine::new(store.reader(), config.search.clone());
            let family = parse_section_family(sub.get_one::<String>("family").unwrap())?;
            match sub.get_one::<String>("parent") {
                None => {
                    for title in engine.list_titles(family)? {
                        println!("Title {}", title);
                    }
                }
                Some(parent) => {
                    let depth = DottedCitation::parse(parent)
                        .map(|c| c.depth())
                        .map_err(|e| anyhow::anyhow!("{}", e))?;
                    if depth == 1 {
                        for chapter in engine.list_chapters(family, parent)? {
                            println!("Chapter {}", chapter);
                        }
                    } else {
                        for section in engine.list_sections(family, parent)? {
                            println!(
                                "{} {}  {}",
                                family.tag(),
                                section.citation,
                                section.section_name.as_deref().unwrap_or("")
                            );
                        }
                    }
                }
            }
        }
        Some(("search", sub)) => {
            let engine = QueryEngine::new(store.reader(), config.search.clone());
            let query = sub
                .get_many::<String>("query")
                .unwrap()
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            let limit = sub.get_one::<usize>("limit").copied();
            let hits = engine.search(&query, limit)?;
            if hits.is_empty() {
                println!("No matches for '{}'", query);
            }
            for hit in hits {
                println!(
                    "{:8.3}  {}  {}",
                    hit.score,
                    hit.display,
                    hit.name.as_deref().unwrap_or("")
                );
                println!("          {}", utils::truncate(&hit.excerpt, 160));
            }
        }
        Some(("stats", _)) => {
            let engine = QueryEngine::new(store.reader(), config.search.clone());
            let stats = engine.statistics()?;
            println!("Statute sections:     {}", stats.statute_sections);
            println!("Admin-code sections:  {}", stats.admin_code_sections);
            println!("Court rules:          {}", stats.court_rules);
            match stats.last_upsert {
                Some(when) => println!("Last update:          {}", when.to_rfc3339()),
                None => println!("Last update:          never"),
            }
        }
        _ => {
            anyhow::bail!("No subcommand given; try 'legal-corpus --help'");
        }
    }

    store.close()?;
    Ok(())
}

fn parse_section_family(tag: &str) -> anyhow::Result<Family> {
    match Family::from_tag(tag) {
        Some(Family::CourtRules) | None => {
            anyhow::bail!("expected a sectioned family tag (RCW or WAC), got: {}", tag)
        }
        Some(family) => Ok(family),
    }
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();
}
