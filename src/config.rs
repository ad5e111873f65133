//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the corpus engine, supporting a TOML file,
//! environment-variable overrides, and validated type-safe access to all
//! system settings.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file (TOML), environment variables
//! - **Output**: Validated configuration structs with defaults and overrides
//! - **Validation**: Range checks, dependency verification
//!
//! ## Configuration Sources (in order of precedence)
//! 1. Environment variables (`LEGAL_CORPUS_*`)
//! 2. Configuration file
//! 3. Default values

use crate::errors::{CorpusError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote source settings per document family
    pub sources: SourcesConfig,
    /// Crawl politeness and concurrency settings
    pub crawler: CrawlerConfig,
    /// Storage and database settings
    pub storage: StorageConfig,
    /// Search behavior
    pub search: SearchConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// Remote source endpoints, one block per family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Statute (Revised Code) source
    pub statutes: HtmlSourceConfig,
    /// Administrative-code source
    pub admin_code: HtmlSourceConfig,
    /// Court-rule source
    pub court_rules: RuleSourceConfig,
}

/// An HTML listing/detail source with dotted citations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlSourceConfig {
    /// Base URL of the listing and detail pages
    pub base_url: String,
    /// Family tag prefixed to citations on detail pages, e.g. `RCW`
    pub tag: String,
    /// Titles to crawl; empty means discover all from the index page
    pub titles: Vec<String>,
}

/// The court-rules source, shared by all rule sets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSourceConfig {
    /// Base URL of the rule listing pages and PDFs
    pub base_url: String,
    /// Rule-set tags to crawl; empty means all known sets
    pub rule_sets: Vec<String>,
}

/// Crawl politeness and concurrency configuration. The delay floor is an
/// external-courtesy constraint, not a tuning knob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Global cap on simultaneous in-flight requests
    pub max_concurrent_requests: usize,
    /// Minimum delay between requests, milliseconds
    pub min_request_delay_ms: u64,
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

/// Storage and database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database directory path
    pub db_path: PathBuf,
    /// Compress body text at rest
    pub enable_compression: bool,
}

/// Search behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Result limit when the caller does not supply one
    pub default_limit: usize,
    /// Width of the matched-text excerpt in characters
    pub excerpt_chars: usize,
    /// Minimum query length
    pub min_query_length: usize,
    /// Maximum query length
    pub max_query_length: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Config {
    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load configuration from a specific file. A missing file is not an
    /// error; defaults apply.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| CorpusError::Config {
                message: format!("Failed to read config file {:?}: {}", path, e),
            })?;
            toml::from_str(&content)?
        } else {
            tracing::warn!("Configuration file not found: {:?}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(db_path) = std::env::var("LEGAL_CORPUS_DB_PATH") {
            self.storage.db_path = PathBuf::from(db_path);
        }
        if let Ok(delay) = std::env::var("LEGAL_CORPUS_MIN_DELAY_MS") {
            self.crawler.min_request_delay_ms =
                delay.parse().map_err(|_| CorpusError::Config {
                    message: "Invalid value in LEGAL_CORPUS_MIN_DELAY_MS".to_string(),
                })?;
        }
        if let Ok(level) = std::env::var("LEGAL_CORPUS_LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.crawler.max_concurrent_requests == 0 {
            return Err(CorpusError::Config {
                message: "crawler.max_concurrent_requests must be at least 1".to_string(),
            });
        }
        if self.crawler.max_concurrent_requests > 3 {
            return Err(CorpusError::Config {
                message: "crawler.max_concurrent_requests above 3 is not polite to the sources"
                    .to_string(),
            });
        }
        if self.search.min_query_length > self.search.max_query_length {
            return Err(CorpusError::Config {
                message: "search.min_query_length cannot exceed max_query_length".to_string(),
            });
        }
        if self.search.default_limit == 0 {
            return Err(CorpusError::Config {
                message: "search.default_limit must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourcesConfig {
                statutes: HtmlSourceConfig {
                    base_url: "https://app.leg.wa.gov/RCW/default.aspx".to_string(),
                    tag: "RCW".to_string(),
                    titles: Vec::new(),
                },
                admin_code: HtmlSourceConfig {
                    base_url: "https://app.leg.wa.gov/WAC/default.aspx".to_string(),
                    tag: "WAC".to_string(),
                    titles: Vec::new(),
                },
                court_rules: RuleSourceConfig {
                    base_url: "https://www.courts.wa.gov/court_rules".to_string(),
                    rule_sets: Vec::new(),
                },
            },
            crawler: CrawlerConfig {
                max_concurrent_requests: 2,
                min_request_delay_ms: 500,
                timeout_seconds: 30,
                user_agent: "legal-corpus-search/0.1".to_string(),
            },
            storage: StorageConfig {
                db_path: PathBuf::from("./data/legal_corpus.db"),
                enable_compression: true,
            },
            search: SearchConfig {
                default_limit: 20,
                excerpt_chars: 240,
                min_query_length: 2,
                max_query_length: 1000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_impolite_concurrency() {
        let mut config = Config::default();
        config.crawler.max_concurrent_requests = 16;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_limit() {
        let mut config = Config::default();
        config.search.default_limit = 0;
        assert!(config.validate().is_err());
    }
}
