//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the corpus engine, providing structured
//! error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from crawling, extraction, storage, queries
//! - **Output**: Structured error types with context and error chains
//! - **Error Categories**: Fetch, Parse, Storage, Configuration, Query
//!
//! ## Key Features
//! - Variant-per-failure-mode with detailed context
//! - Automatic conversion from library error types
//! - Recoverability classification for the crawl loop
//! - Structured logging integration

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, CorpusError>;

/// Error types for the legal corpus engine
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Network-level fetch failures (timeout, connection, transport)
    #[error("Fetch failed for {url}: {details}")]
    Fetch { url: String, details: String },

    /// Non-2xx HTTP response
    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Listing or detail page did not match the expected shape
    #[error("Failed to parse {what} from {origin}: {details}")]
    Parse {
        what: String,
        origin: String,
        details: String,
    },

    /// Citation or rule-number text did not match the grammar
    #[error("Unrecognized citation '{raw}': {details}")]
    Citation { raw: String, details: String },

    /// PDF byte stream could not be decoded
    #[error("PDF decode failed for {origin}: {details}")]
    PdfDecode { origin: String, details: String },

    /// Record violated a storage constraint before persistence
    #[error("Constraint violation for {key}: {reason}")]
    Constraint { key: String, reason: String },

    /// Underlying database failure
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Value serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Invalid search query (too short, too long)
    #[error("Invalid query: {reason}")]
    Query { reason: String },

    /// Configuration load or validation failure
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal invariant breakage
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CorpusError {
    /// Whether a subsequent full run may succeed where this one failed.
    /// The crawler uses this only for log wording; no in-run retry happens.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CorpusError::Fetch { .. } | CorpusError::HttpStatus { .. }
        )
    }

    /// Error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            CorpusError::Fetch { .. } | CorpusError::HttpStatus { .. } => "fetch",
            CorpusError::Parse { .. }
            | CorpusError::Citation { .. }
            | CorpusError::PdfDecode { .. } => "parse",
            CorpusError::Constraint { .. }
            | CorpusError::Storage(_)
            | CorpusError::Serialization(_) => "storage",
            CorpusError::Query { .. } => "query",
            CorpusError::Config { .. } => "configuration",
            CorpusError::Io(_) | CorpusError::Internal { .. } => "system",
        }
    }
}

impl From<reqwest::Error> for CorpusError {
    fn from(err: reqwest::Error) -> Self {
        CorpusError::Fetch {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CorpusError {
    fn from(err: serde_json::Error) -> Self {
        CorpusError::Internal {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<toml::de::Error> for CorpusError {
    fn from(err: toml::de::Error) -> Self {
        CorpusError::Config {
            message: err.to_string(),
        }
    }
}
