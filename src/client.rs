//! # Source Client Module
//!
//! ## Purpose
//! The single point of outbound I/O. Issues rate-limited HTTP fetches for
//! listing pages, detail pages, and binary PDF documents, under a global
//! concurrency cap and a minimum inter-request delay. Failures surface to
//! the caller unretried; retry policy belongs to the orchestrator.
//!
//! ## Input/Output Specification
//! - **Input**: Absolute URLs
//! - **Output**: Response bodies as text or bytes
//! - **Politeness**: Small concurrency cap plus a delay floor between
//!   requests; this is an external-courtesy constraint, not a tuning knob

use crate::config::CrawlerConfig;
use crate::errors::{CorpusError, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{sleep, Duration, Instant};

/// Enforces the minimum spacing between request starts. Held across the
/// sleep so concurrent callers queue behind the same clock.
struct RateLimiter {
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: None,
        }
    }

    async fn enforce(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                sleep(self.min_delay - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Rate-limited HTTP client shared by all crawl sources.
pub struct SourceClient {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    limiter: Mutex<RateLimiter>,
}

impl SourceClient {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CorpusError::Config {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            limiter: Mutex::new(RateLimiter::new(Duration::from_millis(
                config.min_request_delay_ms,
            ))),
        })
    }

    /// Fetch a text body (listing or detail page).
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response.text().await.map_err(|e| CorpusError::Fetch {
            url: url.to_string(),
            details: e.to_string(),
        })
    }

    /// Fetch a binary body (PDF document).
    pub async fn fetch_binary(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|e| CorpusError::Fetch {
            url: url.to_string(),
            details: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| CorpusError::Internal {
                message: format!("Request semaphore closed: {}", e),
            })?;

        self.limiter.lock().await.enforce().await;

        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CorpusError::Fetch {
                url: url.to_string(),
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CorpusError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}
