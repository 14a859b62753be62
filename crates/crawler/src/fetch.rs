//! Board page fetching
//!
//! `PageFetcher` is the seam between the pipeline and the network. The HTTP
//! implementation is what the binary uses; `StaticFetcher` serves canned pages.

use async_trait::async_trait;
use noticewatch_common::config::HttpConfig;
use noticewatch_common::errors::{AppError, Result};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fetches the raw HTML of a board list page
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Body of `url`; non-2xx responses and network failures are transport errors
    async fn fetch(&self, source_name: &str, url: &str) -> Result<String>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, source_name: &str, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::transport(source_name, format!("request to {} timed out", url))
            } else {
                AppError::transport(source_name, format!("request to {} failed: {}", url, e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport {
                source_name: source_name.to_string(),
                message: format!("{} answered {}", url, status),
                status: Some(status.as_u16()),
            });
        }

        // Decodes using the charset in Content-Type, falling back to UTF-8
        let body = response.text().await.map_err(|e| {
            AppError::transport(source_name, format!("reading body of {} failed: {}", url, e))
        })?;

        debug!(bytes = body.len(), "Fetched board page");
        Ok(body)
    }
}

struct CannedPage {
    status: u16,
    body: String,
}

/// Serves pages from memory, keyed by URL
#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, CannedPage>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 for `url`
    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_status(url, 200, body)
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.pages.insert(
            url.into(),
            CannedPage {
                status,
                body: body.into(),
            },
        );
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, source_name: &str, url: &str) -> Result<String> {
        let page = self
            .pages
            .get(url)
            .ok_or_else(|| AppError::transport(source_name, format!("connection to {} refused", url)))?;

        if !(200..300).contains(&page.status) {
            return Err(AppError::Transport {
                source_name: source_name.to_string(),
                message: format!("{} answered {}", url, page.status),
                status: Some(page.status),
            });
        }

        Ok(page.body.clone())
    }
}
