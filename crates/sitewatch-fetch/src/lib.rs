//! Fetchers: turn `(url, selector)` into the current text of the selected fragment.
//!
//! Two strategies are provided and chosen per target:
//! - [`StaticFetcher`]: one HTTP GET, HTML parsed without running scripts.
//! - [`RenderedFetcher`]: a headless Chromium renders the page first.
//!
//! The same headless browser also backs [`ScreenshotCapture`], the evidence
//! provider used around confirmed changes.

pub mod browser;
pub mod evidence;
pub mod extract;
pub mod rendered;
pub mod static_fetch;

use std::sync::Arc;

use async_trait::async_trait;
use sitewatch_config::MonitorConfig;
use sitewatch_core::{FetchError, MonitorTarget};

pub use browser::Browser;
pub use evidence::{EvidenceLabel, EvidenceProvider, ScreenshotCapture};
pub use extract::{extract_text, parse_selector, validate_selector};
pub use rendered::RenderedFetcher;
pub use static_fetch::StaticFetcher;

/// Retrieves the trimmed text of the fragment matching `selector` at `url`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, selector: &str) -> Result<String, FetchError>;
}

/// The two fetch strategies, picked per target by `use_rendered_fetch`.
#[derive(Clone)]
pub struct FetcherSet {
    static_fetcher: Arc<dyn Fetcher>,
    rendered: Arc<dyn Fetcher>,
}

impl FetcherSet {
    pub fn new(static_fetcher: Arc<dyn Fetcher>, rendered: Arc<dyn Fetcher>) -> Self {
        Self {
            static_fetcher,
            rendered,
        }
    }

    /// Use one fetcher for both strategies (handy for tests and dry runs).
    pub fn uniform(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            static_fetcher: Arc::clone(&fetcher),
            rendered: fetcher,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> anyhow::Result<Self> {
        let static_fetcher = StaticFetcher::from_config(&config.fetch)?;
        let browser = Browser::from_config(&config.browser, &config.fetch.user_agent);
        let rendered = RenderedFetcher::new(browser, config.fetch.rendered_timeout_secs);
        Ok(Self::new(Arc::new(static_fetcher), Arc::new(rendered)))
    }

    pub fn for_target(&self, target: &MonitorTarget) -> &dyn Fetcher {
        if target.use_rendered_fetch {
            self.rendered.as_ref()
        } else {
            self.static_fetcher.as_ref()
        }
    }

    pub async fn fetch(&self, target: &MonitorTarget) -> Result<String, FetchError> {
        self.for_target(target)
            .fetch(&target.url, &target.selector)
            .await
    }
}
