use std::time::{Duration, Instant};

use async_trait::async_trait;
use sitewatch_core::FetchError;
use tracing::debug;

use crate::Fetcher;
use crate::browser::{Browser, BrowserFailure};
use crate::extract::{parse_selector, select_text};

/// Virtual-time budgets tried in order until the selector shows up in the DOM.
const RENDER_BUDGETS_MS: &[u64] = &[1_000, 4_000, 10_000];

/// Fetches through a headless browser so script-generated content is visible.
#[derive(Debug, Clone)]
pub struct RenderedFetcher {
    browser: Browser,
    timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(browser: Browser, timeout_secs: u64) -> Self {
        Self::with_timeout(browser, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(browser: Browser, timeout: Duration) -> Self {
        Self { browser, timeout }
    }

    fn timeout_error(&self, url: &str) -> FetchError {
        FetchError::Timeout {
            url: url.to_string(),
            secs: self.timeout.as_secs(),
        }
    }
}

#[async_trait]
impl Fetcher for RenderedFetcher {
    /// Wait for `selector` by re-rendering with a growing budget, all within
    /// one overall deadline.
    async fn fetch(&self, url: &str, selector: &str) -> Result<String, FetchError> {
        let parsed = parse_selector(selector)?;
        let deadline = Instant::now() + self.timeout;

        for &budget_ms in RENDER_BUDGETS_MS {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timeout_error(url));
            }

            let dom = self
                .browser
                .dump_dom(url, budget_ms, remaining)
                .await
                .map_err(|failure| match failure {
                    BrowserFailure::Timeout => self.timeout_error(url),
                    BrowserFailure::Failed(message) => FetchError::Browser {
                        url: url.to_string(),
                        message,
                    },
                })?;

            if let Some(text) = select_text(&dom, &parsed) {
                return Ok(text);
            }
            debug!(url, selector, budget_ms, "Selector not rendered yet");
        }

        Err(FetchError::SelectorNotFound {
            url: url.to_string(),
            selector: selector.to_string(),
        })
    }
}
