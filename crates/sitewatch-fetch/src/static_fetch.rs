use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sitewatch_config::FetchConfig;
use sitewatch_core::FetchError;
use tracing::debug;

use crate::Fetcher;
use crate::extract::{extract_text, parse_selector};

/// Plain HTTP GET + HTML parsing. Scripts on the page are not executed.
#[derive(Debug, Clone)]
pub struct StaticFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl StaticFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, timeout })
    }

    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        Self::new(Duration::from_secs(config.timeout_secs), &config.user_agent)
    }

    fn map_request_error(&self, url: &str, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                secs: self.timeout.as_secs(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str, selector: &str) -> Result<String, FetchError> {
        // Reject bad selectors before touching the network.
        parse_selector(selector)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| self.map_request_error(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| self.map_request_error(url, err))?;
        debug!(url, bytes = body.len(), "Fetched page");

        extract_text(&body, url, selector)
    }
}
