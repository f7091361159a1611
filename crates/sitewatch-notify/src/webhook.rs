use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sitewatch_core::NotifyError;
use tracing::debug;

use crate::{Notifier, SUBJECT};

/// POSTs `{"url", "subject", "message"}` as JSON.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(
        endpoint: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bearer_token,
            timeout,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, url: &str, message: &str) -> Result<(), NotifyError> {
        let payload = serde_json::json!({
            "url": url,
            "subject": SUBJECT,
            "message": message,
        });

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                NotifyError::Timeout(self.timeout.as_secs())
            } else {
                NotifyError::Transport(format!("webhook request failed: {err}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Transport(format!(
                "webhook returned HTTP {}",
                status.as_u16()
            )));
        }
        debug!(url, endpoint = %self.endpoint, "Webhook delivered");
        Ok(())
    }
}
