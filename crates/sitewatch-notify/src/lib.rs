//! Change notifications.
//!
//! The transport is chosen once from `[notify]` in the config file and
//! injected into the scheduler as an `Arc<dyn Notifier>`.

mod command;
mod log;
mod webhook;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sitewatch_config::NotifyConfig;
use sitewatch_core::NotifyError;

pub use command::CommandNotifier;
pub use log::LogNotifier;
pub use webhook::WebhookNotifier;

pub const SUBJECT: &str = "Website Change Detected";

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, url: &str, message: &str) -> Result<(), NotifyError>;
}

/// Body of every change notification.
pub fn format_message(url: &str, old_text: &str, new_text: &str, diff: &str) -> String {
    format!("Change detected!\n\nURL: {url}\n\nOld:\n{old_text}\n\nNew:\n{new_text}\n\nDiff:\n{diff}")
}

pub fn build_notifier(config: &NotifyConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    let notifier: Arc<dyn Notifier> = match config {
        NotifyConfig::Log => Arc::new(LogNotifier),
        NotifyConfig::Webhook {
            url,
            bearer_token,
            timeout_secs,
        } => Arc::new(WebhookNotifier::new(
            url,
            bearer_token.clone(),
            Duration::from_secs(*timeout_secs),
        )?),
        NotifyConfig::Command {
            command,
            timeout_secs,
        } => Arc::new(CommandNotifier::new(
            command,
            Duration::from_secs(*timeout_secs),
        )),
    };
    Ok(notifier)
}
