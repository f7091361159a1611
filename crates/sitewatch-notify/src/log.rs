use async_trait::async_trait;
use sitewatch_core::NotifyError;

use crate::{Notifier, SUBJECT};

/// Reports changes through the process log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, url: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(url, subject = SUBJECT, "{message}");
        Ok(())
    }
}
