//! Screenshot evidence captured around confirmed changes.

use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use sitewatch_config::MonitorConfig;
use sitewatch_core::CaptureError;
use tracing::debug;

use crate::browser::{Browser, BrowserFailure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceLabel {
    Before,
    After,
}

impl EvidenceLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl std::fmt::Display for EvidenceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces a reference (a file path) to visual evidence of the page.
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    async fn capture(&self, url: &str, label: EvidenceLabel) -> Result<String, CaptureError>;
}

/// Full-page PNG screenshots written to `output_dir` as `{label}_{unix_nanos}.png`.
#[derive(Debug, Clone)]
pub struct ScreenshotCapture {
    browser: Browser,
    output_dir: PathBuf,
    window_size: String,
    settle_ms: u64,
    timeout: Duration,
}

impl ScreenshotCapture {
    pub fn new(
        browser: Browser,
        output_dir: impl Into<PathBuf>,
        window_size: impl Into<String>,
        settle_ms: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            browser,
            output_dir: output_dir.into(),
            window_size: window_size.into(),
            settle_ms,
            timeout,
        }
    }

    pub fn from_config(config: &MonitorConfig, screenshots_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Browser::from_config(&config.browser, &config.fetch.user_agent),
            screenshots_dir,
            config.evidence.window_size.clone(),
            config.evidence.settle_ms,
            Duration::from_secs(config.evidence.timeout_secs),
        )
    }

    fn output_path(&self, label: EvidenceLabel) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        self.output_dir
            .join(format!("{}_{nanos}.png", label.as_str()))
    }
}

#[async_trait]
impl EvidenceProvider for ScreenshotCapture {
    async fn capture(&self, url: &str, label: EvidenceLabel) -> Result<String, CaptureError> {
        let capture_error = |message: String| CaptureError {
            url: url.to_string(),
            message,
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|err| {
                capture_error(format!(
                    "failed to create {}: {err}",
                    self.output_dir.display()
                ))
            })?;

        let path = self.output_path(label);
        self.browser
            .screenshot(url, &path, &self.window_size, self.settle_ms, self.timeout)
            .await
            .map_err(|failure| match failure {
                BrowserFailure::Timeout => capture_error(format!(
                    "screenshot timed out after {}s",
                    self.timeout.as_secs()
                )),
                BrowserFailure::Failed(message) => capture_error(message),
            })?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => return Err(capture_error("browser wrote an empty screenshot".into())),
            Err(_) => return Err(capture_error("browser did not write a screenshot".into())),
        }

        debug!(url, label = label.as_str(), path = %path.display(), "Captured evidence");
        Ok(path.to_string_lossy().into_owned())
    }
}
