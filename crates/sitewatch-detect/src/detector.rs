use std::sync::Arc;

use chrono::{DateTime, Utc};
use sitewatch_core::{ChangeRecord, FetchError, MonitorTarget};
use sitewatch_fetch::{EvidenceLabel, EvidenceProvider, FetcherSet};
use tracing::{info, warn};

use crate::diff::{compute_diff, render};
use crate::fingerprint::fingerprint;

/// A confirmed change, ready to be turned into a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub old_text: String,
    pub new_text: String,
    pub diff: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// First successful observation; recorded but not a change.
    Baseline,
    Unchanged,
    Changed(ChangeEvent),
}

impl CheckOutcome {
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    /// Modifies the target's persisted state.
    pub fn is_recorded(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Baseline => "BASELINE",
            Self::Unchanged => "NO CHANGE",
            Self::Changed(_) => "CHANGED",
        }
    }
}

/// Applies observations to a target and records history.
#[derive(Clone, Default)]
pub struct Detector {
    evidence: Option<Arc<dyn EvidenceProvider>>,
}

impl Detector {
    pub fn new(evidence: Option<Arc<dyn EvidenceProvider>>) -> Self {
        Self { evidence }
    }

    /// Fetch the target's current text with its fetch variant, then observe it.
    pub async fn check_target(
        &self,
        target: &mut MonitorTarget,
        fetchers: &FetcherSet,
    ) -> Result<CheckOutcome, FetchError> {
        let text = fetchers.fetch(target).await?;
        Ok(self.observe(target, text, Utc::now()).await)
    }

    /// Record `text` as the target's latest observation.
    ///
    /// Only the task owning `target` may call this.
    pub async fn observe(
        &self,
        target: &mut MonitorTarget,
        text: String,
        observed_at: DateTime<Utc>,
    ) -> CheckOutcome {
        let new_fingerprint = fingerprint(&text);

        if target.is_unseen() {
            info!(url = %target.url, selector = %target.selector, "Baseline recorded");
            target
                .history
                .push(ChangeRecord::baseline(new_fingerprint.clone(), text, observed_at));
            target.last_fingerprint = new_fingerprint;
            return CheckOutcome::Baseline;
        }

        if target.last_fingerprint == new_fingerprint {
            return CheckOutcome::Unchanged;
        }

        let old_text = match target.last_record() {
            Some(record) => record.text.clone(),
            None => {
                warn!(
                    url = %target.url,
                    selector = %target.selector,
                    "Fingerprint set but history is empty; diffing against empty text"
                );
                String::new()
            }
        };

        let evidence_before = self.capture(target, EvidenceLabel::Before).await;
        let spans = compute_diff(&old_text, &text);
        let diff = render(&spans);
        let evidence_after = self.capture(target, EvidenceLabel::After).await;

        target.history.push(ChangeRecord {
            fingerprint: new_fingerprint.clone(),
            timestamp: observed_at,
            text: text.clone(),
            diff: Some(diff.clone()),
            diff_spans: spans,
            evidence_before,
            evidence_after,
        });
        target.last_fingerprint = new_fingerprint;
        info!(url = %target.url, selector = %target.selector, %diff, "Change detected");

        CheckOutcome::Changed(ChangeEvent {
            old_text,
            new_text: text,
            diff,
        })
    }

    async fn capture(&self, target: &MonitorTarget, label: EvidenceLabel) -> Option<String> {
        if !target.capture_evidence {
            return None;
        }
        let provider = self.evidence.as_ref()?;
        match provider.capture(&target.url, label).await {
            Ok(reference) => Some(reference),
            Err(err) => {
                warn!(url = %target.url, label = label.as_str(), error = %err, "Evidence capture failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
