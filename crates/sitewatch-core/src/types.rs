use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a monitored target: the `(url, selector)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetKey {
    pub url: String,
    pub selector: String,
}

impl TargetKey {
    pub fn new(url: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
        }
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.url, self.selector)
    }
}

/// One watched resource together with its observation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorTarget {
    pub url: String,
    pub selector: String,
    pub frequency_minutes: u32,
    #[serde(default)]
    pub use_rendered_fetch: bool,
    /// Capture before/after screenshots around confirmed changes.
    #[serde(default)]
    pub capture_evidence: bool,
    /// Fingerprint of the most recent observation; empty until the baseline.
    #[serde(default)]
    pub last_fingerprint: String,
    /// Append-only, oldest first.
    #[serde(default)]
    pub history: Vec<ChangeRecord>,
}

impl MonitorTarget {
    pub fn new(url: impl Into<String>, selector: impl Into<String>, frequency_minutes: u32) -> Self {
        Self {
            url: url.into(),
            selector: selector.into(),
            frequency_minutes,
            use_rendered_fetch: false,
            capture_evidence: false,
            last_fingerprint: String::new(),
            history: Vec::new(),
        }
    }

    pub fn key(&self) -> TargetKey {
        TargetKey::new(self.url.clone(), self.selector.clone())
    }

    pub fn matches(&self, key: &TargetKey) -> bool {
        self.url == key.url && self.selector == key.selector
    }

    /// `true` until the first successful observation has been recorded.
    pub fn is_unseen(&self) -> bool {
        self.last_fingerprint.is_empty()
    }

    pub fn last_record(&self) -> Option<&ChangeRecord> {
        self.history.last()
    }
}

/// One observation appended to a target's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub fingerprint: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// Rendered diff against the preceding record. Absent on the baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diff_spans: Vec<DiffSpan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_after: Option<String>,
}

impl ChangeRecord {
    pub fn baseline(fingerprint: String, text: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            timestamp,
            text,
            diff: None,
            diff_spans: Vec::new(),
            evidence_before: None,
            evidence_after: None,
        }
    }

    pub fn is_change(&self) -> bool {
        self.diff.is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Equal,
    Delete,
    Insert,
}

/// A contiguous run of text that is kept, removed or added between two observations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSpan {
    pub kind: SpanKind,
    pub text: String,
}

impl DiffSpan {
    pub fn new(kind: SpanKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}
