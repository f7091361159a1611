//! Shared data model and error taxonomy for sitewatch.

pub mod error;
pub mod types;

pub use error::{CaptureError, FetchError, NotifyError, StoreError};
pub use types::{ChangeRecord, DiffSpan, MonitorTarget, SpanKind, TargetKey};
