//! Change detection: content fingerprints, character diffs and the
//! per-target baseline/unchanged/changed state machine.

pub mod detector;
pub mod diff;
pub mod fingerprint;

pub use detector::{ChangeEvent, CheckOutcome, Detector};
pub use diff::{DiffError, apply_spans, compute_diff, render};
pub use fingerprint::fingerprint;
