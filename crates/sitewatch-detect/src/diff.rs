use std::time::Duration;

use similar::{Algorithm, ChangeTag, TextDiff};
use sitewatch_core::{DiffSpan, SpanKind};

/// Upper bound on diff computation. Past it `similar` falls back to a coarser
/// (still valid) edit script.
const DIFF_DEADLINE: Duration = Duration::from_secs(2);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DiffError {
    #[error("Span {index} ({kind:?}) does not match the old text at byte {offset}")]
    SpanMismatch {
        index: usize,
        kind: SpanKind,
        offset: usize,
    },

    #[error("Spans leave {remaining} bytes of the old text unaccounted for")]
    Incomplete { remaining: usize },
}

/// Character-level diff from `old` to `new`, adjacent runs of the same kind merged.
pub fn compute_diff(old: &str, new: &str) -> Vec<DiffSpan> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_DEADLINE)
        .diff_chars(old, new);

    let mut spans: Vec<DiffSpan> = Vec::new();
    for change in diff.iter_all_changes() {
        let kind = match change.tag() {
            ChangeTag::Equal => SpanKind::Equal,
            ChangeTag::Delete => SpanKind::Delete,
            ChangeTag::Insert => SpanKind::Insert,
        };
        match spans.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(change.value()),
            _ => spans.push(DiffSpan::new(kind, change.value())),
        }
    }
    spans
}

/// Render spans for humans: `[-removed-]` and `{+added+}` around unchanged text.
pub fn render(spans: &[DiffSpan]) -> String {
    let mut out = String::new();
    for span in spans {
        match span.kind {
            SpanKind::Equal => out.push_str(&span.text),
            SpanKind::Delete => {
                out.push_str("[-");
                out.push_str(&span.text);
                out.push_str("-]");
            }
            SpanKind::Insert => {
                out.push_str("{+");
                out.push_str(&span.text);
                out.push_str("+}");
            }
        }
    }
    out
}

/// Rebuild the new text from `old` and the spans computed against it.
pub fn apply_spans(old: &str, spans: &[DiffSpan]) -> Result<String, DiffError> {
    let mut rest = old;
    let mut out = String::with_capacity(old.len());
    for (index, span) in spans.iter().enumerate() {
        match span.kind {
            SpanKind::Insert => out.push_str(&span.text),
            SpanKind::Equal | SpanKind::Delete => {
                rest = rest
                    .strip_prefix(span.text.as_str())
                    .ok_or(DiffError::SpanMismatch {
                        index,
                        kind: span.kind,
                        offset: old.len() - rest.len(),
                    })?;
                if span.kind == SpanKind::Equal {
                    out.push_str(&span.text);
                }
            }
        }
    }
    if !rest.is_empty() {
        return Err(DiffError::Incomplete {
            remaining: rest.len(),
        });
    }
    Ok(out)
}
