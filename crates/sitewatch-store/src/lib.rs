//! Durable target store: a single JSON document holding every monitored
//! target and its history.
//!
//! Writes are whole-document replacements (temp file + rename) taken under an
//! exclusive `flock`-style lock on a sibling `.lock` file, so `sitewatch add`
//! and a running `sitewatch run` never interleave their read-modify-write
//! cycles.

mod store;

pub use store::{NewTarget, TargetStore};
