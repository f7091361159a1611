use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the trimmed text.
///
/// Surrounding whitespace is ignored so that re-indented markup around an
/// unchanged fragment does not register as a change.
pub fn fingerprint(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.trim().as_bytes()))
}
