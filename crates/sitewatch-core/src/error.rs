use std::path::PathBuf;

/// Failure to obtain the current text of a target.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Selector '{selector}' matched nothing on {url}")]
    SelectorNotFound { url: String, selector: String },

    #[error("Browser failed for {url}: {message}")]
    Browser { url: String, message: String },
}

#[derive(thiserror::Error, Debug)]
#[error("Evidence capture failed for {url}: {message}")]
pub struct CaptureError {
    pub url: String,
    pub message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification timed out after {0}s")]
    Timeout(u64),

    #[error("Notifier misconfigured: {0}")]
    Config(String),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Target already exists: {url} (selector: {selector})")]
    DuplicateTarget { url: String, selector: String },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Target store I/O failed at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Target store at {} is malformed: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to lock target store {}: {message}", .path.display())]
    Lock { path: PathBuf, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateTarget { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_fetch_timeout() {
        let err = FetchError::Timeout {
            url: "https://example.com".into(),
            secs: 15,
        };
        assert_eq!(
            err.to_string(),
            "Request to https://example.com timed out after 15s"
        );
    }

    #[test]
    fn test_display_fetch_status() {
        let err = FetchError::Status {
            url: "https://example.com".into(),
            status: 503,
        };
        assert_eq!(err.to_string(), "Request to https://example.com returned HTTP 503");
    }

    #[test]
    fn test_display_selector_not_found() {
        let err = FetchError::SelectorNotFound {
            url: "https://example.com".into(),
            selector: "#price".into(),
        };
        assert_eq!(
            err.to_string(),
            "Selector '#price' matched nothing on https://example.com"
        );
    }

    #[test]
    fn test_display_capture_error() {
        let err = CaptureError {
            url: "https://example.com".into(),
            message: "empty screenshot".into(),
        };
        assert_eq!(
            err.to_string(),
            "Evidence capture failed for https://example.com: empty screenshot"
        );
    }

    #[test]
    fn test_display_duplicate_target() {
        let err = StoreError::DuplicateTarget {
            url: "https://x".into(),
            selector: "#p".into(),
        };
        assert_eq!(err.to_string(), "Target already exists: https://x (selector: #p)");
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_display_store_io() {
        let err = StoreError::io(
            "/tmp/targets.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            err.to_string(),
            "Target store I/O failed at /tmp/targets.json: denied"
        );
        assert!(!err.is_duplicate());
    }

    #[test]
    fn test_display_notify_timeout() {
        assert_eq!(
            NotifyError::Timeout(30).to_string(),
            "Notification timed out after 30s"
        );
    }

    #[test]
    fn test_errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FetchError>();
        assert_send_sync::<CaptureError>();
        assert_send_sync::<NotifyError>();
        assert_send_sync::<StoreError>();
    }
}
