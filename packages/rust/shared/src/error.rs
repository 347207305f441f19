//! Error types for chapterscrape.
//!
//! Library crates use [`ScrapeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all scraping operations.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The browser engine failed outside of a specific navigation.
    #[error("browser error: {0}")]
    Browser(String),

    /// A page did not load.
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A wait-for-element or navigation exceeded its explicit timeout.
    #[error("timed out after {after_ms}ms waiting for {what}")]
    Timeout { what: String, after_ms: u64 },

    /// No resolution strategy reached a member-listing table.
    #[error("could not reach a member listing from {url}")]
    UnreachableListing { url: String },

    /// HTML, selector or input parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization error while writing an artifact.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Data validation error (bad chapter record, invalid URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScrapeError>;

impl ScrapeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a navigation error for `url`.
    pub fn navigation(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: msg.into(),
        }
    }

    /// Create a timeout error describing what was awaited.
    pub fn timeout(what: impl Into<String>, after: std::time::Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            after_ms: after.as_millis() as u64,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error means the chapter's listing could not be reached.
    pub fn is_unreachable_listing(&self) -> bool {
        matches!(self, Self::UnreachableListing { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn error_display_formatting() {
        let err = ScrapeError::config("chapter_concurrency must be at least 1");
        assert_eq!(
            err.to_string(),
            "config error: chapter_concurrency must be at least 1"
        );

        let err = ScrapeError::UnreachableListing {
            url: "https://example.com/en-IN/chapterdetail?id=1".into(),
        };
        assert!(err.to_string().contains("chapterdetail?id=1"));
        assert!(err.is_unreachable_listing());
    }

    #[test]
    fn timeout_reports_milliseconds() {
        let err = ScrapeError::timeout("table.listtables tbody tr", Duration::from_secs(5));
        assert_eq!(
            err.to_string(),
            "timed out after 5000ms waiting for table.listtables tbody tr"
        );
        assert!(!err.is_unreachable_listing());
    }
}
