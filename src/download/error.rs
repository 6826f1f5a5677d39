//! Download error taxonomy.
//!
//! Three kinds, and the worker treats them differently: resolution errors
//! fail the task before any transfer starts, transient errors are retried
//! on the fixed backoff until the budget runs out, permanent errors fail
//! the task immediately. A failure on one task never touches the rest of
//! the queue.

use thiserror::Error;

use crate::core::error::AppError;
use crate::core::retry::Retryable;

#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    /// The source URL could not be enumerated (malformed URL, removed
    /// media, unreachable site during metadata lookup). Not retryable.
    #[error("cannot resolve {url}: {reason}")]
    Resolution { url: String, reason: String },

    /// Connection reset, timeout, transient DNS/socket failure. Retryable.
    #[error("network error: {0}")]
    Transient(String),

    /// Unsupported format, permission denied, disk full, and anything else
    /// another attempt cannot fix. Not retryable.
    #[error("{0}")]
    Permanent(String),
}

impl DownloadError {
    pub fn resolution(url: impl Into<String>, reason: impl Into<String>) -> Self {
        DownloadError::Resolution {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Stable label for log lines.
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::Resolution { .. } => "resolution",
            DownloadError::Transient(_) => "transient",
            DownloadError::Permanent(_) => "permanent",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DownloadError::Transient(_))
    }
}

impl Retryable for DownloadError {
    fn is_retryable(&self) -> bool {
        DownloadError::is_retryable(self)
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(err: std::io::Error) -> Self {
        if err.is_retryable() {
            DownloadError::Transient(err.to_string())
        } else {
            DownloadError::Permanent(err.to_string())
        }
    }
}

impl From<DownloadError> for AppError {
    fn from(err: DownloadError) -> Self {
        AppError::Download(err.to_string())
    }
}
