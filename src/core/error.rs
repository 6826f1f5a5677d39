use thiserror::Error;

/// Centralized error types for the application
///
/// Fallible library entry points return this enum so callers handle one
/// error surface. Download-domain failures keep their own taxonomy
/// ([`crate::download::DownloadError`]) inside the worker; they are
/// stringified into [`AppError::Download`] at the API boundary.
#[derive(Error, Debug)]
pub enum AppError {
    /// Download/yt-dlp errors
    #[error("Download error: {0}")]
    Download(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    /// JSON decoding errors (yt-dlp metadata output)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl From<String> for AppError {
    fn from(err: String) -> Self {
        AppError::Download(err)
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        AppError::Download(err.to_string())
    }
}
