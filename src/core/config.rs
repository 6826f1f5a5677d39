//! Runtime configuration
//!
//! Environment-driven settings are exposed as lazily initialized statics;
//! tuning constants live in nested modules so call sites read as
//! `config::retry::MAX_RETRIES`.

use once_cell::sync::Lazy;
use std::env;

/// Path to the yt-dlp binary. Override with `YTDL_BIN`.
pub static YTDL_BIN: Lazy<String> =
    Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Default destination directory for downloads. Override with `DOWNLOAD_FOLDER`.
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| ".".to_string()));

/// Log file path. Override with `LOG_FILE_PATH`.
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "downline.log".to_string()));

/// Queue limits.
pub mod queue {
    /// Maximum number of pending tasks the coordinator accepts.
    pub const MAX_QUEUE_SIZE: usize = 1000;

    /// Maximum number of entries expanded from a single playlist.
    /// Longer playlists are truncated with a logged notice.
    pub const MAX_PLAYLIST_ITEMS: usize = 100;
}

/// Retry policy defaults. The per-manager policy is a [`crate::core::RetryConfig`];
/// these constants seed its transfer preset.
pub mod retry {
    use std::time::Duration;

    /// Retries after the initial attempt before a task is failed.
    pub const MAX_RETRIES: u32 = 3;

    /// Fixed pause between attempts.
    pub const RETRY_DELAY_SECS: u64 = 5;

    pub fn retry_delay() -> Duration {
        Duration::from_secs(RETRY_DELAY_SECS)
    }
}

/// Subprocess supervision.
pub mod download {
    use std::time::Duration;

    /// Hard ceiling on a single yt-dlp run; the process is killed past it.
    pub const PROCESS_TIMEOUT_SECS: u64 = 3600;

    /// Trailing stderr lines retained for error classification.
    pub const STDERR_TAIL_LINES: usize = 200;

    pub fn process_timeout() -> Duration {
        Duration::from_secs(PROCESS_TIMEOUT_SECS)
    }
}
