//! Task model: one queued download and its lifecycle.
//!
//! A [`DownloadTask`] is created when a URL is enqueued (one per resolved
//! media item, even when a playlist expands into many) and lives in the
//! coordinator's table until the process exits. Terminal tasks stay visible
//! as history; only the coordinator and the progress tracker mutate them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

use crate::download::progress::TaskProgress;

/// Task identifier (UUID v4, generated at enqueue time).
pub type TaskId = String;

/// Lifecycle of a single task.
///
/// ```text
/// Queued -> Resolving -> Downloading -> Finished
///    |          |           |    ^
///    v          v           |    |
/// Paused     Failed         v    |
///    |                   Retrying
///    +-> Queued             |
///                           v
///                        Failed
/// ```
///
/// `Finished` and `Failed` are terminal. At most one task in the whole
/// queue is `Resolving` or `Downloading` at any moment (single worker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in the pending queue
    Queued,
    /// Worker is fetching title/size metadata
    Resolving,
    /// Transfer in progress
    Downloading,
    /// Held back by a queue-level pause
    Paused,
    /// Waiting out the backoff after a transient failure
    Retrying,
    /// Completed successfully
    Finished,
    /// Gave up (non-retryable error or retry budget exhausted)
    Failed,
}

impl TaskState {
    /// True once the task will never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Finished | TaskState::Failed)
    }

    /// True while the worker actively holds the task.
    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Resolving | TaskState::Downloading | TaskState::Retrying)
    }

    /// Legal state-machine edges. The coordinator refuses (and logs) any
    /// transition not listed here.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Queued, Resolving)
                | (Queued, Paused)
                | (Queued, Failed)
                | (Paused, Queued)
                | (Resolving, Downloading)
                | (Resolving, Failed)
                | (Downloading, Finished)
                | (Downloading, Retrying)
                | (Downloading, Failed)
                | (Retrying, Downloading)
        )
    }

    /// Status column label.
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Queued => "Queued",
            TaskState::Resolving => "Resolving",
            TaskState::Downloading => "Downloading",
            TaskState::Paused => "Paused",
            TaskState::Retrying => "Retrying",
            TaskState::Finished => "Finished",
            TaskState::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Container/codec choice, from the shell's format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp4,
    Mp3,
    Mkv,
    Webm,
}

impl MediaFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Webm => "webm",
        }
    }

    /// Audio-only formats go through yt-dlp's audio extraction path.
    pub fn is_audio(&self) -> bool {
        matches!(self, MediaFormat::Mp3)
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(MediaFormat::Mp4),
            "mp3" => Ok(MediaFormat::Mp3),
            "mkv" => Ok(MediaFormat::Mkv),
            "webm" => Ok(MediaFormat::Webm),
            other => Err(format!("unknown format '{}' (expected mp4, mp3, mkv or webm)", other)),
        }
    }
}

impl std::fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Video quality ceiling, from the shell's quality selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Best,
    P1080,
    P720,
    P360,
    P144,
}

impl Quality {
    /// Height cap for the yt-dlp format selector; `None` means unrestricted.
    pub fn height_cap(&self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P360 => Some(360),
            Quality::P144 => Some(144),
        }
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Ok(Quality::Best),
            "1080p" | "1080" => Ok(Quality::P1080),
            "720p" | "720" => Ok(Quality::P720),
            "360p" | "360" => Ok(Quality::P360),
            "144p" | "144" => Ok(Quality::P144),
            other => Err(format!(
                "unknown quality '{}' (expected best, 1080p, 720p, 360p or 144p)",
                other
            )),
        }
    }
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Quality::Best => f.write_str("best"),
            Quality::P1080 => f.write_str("1080p"),
            Quality::P720 => f.write_str("720p"),
            Quality::P360 => f.write_str("360p"),
            Quality::P144 => f.write_str("144p"),
        }
    }
}

/// Per-task download options, captured at enqueue time. Every member of an
/// expanded playlist inherits the options of the enqueue call.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DownloadOptions {
    pub format: MediaFormat,
    pub quality: Quality,
    /// Request English subtitles alongside the media file.
    pub subtitles: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            format: MediaFormat::Mp4,
            quality: Quality::Best,
            subtitles: false,
        }
    }
}

/// One unit of queued download work.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadTask {
    /// Unique task ID
    pub id: TaskId,
    /// Source URL (a single media page, never a playlist)
    pub url: Url,
    /// Media title; unknown until resolution for bare single-URL enqueues
    pub title: Option<String>,
    /// Destination directory; the file lands here as `<title>.<ext>`
    pub destination: PathBuf,
    /// Final media file path, set on `Finished`
    pub output_path: Option<PathBuf>,
    /// Download options inherited from the enqueue call
    pub options: DownloadOptions,
    /// Current lifecycle state
    pub state: TaskState,
    /// Final observed size in bytes, set on `Finished`
    pub size_bytes: Option<u64>,
    /// Message of the last (or fatal) error, for display
    pub last_error: Option<String>,
    /// Download attempts made so far (1 = first try)
    pub attempts: u32,
    /// Latest normalized progress, for display
    pub progress: Option<TaskProgress>,
    /// Enqueue timestamp
    pub created_at: DateTime<Utc>,
}

impl DownloadTask {
    /// Creates a new `Queued` task.
    pub fn new(url: Url, destination: PathBuf, options: DownloadOptions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url,
            title: None,
            destination,
            output_path: None,
            options,
            state: TaskState::Queued,
            size_bytes: None,
            last_error: None,
            attempts: 0,
            progress: None,
            created_at: Utc::now(),
        }
    }

    /// Attaches a title known already at enqueue time (playlist entries
    /// usually carry one from the flat enumeration).
    #[must_use]
    pub fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    /// Title for display, falling back to the URL while unresolved.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => self.url.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
