//! Extractor boundary: the external media tool behind a trait.
//!
//! The coordinator never talks to yt-dlp directly; it sees this interface.
//! [`ytdlp::YtDlpExtractor`] is the production implementation, tests script
//! their own.

pub mod ytdlp;

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::mpsc;
use url::Url;

use crate::download::error::DownloadError;
use crate::download::task::DownloadOptions;

pub use ytdlp::YtDlpExtractor;

/// One resolved media item.
#[derive(Debug, Clone)]
pub struct MediaEntry {
    pub url: Url,
    /// Known up front for playlist members; deferred otherwise.
    pub title: Option<String>,
}

/// What a URL turned out to be.
#[derive(Debug, Clone)]
pub enum Resolved {
    Single(MediaEntry),
    Playlist { title: String, entries: Vec<MediaEntry> },
}

/// Metadata for a single item, fetched during the resolving step.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    pub title: String,
    /// Size estimate; extractors often cannot know it up front.
    pub size_bytes: Option<u64>,
}

/// Raw progress emitted by an extractor. Not yet bound to a task; the
/// worker attaches the task id when it forwards the sample.
#[derive(Debug, Clone, Copy)]
pub struct RawProgress {
    pub bytes_downloaded: u64,
    pub bytes_total: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
}

/// Everything an extractor needs for one transfer.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: Url,
    /// Destination directory; the file lands here as `<title>.<ext>`.
    pub destination: PathBuf,
    pub options: DownloadOptions,
}

/// Successful transfer result.
#[derive(Debug, Clone)]
pub struct DownloadOutput {
    pub file_path: PathBuf,
    pub file_size: u64,
}

/// Interface between the coordinator and the external extraction tool.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Metadata-only enumeration of a URL: a single item, or a playlist's
    /// members in playlist order. Must not transfer any media payload.
    async fn resolve(&self, url: &Url) -> Result<Resolved, DownloadError>;

    /// Title and size estimate for one media item.
    async fn probe(&self, url: &Url) -> Result<MediaProbe, DownloadError>;

    /// Performs the transfer, sending [`RawProgress`] on `progress_tx` zero
    /// or more times before returning. Implementations run blocking work on
    /// a blocking thread so the calling task stays responsive.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::UnboundedSender<RawProgress>,
    ) -> Result<DownloadOutput, DownloadError>;
}

impl Resolved {
    /// Member entries in order; a single item is a one-entry list.
    pub fn into_entries(self) -> Vec<MediaEntry> {
        match self {
            Resolved::Single(entry) => vec![entry],
            Resolved::Playlist { entries, .. } => entries,
        }
    }
}
