//! Download domain: tasks, the FIFO queue, media extraction and the
//! coordinator that drives them.

pub mod error;
pub mod events;
pub mod extractor;
pub mod manager;
pub mod progress;
pub mod queue;
pub mod task;

// Re-export the types shells interact with
pub use error::DownloadError;
pub use events::QueueEvent;
pub use extractor::{Extractor, YtDlpExtractor};
pub use manager::{DownloadManager, ManagerConfig};
pub use progress::{ProgressSample, ProgressTracker, TaskProgress};
pub use queue::{QueueStats, TaskQueue};
pub use task::{DownloadOptions, DownloadTask, MediaFormat, Quality, TaskId, TaskState};
