//! Downline - single-worker download queue on top of yt-dlp
//!
//! This library provides the building blocks of the downline CLI: a FIFO
//! task queue, a coordinator that runs one download at a time, a pluggable
//! extractor interface with a yt-dlp implementation, and an event stream
//! shells can render however they like.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, retry policy and utilities
//! - `download`: Tasks, queue, extractors and the download coordinator
//! - `cli`: Command line argument definitions

pub mod cli;
pub mod core;
pub mod download;

// Re-export commonly used types for convenience
pub use core::{AppError, AppResult, init_logger};
pub use download::{
    DownloadManager, DownloadOptions, DownloadTask, ManagerConfig, QueueEvent, TaskState,
    YtDlpExtractor,
};
