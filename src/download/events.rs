//! Events emitted by the download coordinator.

use std::path::PathBuf;
use serde::Serialize;

use crate::download::progress::TaskProgress;
use crate::download::queue::QueueStats;
use crate::download::task::{TaskId, TaskState};

/// One observable change in the queue, delivered over the event channel.
///
/// Shells render these instead of polling; every state transition of every
/// task produces a `StateChanged` before any more specific event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// A task entered the queue.
    TaskQueued {
        id: TaskId,
        url: String,
        title: Option<String>,
    },
    /// A task moved to a new state.
    StateChanged { id: TaskId, state: TaskState },
    /// Fresh progress for the task the worker is on.
    Progress { id: TaskId, progress: TaskProgress },
    /// A task completed with its final file.
    TaskFinished {
        id: TaskId,
        file_path: PathBuf,
        size_bytes: u64,
    },
    /// A task exhausted its options and will not be retried.
    TaskFailed { id: TaskId, error: String },
    /// The worker stopped because the queue ran dry.
    Drained { stats: QueueStats },
}
