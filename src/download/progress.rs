//! Progress reporting: raw extractor samples in, display values out.
//!
//! Extractors emit whatever their output parsing yields; the tracker turns
//! that into per-task display values (percent, MB/s) and guarantees the
//! byte counter never moves backwards for a task, even when the underlying
//! tool restarts a fragment or resumes after a retry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::core::utils::format_speed;
use crate::download::task::TaskId;

/// One raw progress event for a task, as handed off by the worker.
/// Ephemeral: only the latest normalized value per task is kept.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressSample {
    pub task_id: TaskId,
    pub bytes_downloaded: u64,
    /// Total size when the extractor knows it (live/partial sources often don't).
    pub bytes_total: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl ProgressSample {
    pub fn new(
        task_id: TaskId,
        bytes_downloaded: u64,
        bytes_total: Option<u64>,
        speed_bytes_per_sec: Option<f64>,
    ) -> Self {
        Self {
            task_id,
            bytes_downloaded,
            bytes_total,
            speed_bytes_per_sec,
            timestamp: Utc::now(),
        }
    }
}

/// Normalized display values derived from the latest sample of a task.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TaskProgress {
    /// 0..=100 when the total is known, `None` otherwise
    pub percent: Option<u8>,
    pub bytes_downloaded: u64,
    pub bytes_total: Option<u64>,
    pub speed_bytes_per_sec: Option<f64>,
}

impl TaskProgress {
    /// Percent column text, `"--"` while the total is unknown.
    pub fn percent_label(&self) -> String {
        match self.percent {
            Some(p) => format!("{}%", p),
            None => "--".to_string(),
        }
    }

    /// Speed column text, `"--"` when the extractor gave no rate.
    pub fn speed_label(&self) -> String {
        match self.speed_bytes_per_sec {
            Some(speed) => format_speed(speed),
            None => "--".to_string(),
        }
    }
}

/// Turns raw samples into [`TaskProgress`] values, one in, one out.
///
/// Keeps a per-task high-water mark so a sample that regresses below the
/// last accepted byte count is clamped up to it. Tolerates absent or zero
/// totals by reporting an unknown percentage instead of failing.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    high_water: HashMap<TaskId, u64>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes one sample. Pure beyond the high-water bookkeeping; the
    /// caller stores the result on the task it belongs to.
    pub fn record(&mut self, sample: &ProgressSample) -> TaskProgress {
        let floor = self.high_water.get(&sample.task_id).copied().unwrap_or(0);
        let bytes = sample.bytes_downloaded.max(floor);
        self.high_water.insert(sample.task_id.clone(), bytes);

        let percent = match sample.bytes_total {
            Some(total) if total > 0 => {
                let pct = (bytes as f64 / total as f64 * 100.0).min(100.0);
                Some(pct as u8)
            }
            _ => None,
        };

        TaskProgress {
            percent,
            bytes_downloaded: bytes,
            bytes_total: sample.bytes_total,
            speed_bytes_per_sec: sample.speed_bytes_per_sec,
        }
    }

    /// Drops the high-water mark once a task is terminal.
    pub fn clear(&mut self, task_id: &str) {
        self.high_water.remove(task_id);
    }
}
