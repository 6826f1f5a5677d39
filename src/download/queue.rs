//! Pending queue and task table.
//!
//! `TaskQueue` owns both halves of the coordinator's state: the FIFO order
//! of work still to do, and the authoritative record of every task ever
//! enqueued in this session (terminal tasks stay as history). All access
//! goes through one async mutex; callers outside the coordinator only ever
//! see cloned snapshots.

use std::collections::{HashMap, VecDeque};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::core::error::{AppError, AppResult};
use crate::download::task::{DownloadTask, TaskId, TaskState};

#[derive(Debug, Default)]
struct QueueInner {
    /// Ids awaiting processing, head first
    pending: VecDeque<TaskId>,
    /// Every task of the session, keyed by id
    tasks: HashMap<TaskId, DownloadTask>,
    /// Insertion order, for stable snapshots
    order: Vec<TaskId>,
}

/// Aggregate counters derived from the task table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Tasks waiting in the pending queue
    pub pending: usize,
    /// Tasks currently held by the worker (0 or 1)
    pub active: usize,
    pub finished: usize,
    pub failed: usize,
    /// Sum of final sizes of all finished tasks
    pub total_downloaded_bytes: u64,
}

/// FIFO task queue with a bounded capacity.
pub struct TaskQueue {
    inner: Mutex<QueueInner>,
    capacity: usize,
}

impl TaskQueue {
    /// Creates an empty queue accepting at most `capacity` pending tasks.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner::default()),
            capacity,
        }
    }

    /// Adds a batch of tasks to the tail of the pending queue.
    ///
    /// The batch is inserted contiguously, preserving its order, which is
    /// what keeps an expanded playlist together even when another enqueue
    /// races with it. Fails atomically (nothing is added) when the batch
    /// would push the pending count past capacity.
    ///
    /// # Returns
    /// The ids of the added tasks, in insertion order.
    pub async fn add_tasks(&self, tasks: Vec<DownloadTask>) -> AppResult<Vec<TaskId>> {
        let mut inner = self.inner.lock().await;

        if inner.pending.len() + tasks.len() > self.capacity {
            return Err(AppError::Validation(format!(
                "queue full: {} pending + {} new exceeds capacity {}",
                inner.pending.len(),
                tasks.len(),
                self.capacity
            )));
        }

        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = task.id.clone();
            inner.pending.push_back(id.clone());
            inner.order.push(id.clone());
            inner.tasks.insert(id.clone(), task);
            ids.push(id);
        }
        Ok(ids)
    }

    /// Records a task that failed before it could be queued (resolution
    /// failures). It appears in snapshots and history but never in the
    /// pending queue.
    pub async fn record_failed(&self, task: DownloadTask) -> TaskId {
        let mut inner = self.inner.lock().await;
        let id = task.id.clone();
        inner.order.push(id.clone());
        inner.tasks.insert(id.clone(), task);
        id
    }

    /// Pops the id at the head of the pending queue.
    pub async fn pop_next(&self) -> Option<TaskId> {
        self.inner.lock().await.pending.pop_front()
    }

    /// Puts an id back at the head of the pending queue (used when the
    /// worker pops a task it turns out not to be allowed to start).
    pub async fn requeue_front(&self, id: TaskId) {
        self.inner.lock().await.pending.push_front(id);
    }

    /// Applies a state transition, enforcing the task state machine.
    ///
    /// # Returns
    /// The updated task, or `None` when the task is unknown or the
    /// transition is not a legal edge (which is logged and refused).
    pub async fn set_state(&self, id: &str, next: TaskState) -> Option<DownloadTask> {
        let mut inner = self.inner.lock().await;
        let task = inner.tasks.get_mut(id)?;

        if !task.state.can_transition_to(next) {
            log::warn!("Refusing illegal transition {} -> {} for task {}", task.state, next, id);
            return None;
        }

        task.state = next;
        Some(task.clone())
    }

    /// Mutates one task in place and returns the updated clone.
    pub async fn update<F>(&self, id: &str, f: F) -> Option<DownloadTask>
    where
        F: FnOnce(&mut DownloadTask),
    {
        let mut inner = self.inner.lock().await;
        let task = inner.tasks.get_mut(id)?;
        f(task);
        Some(task.clone())
    }

    /// Moves every pending task in state `from` to state `to`, returning
    /// the updated tasks in queue order. Pause and resume use this to flip
    /// `Queued` and `Paused` without touching the pending order.
    pub async fn mark_pending(&self, from: TaskState, to: TaskState) -> Vec<DownloadTask> {
        let mut inner = self.inner.lock().await;
        let QueueInner { pending, tasks, .. } = &mut *inner;

        let mut changed = Vec::new();
        for id in pending.iter() {
            if let Some(task) = tasks.get_mut(id) {
                if task.state == from {
                    task.state = to;
                    changed.push(task.clone());
                }
            }
        }
        changed
    }

    /// A clone of one task.
    pub async fn get(&self, id: &str) -> Option<DownloadTask> {
        self.inner.lock().await.tasks.get(id).cloned()
    }

    /// Clones of all tasks of the session, in insertion order.
    pub async fn snapshot(&self) -> Vec<DownloadTask> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    /// Ids still pending, head first.
    pub async fn pending_ids(&self) -> Vec<TaskId> {
        self.inner.lock().await.pending.iter().cloned().collect()
    }

    /// Number of tasks awaiting processing.
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.pending.is_empty()
    }

    /// Aggregate counters over the whole session.
    pub async fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().await;
        let mut stats = QueueStats {
            pending: inner.pending.len(),
            active: 0,
            finished: 0,
            failed: 0,
            total_downloaded_bytes: 0,
        };

        for task in inner.tasks.values() {
            match task.state {
                TaskState::Finished => {
                    stats.finished += 1;
                    stats.total_downloaded_bytes += task.size_bytes.unwrap_or(0);
                }
                TaskState::Failed => stats.failed += 1,
                s if s.is_active() => stats.active += 1,
                _ => {}
            }
        }
        stats
    }
}
