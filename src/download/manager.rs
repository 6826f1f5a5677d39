//! Download coordinator.
//!
//! `DownloadManager` owns the queue, the single worker and the event
//! channel. Shells (the CLI, tests) talk to it from any task: `enqueue`
//! and the pause/resume controls take effect through shared state, while
//! everything the worker learns flows back out as [`QueueEvent`]s on the
//! receiver handed out at construction. The worker holds no lock while a
//! download runs; the queue is only touched for short state updates.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::path::PathBuf;

use tokio::sync::{Mutex, mpsc};
use url::Url;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::retry::{Retryable, RetryConfig};
use crate::core::utils::format_size;
use crate::download::error::DownloadError;
use crate::download::events::QueueEvent;
use crate::download::extractor::{DownloadOutput, DownloadRequest, Extractor, RawProgress};
use crate::download::progress::{ProgressSample, ProgressTracker};
use crate::download::queue::{QueueStats, TaskQueue};
use crate::download::task::{DownloadOptions, DownloadTask, TaskId, TaskState};

/// Knobs for a [`DownloadManager`]; defaults come from the environment.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Retry policy for transfer attempts.
    pub retry: RetryConfig,
    /// Directory downloads land in.
    pub destination: PathBuf,
    /// Maximum number of pending tasks.
    pub capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::transfer(),
            destination: PathBuf::from(config::DOWNLOAD_FOLDER.as_str()),
            capacity: config::queue::MAX_QUEUE_SIZE,
        }
    }
}

impl ManagerConfig {
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_destination(mut self, destination: PathBuf) -> Self {
        self.destination = destination;
        self
    }

    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Single-worker download queue coordinator.
pub struct DownloadManager {
    extractor: Arc<dyn Extractor>,
    queue: TaskQueue,
    tracker: Mutex<ProgressTracker>,
    events: mpsc::UnboundedSender<QueueEvent>,
    paused: AtomicBool,
    worker_active: AtomicBool,
    /// Set when a pause stopped the worker or deferred a `start`, so that
    /// `resume` knows to bring the worker up again.
    interrupted: AtomicBool,
    config: ManagerConfig,
}

impl DownloadManager {
    /// Creates a manager and the receiver its events arrive on.
    pub fn new(
        extractor: Arc<dyn Extractor>,
        config: ManagerConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<QueueEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        log::debug!("Coordinator using extractor '{}'", extractor.name());
        let manager = Arc::new(Self {
            extractor,
            queue: TaskQueue::new(config.capacity),
            tracker: Mutex::new(ProgressTracker::new()),
            events,
            paused: AtomicBool::new(false),
            worker_active: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            config,
        });
        (manager, events_rx)
    }

    /// Resolves a URL and adds the resulting task(s) to the tail of the
    /// queue. A playlist becomes one task per entry, inserted contiguously
    /// in playlist order.
    ///
    /// When resolution fails the URL is still accounted for: a task is
    /// recorded directly in `Failed` with the error attached, and the
    /// error is returned so the caller can report it. Later enqueues are
    /// unaffected.
    pub async fn enqueue(&self, url: Url, options: DownloadOptions) -> AppResult<Vec<TaskId>> {
        let entries = match self.extractor.resolve(&url).await {
            Ok(resolved) => resolved.into_entries(),
            Err(error) => {
                let mut task =
                    DownloadTask::new(url.clone(), self.config.destination.clone(), options);
                task.state = TaskState::Failed;
                task.last_error = Some(error.to_string());
                let id = self.queue.record_failed(task).await;
                log::error!("Enqueue of {url} failed: {error}");
                self.emit(QueueEvent::TaskQueued {
                    id: id.clone(),
                    url: url.to_string(),
                    title: None,
                });
                self.emit(QueueEvent::TaskFailed {
                    id,
                    error: error.to_string(),
                });
                return Err(error.into());
            }
        };

        let paused = self.paused.load(Ordering::SeqCst);
        let mut tasks = Vec::with_capacity(entries.len());
        for entry in entries {
            let mut task = DownloadTask::new(entry.url, self.config.destination.clone(), options)
                .with_title(entry.title);
            if paused {
                task.state = TaskState::Paused;
            }
            tasks.push(task);
        }

        let queued: Vec<(TaskId, String, Option<String>)> = tasks
            .iter()
            .map(|t| (t.id.clone(), t.url.to_string(), t.title.clone()))
            .collect();

        let ids = self.queue.add_tasks(tasks).await?;

        for (id, url, title) in queued {
            self.emit(QueueEvent::TaskQueued {
                id: id.clone(),
                url,
                title,
            });
            if paused {
                self.emit(QueueEvent::StateChanged {
                    id,
                    state: TaskState::Paused,
                });
            }
        }
        log::info!("Queued {} task(s)", ids.len());
        Ok(ids)
    }

    /// Starts the worker if none is running and the queue has pending
    /// items. Returns without blocking on any download; progress arrives
    /// on the event channel.
    pub async fn start(self: &Arc<Self>) {
        if self.paused.load(Ordering::SeqCst) {
            // Remember the intent so resume() brings the worker up.
            self.interrupted.store(true, Ordering::SeqCst);
            return;
        }
        if self.queue.is_empty().await {
            return;
        }
        if self
            .worker_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Worker already running");
            return;
        }
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.run_worker().await;
        });
    }

    /// Pauses the queue. The in-flight download (if any) runs to
    /// completion; everything still pending is held back and shown as
    /// `Paused`.
    pub async fn pause(&self) {
        if self.paused.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("Pausing queue; in-flight download will finish");
        for task in self
            .queue
            .mark_pending(TaskState::Queued, TaskState::Paused)
            .await
        {
            self.emit(QueueEvent::StateChanged {
                id: task.id,
                state: TaskState::Paused,
            });
        }
    }

    /// Lifts a pause. Held-back tasks return to `Queued` in their original
    /// order, and the worker is restarted if the pause had stopped it.
    pub async fn resume(self: &Arc<Self>) {
        if !self.paused.swap(false, Ordering::SeqCst) {
            return;
        }
        log::info!("Resuming queue");
        for task in self
            .queue
            .mark_pending(TaskState::Paused, TaskState::Queued)
            .await
        {
            self.emit(QueueEvent::StateChanged {
                id: task.id,
                state: TaskState::Queued,
            });
        }
        if self.interrupted.swap(false, Ordering::SeqCst) {
            self.start().await;
        }
    }

    /// True while the pause flag is set.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// True when no worker is running and nothing is waiting.
    pub async fn is_idle(&self) -> bool {
        !self.worker_active.load(Ordering::SeqCst) && self.queue.is_empty().await
    }

    /// Clones of every task of the session, in enqueue order.
    pub async fn snapshot(&self) -> Vec<DownloadTask> {
        self.queue.snapshot().await
    }

    /// A clone of one task.
    pub async fn task(&self, id: &str) -> Option<DownloadTask> {
        self.queue.get(id).await
    }

    /// Aggregate counters over the whole session.
    pub async fn stats(&self) -> QueueStats {
        self.queue.stats().await
    }

    fn emit(&self, event: QueueEvent) {
        // A shell that stopped listening must not stall the worker.
        let _ = self.events.send(event);
    }

    async fn run_worker(&self) {
        log::info!("Download worker started");
        loop {
            if self.paused.load(Ordering::SeqCst) {
                self.worker_active.store(false, Ordering::SeqCst);
                self.interrupted.store(true, Ordering::SeqCst);
                // A resume may have slipped in anywhere above and found no
                // restart token yet; if so, take the token back and keep
                // running ourselves.
                if !self.paused.load(Ordering::SeqCst)
                    && self.interrupted.swap(false, Ordering::SeqCst)
                    && self
                        .worker_active
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                {
                    continue;
                }
                log::info!("Worker stopped by pause");
                return;
            }

            let Some(id) = self.queue.pop_next().await else {
                self.worker_active.store(false, Ordering::SeqCst);
                if !self.paused.load(Ordering::SeqCst) && !self.queue.is_empty().await {
                    // An enqueue slipped in behind the empty pop. Pick the
                    // new work up, unless a racing start() already spawned
                    // a worker that owns the queue now.
                    if self
                        .worker_active
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                    {
                        continue;
                    }
                    return;
                }
                let stats = self.queue.stats().await;
                self.emit(QueueEvent::Drained { stats });
                log::info!(
                    "Queue drained: {} finished, {} failed, {} downloaded",
                    stats.finished,
                    stats.failed,
                    format_size(stats.total_downloaded_bytes)
                );
                return;
            };

            self.process_one(id).await;
        }
    }

    /// Takes one task through resolving, downloading and retries. Never
    /// propagates an error: whatever happens to this task, the worker
    /// moves on to the next one.
    async fn process_one(&self, id: TaskId) {
        let Some(task) = self.queue.set_state(&id, TaskState::Resolving).await else {
            // A racing pause() flipped the task between pop and here.
            self.queue.requeue_front(id).await;
            return;
        };
        self.emit(QueueEvent::StateChanged {
            id: id.clone(),
            state: TaskState::Resolving,
        });

        if let Err(error) = self.resolve_details(&task).await {
            self.fail_task(&id, &error).await;
            return;
        }

        self.run_attempts(&id).await;
    }

    /// Fills in title and size estimate for tasks that arrived without
    /// them (playlist entries already carry a title from expansion).
    async fn resolve_details(&self, task: &DownloadTask) -> Result<(), DownloadError> {
        if task.title.is_some() {
            return Ok(());
        }
        let probe = self.extractor.probe(&task.url).await?;
        self.queue
            .update(&task.id, |t| {
                t.title = Some(probe.title);
                if t.size_bytes.is_none() {
                    t.size_bytes = probe.size_bytes;
                }
            })
            .await;
        Ok(())
    }

    async fn run_attempts(&self, id: &str) {
        loop {
            let Some(task) = self.queue.set_state(id, TaskState::Downloading).await else {
                log::error!("Task {id} lost before its download could start");
                return;
            };
            self.emit(QueueEvent::StateChanged {
                id: id.to_string(),
                state: TaskState::Downloading,
            });
            self.queue.update(id, |t| t.attempts += 1).await;

            let request = DownloadRequest {
                url: task.url.clone(),
                destination: task.destination.clone(),
                options: task.options,
            };

            match self.run_download(id, &request).await {
                Ok(output) => {
                    self.finish_task(id, output).await;
                    return;
                }
                Err(error) => {
                    self.queue
                        .update(id, |t| t.last_error = Some(error.to_string()))
                        .await;

                    // task.attempts still holds the count before this try.
                    if error.is_retryable() && task.attempts < self.config.retry.max_retries {
                        let delay = error
                            .retry_after()
                            .unwrap_or_else(|| self.config.retry.delay_for_attempt(task.attempts));
                        if self.queue.set_state(id, TaskState::Retrying).await.is_none() {
                            return;
                        }
                        self.emit(QueueEvent::StateChanged {
                            id: id.to_string(),
                            state: TaskState::Retrying,
                        });
                        log::warn!(
                            "Attempt {} for task {} failed ({}); retrying in {:?}",
                            task.attempts + 1,
                            id,
                            error,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    self.fail_task(id, &error).await;
                    return;
                }
            }
        }
    }

    /// Drives one transfer, forwarding progress into the tracker and out
    /// onto the event channel as it arrives.
    async fn run_download(
        &self,
        id: &str,
        request: &DownloadRequest,
    ) -> Result<DownloadOutput, DownloadError> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel();
        let download = self.extractor.download(request, raw_tx);
        tokio::pin!(download);

        loop {
            tokio::select! {
                result = &mut download => {
                    // Flush whatever progress is still buffered.
                    while let Ok(raw) = raw_rx.try_recv() {
                        self.forward_progress(id, raw).await;
                    }
                    return result;
                }
                Some(raw) = raw_rx.recv() => {
                    self.forward_progress(id, raw).await;
                }
            }
        }
    }

    async fn forward_progress(&self, id: &str, raw: RawProgress) {
        let sample = ProgressSample::new(
            id.to_string(),
            raw.bytes_downloaded,
            raw.bytes_total,
            raw.speed_bytes_per_sec,
        );
        let progress = self.tracker.lock().await.record(&sample);
        self.queue.update(id, |t| t.progress = Some(progress)).await;
        self.emit(QueueEvent::Progress {
            id: id.to_string(),
            progress,
        });
    }

    async fn finish_task(&self, id: &str, output: DownloadOutput) {
        let file_path = output.file_path.clone();
        self.queue
            .update(id, |t| {
                t.size_bytes = Some(output.file_size);
                t.output_path = Some(output.file_path);
            })
            .await;
        if self.queue.set_state(id, TaskState::Finished).await.is_some() {
            self.emit(QueueEvent::StateChanged {
                id: id.to_string(),
                state: TaskState::Finished,
            });
        }
        self.emit(QueueEvent::TaskFinished {
            id: id.to_string(),
            file_path,
            size_bytes: output.file_size,
        });
        self.tracker.lock().await.clear(id);
        log::info!("Task {} finished ({})", id, format_size(output.file_size));
    }

    async fn fail_task(&self, id: &str, error: &DownloadError) {
        log::error!("Task {} failed ({}): {}", id, error.subcategory(), error);
        self.queue
            .update(id, |t| t.last_error = Some(error.to_string()))
            .await;
        if self.queue.set_state(id, TaskState::Failed).await.is_some() {
            self.emit(QueueEvent::StateChanged {
                id: id.to_string(),
                state: TaskState::Failed,
            });
        }
        self.emit(QueueEvent::TaskFailed {
            id: id.to_string(),
            error: error.to_string(),
        });
        self.tracker.lock().await.clear(id);
    }
}
