//! Scripted extractor for exercising the queue coordinator
//!
//! Every URL gets a script describing how its resolution, probe and
//! transfer should play out: how many transient failures to report, what
//! progress to emit, how long each step takes. Counters record what the
//! coordinator actually asked for.

#![allow(dead_code)] // Not every test uses every knob

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;
use url::Url;

use downline::core::utils::escape_filename;
use downline::download::error::DownloadError;
use downline::download::extractor::{
    DownloadOutput, DownloadRequest, Extractor, MediaEntry, MediaProbe, RawProgress, Resolved,
};

/// Scripted behavior for one URL.
#[derive(Debug, Clone)]
pub struct MediaScript {
    pub title: String,
    /// Final size of the simulated file
    pub size_bytes: u64,
    /// Transient failures to report before a transfer succeeds
    pub transient_failures: u32,
    /// Every attempt fails permanently when set
    pub always_permanent: bool,
    /// Byte counts emitted as progress during a successful transfer
    pub progress_steps: Vec<u64>,
    /// Pause between progress steps
    pub step_delay: Duration,
}

impl MediaScript {
    /// A transfer that succeeds on the first attempt.
    pub fn finishing(title: &str, size_bytes: u64) -> Self {
        Self {
            title: title.to_string(),
            size_bytes,
            transient_failures: 0,
            always_permanent: false,
            progress_steps: vec![size_bytes / 2, size_bytes],
            step_delay: Duration::ZERO,
        }
    }

    /// A transfer that fails permanently on every attempt.
    pub fn permanent(title: &str) -> Self {
        Self {
            title: title.to_string(),
            size_bytes: 0,
            transient_failures: 0,
            always_permanent: true,
            progress_steps: Vec::new(),
            step_delay: Duration::ZERO,
        }
    }

    /// Report `n` transient failures before succeeding.
    pub fn with_transient_failures(mut self, n: u32) -> Self {
        self.transient_failures = n;
        self
    }

    pub fn with_progress_steps(mut self, steps: Vec<u64>) -> Self {
        self.progress_steps = steps;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

/// Extractor whose behavior is scripted per URL.
#[derive(Default)]
pub struct MockExtractor {
    scripts: Mutex<HashMap<String, MediaScript>>,
    playlists: Mutex<HashMap<String, Vec<String>>>,
    unresolvable: Mutex<HashMap<String, String>>,
    attempts: Mutex<HashMap<String, u32>>,
    pub probe_calls: AtomicU32,
    pub download_calls: AtomicU32,
    active: AtomicU32,
    max_active: AtomicU32,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the script for a URL.
    pub fn script(&self, url: &str, script: MediaScript) {
        self.scripts.lock().unwrap().insert(url.to_string(), script);
    }

    /// Registers a playlist whose members must already have scripts.
    pub fn playlist(&self, url: &str, members: &[&str]) {
        self.playlists
            .lock()
            .unwrap()
            .insert(url.to_string(), members.iter().map(|m| m.to_string()).collect());
    }

    /// Makes resolution of a URL fail with the given reason.
    pub fn unresolvable(&self, url: &str, reason: &str) {
        self.unresolvable
            .lock()
            .unwrap()
            .insert(url.to_string(), reason.to_string());
    }

    /// Transfer attempts made for one URL.
    pub fn attempts_for(&self, url: &str) -> u32 {
        self.attempts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    /// Highest number of transfers running at the same time.
    pub fn max_concurrent_downloads(&self) -> u32 {
        self.max_active.load(Ordering::SeqCst)
    }

    fn script_for(&self, url: &Url) -> Option<MediaScript> {
        self.scripts.lock().unwrap().get(url.as_str()).cloned()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn resolve(&self, url: &Url) -> Result<Resolved, DownloadError> {
        if let Some(reason) = self.unresolvable.lock().unwrap().get(url.as_str()) {
            return Err(DownloadError::resolution(url.as_str(), reason.as_str()));
        }

        let members = self.playlists.lock().unwrap().get(url.as_str()).cloned();
        if let Some(members) = members {
            let scripts = self.scripts.lock().unwrap();
            let entries = members
                .iter()
                .map(|m| MediaEntry {
                    url: Url::parse(m).unwrap(),
                    title: scripts.get(m).map(|s| s.title.clone()),
                })
                .collect();
            return Ok(Resolved::Playlist {
                title: format!("playlist {url}"),
                entries,
            });
        }

        // Single pages resolve without a script, like the real extractor:
        // the title is filled in later, during the resolving step.
        Ok(Resolved::Single(MediaEntry {
            url: url.clone(),
            title: None,
        }))
    }

    async fn probe(&self, url: &Url) -> Result<MediaProbe, DownloadError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match self.script_for(url) {
            Some(script) => Ok(MediaProbe {
                title: script.title,
                size_bytes: Some(script.size_bytes),
            }),
            None => Err(DownloadError::resolution(url.as_str(), "no metadata available")),
        }
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::UnboundedSender<RawProgress>,
    ) -> Result<DownloadOutput, DownloadError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(running, Ordering::SeqCst);

        let result = self.run_transfer(request, progress_tx).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MockExtractor {
    async fn run_transfer(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::UnboundedSender<RawProgress>,
    ) -> Result<DownloadOutput, DownloadError> {
        let url = request.url.as_str().to_string();
        let Some(script) = self.script_for(&request.url) else {
            return Err(DownloadError::Permanent(format!("no script for {url}")));
        };

        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let counter = attempts.entry(url).or_insert(0);
            *counter += 1;
            *counter
        };

        if script.always_permanent {
            return Err(DownloadError::Permanent("requested format unavailable".to_string()));
        }

        if attempt <= script.transient_failures {
            // A failed attempt still gets partway through the file.
            if let Some(&first) = script.progress_steps.first() {
                let _ = progress_tx.send(RawProgress {
                    bytes_downloaded: first,
                    bytes_total: Some(script.size_bytes),
                    speed_bytes_per_sec: Some(250_000.0),
                });
            }
            return Err(DownloadError::Transient("connection reset by peer".to_string()));
        }

        for &bytes in &script.progress_steps {
            if !script.step_delay.is_zero() {
                sleep(script.step_delay).await;
            }
            let _ = progress_tx.send(RawProgress {
                bytes_downloaded: bytes,
                bytes_total: Some(script.size_bytes),
                speed_bytes_per_sec: Some(250_000.0),
            });
        }

        let file_name = format!(
            "{}.{}",
            escape_filename(&script.title),
            request.options.format.extension()
        );
        Ok(DownloadOutput {
            file_path: request.destination.join(file_name),
            file_size: script.size_bytes,
        })
    }
}
