//! yt-dlp backed extractor.
//!
//! Metadata queries (`resolve`, `probe`) run the binary through
//! `tokio::process` with a short timeout; the actual transfer runs a
//! blocking `std::process` child on a blocking thread, feeding progress
//! samples parsed from yt-dlp's `--newline` output back over the channel.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc;
use url::Url;

use crate::core::config;
use crate::download::error::DownloadError;
use crate::download::extractor::{
    DownloadOutput, DownloadRequest, Extractor, MediaEntry, MediaProbe, RawProgress, Resolved,
};
use crate::download::task::Quality;

/// Ceiling for metadata-only yt-dlp runs (playlist enumeration, probes).
const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    /// Uses the binary named by `YTDL_BIN` (default `yt-dlp` on PATH).
    pub fn new() -> Self {
        Self {
            bin: config::YTDL_BIN.clone(),
        }
    }

    /// Uses an explicit binary path.
    pub fn with_binary(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Runs a short metadata-only yt-dlp invocation.
    async fn run_metadata_command(&self, args: &[&str]) -> Result<std::process::Output, DownloadError> {
        let mut cmd = TokioCommand::new(&self.bin);
        cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

        match tokio::time::timeout(METADATA_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(DownloadError::from(e)),
            Err(_) => Err(DownloadError::Transient(format!(
                "yt-dlp metadata query timed out after {}s",
                METADATA_TIMEOUT.as_secs()
            ))),
        }
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn resolve(&self, url: &Url) -> Result<Resolved, DownloadError> {
        if !is_playlist_url(url) {
            // Single media page: title comes later, during the resolving step.
            return Ok(Resolved::Single(MediaEntry {
                url: url.clone(),
                title: None,
            }));
        }

        log::info!("Enumerating playlist: {}", url);

        let output = self
            .run_metadata_command(&[
                "--flat-playlist",
                "--dump-json",
                "--ignore-errors",
                "--no-warnings",
                "--socket-timeout",
                "30",
                url.as_str(),
            ])
            .await
            .map_err(|e| DownloadError::resolution(url.as_str(), e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut playlist = parse_flat_playlist(&stdout);

        // yt-dlp exits non-zero when single members are unreachable even
        // with --ignore-errors; only give up if nothing was enumerated.
        if playlist.entries.is_empty() {
            let reason = if output.status.success() {
                "playlist is empty".to_string()
            } else {
                first_error_line(&String::from_utf8_lossy(&output.stderr))
            };
            return Err(DownloadError::resolution(url.as_str(), reason));
        }

        playlist.truncate_to(config::queue::MAX_PLAYLIST_ITEMS);

        log::info!("Playlist '{}' resolved to {} entries", playlist.title, playlist.entries.len());

        Ok(Resolved::Playlist {
            title: playlist.title,
            entries: playlist.entries,
        })
    }

    async fn probe(&self, url: &Url) -> Result<MediaProbe, DownloadError> {
        let output = self
            .run_metadata_command(&[
                "--dump-json",
                "--no-playlist",
                "--skip-download",
                "--no-warnings",
                "--socket-timeout",
                "30",
                url.as_str(),
            ])
            .await
            .map_err(|e| DownloadError::resolution(url.as_str(), e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::resolution(url.as_str(), first_error_line(&stderr)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| DownloadError::resolution(url.as_str(), "empty metadata output"))?;

        let meta: YtdlpVideoJson = serde_json::from_str(line)
            .map_err(|e| DownloadError::resolution(url.as_str(), format!("bad metadata JSON: {}", e)))?;

        Ok(MediaProbe {
            title: meta.title.filter(|t| !t.is_empty()).unwrap_or_else(|| url.to_string()),
            size_bytes: meta.filesize.or(meta.filesize_approx).map(|b| b as u64),
        })
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress_tx: mpsc::UnboundedSender<RawProgress>,
    ) -> Result<DownloadOutput, DownloadError> {
        let bin = self.bin.clone();
        let args = build_download_args(request);

        log::debug!("yt-dlp command: {} {}", bin, args.join(" "));

        let handle = tokio::task::spawn_blocking(move || run_ytdlp_with_progress(&bin, &args, &progress_tx));

        let file_path = handle
            .await
            .map_err(|e| DownloadError::Permanent(format!("download task join error: {}", e)))??
            .ok_or_else(|| DownloadError::Permanent("yt-dlp reported no destination file".to_string()))?;

        let file_size = std::fs::metadata(&file_path).map(|m| m.len()).unwrap_or(0);

        Ok(DownloadOutput { file_path, file_size })
    }
}

/// Checks whether a URL names a collection rather than a single media page.
pub fn is_playlist_url(url: &Url) -> bool {
    let url_str = url.as_str().to_lowercase();

    if url_str.contains("youtube.com") || url_str.contains("youtu.be") {
        if url.query_pairs().any(|(key, _)| key == "list") {
            return true;
        }
        if url_str.contains("/playlist") {
            return true;
        }
        if url_str.contains("/channel/")
            || url_str.contains("/c/")
            || url_str.contains("/user/")
            || url_str.contains("/@")
        {
            return true;
        }
    }

    if url_str.contains("soundcloud.com") && url_str.contains("/sets/") {
        return true;
    }

    if url_str.contains("bandcamp.com") && url_str.contains("/album/") {
        return true;
    }

    false
}

/// JSON shapes from `yt-dlp --flat-playlist --dump-json`. Depending on the
/// site, output is either one entry object per line or a single playlist
/// object carrying an `entries` array.
#[derive(Debug, Deserialize)]
struct YtdlpFlatEntry {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    playlist_title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YtdlpPlaylistJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    entries: Vec<YtdlpFlatEntry>,
}

#[derive(Debug, Deserialize)]
struct YtdlpVideoJson {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    filesize: Option<f64>,
    #[serde(default)]
    filesize_approx: Option<f64>,
}

struct FlatPlaylist {
    title: String,
    entries: Vec<MediaEntry>,
}

impl FlatPlaylist {
    /// Caps an oversized enumeration, keeping the head of the playlist.
    fn truncate_to(&mut self, cap: usize) {
        if self.entries.len() > cap {
            log::warn!(
                "Playlist '{}' has {} entries, truncating to {}",
                self.title,
                self.entries.len(),
                cap
            );
            self.entries.truncate(cap);
        }
    }
}

fn parse_flat_playlist(stdout: &str) -> FlatPlaylist {
    let mut title: Option<String> = None;
    let mut entries: Vec<MediaEntry> = Vec::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        // Combined playlist object with an entries array
        if let Ok(playlist) = serde_json::from_str::<YtdlpPlaylistJson>(line) {
            if !playlist.entries.is_empty() {
                if title.is_none() {
                    title = playlist.title.clone();
                }
                for entry in playlist.entries {
                    push_entry(&mut entries, &mut title, entry);
                }
                continue;
            }
        }

        // One entry per line
        if let Ok(entry) = serde_json::from_str::<YtdlpFlatEntry>(line) {
            push_entry(&mut entries, &mut title, entry);
        }
    }

    FlatPlaylist {
        title: title.unwrap_or_else(|| "Playlist".to_string()),
        entries,
    }
}

fn push_entry(entries: &mut Vec<MediaEntry>, playlist_title: &mut Option<String>, entry: YtdlpFlatEntry) {
    if playlist_title.is_none() {
        *playlist_title = entry.playlist_title.clone();
    }

    let media_url = entry
        .url
        .or_else(|| entry.id.map(|id| format!("https://www.youtube.com/watch?v={}", id)));

    let Some(media_url) = media_url else {
        return;
    };

    match Url::parse(&media_url) {
        Ok(url) => entries.push(MediaEntry {
            url,
            title: entry.title.filter(|t| !t.is_empty()),
        }),
        Err(e) => log::debug!("Skipping malformed playlist entry '{}': {}", media_url, e),
    }
}

/// yt-dlp format selector for the requested quality ceiling.
fn build_format_selector(quality: Quality) -> String {
    match quality.height_cap() {
        Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
        None => "bestvideo+bestaudio/best".to_string(),
    }
}

fn build_download_args(request: &DownloadRequest) -> Vec<String> {
    let template = request.destination.join("%(title)s.%(ext)s");

    let mut args: Vec<String> = vec![
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        "--socket-timeout".to_string(),
        "30".to_string(),
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
    ];

    let options = &request.options;
    if options.format.is_audio() {
        args.push("-x".to_string());
        args.push("--audio-format".to_string());
        args.push(options.format.extension().to_string());
        args.push("--audio-quality".to_string());
        args.push("0".to_string());
    } else {
        args.push("-f".to_string());
        args.push(build_format_selector(options.quality));
        args.push("--merge-output-format".to_string());
        args.push(options.format.extension().to_string());
    }

    if options.subtitles {
        args.push("--write-subs".to_string());
        args.push("--sub-langs".to_string());
        args.push("en".to_string());
    }

    args.push(request.url.to_string());
    args
}

/// Runs yt-dlp to completion, streaming progress and capturing the
/// destination path it reports. Returns that path on success.
fn run_ytdlp_with_progress(
    ytdl_bin: &str,
    args: &[String],
    progress_tx: &mpsc::UnboundedSender<RawProgress>,
) -> Result<Option<PathBuf>, DownloadError> {
    let mut child = Command::new(ytdl_bin)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(DownloadError::from)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stderr_lines = Arc::new(std::sync::Mutex::new(VecDeque::<String>::new()));
    let stderr_lines_clone = Arc::clone(&stderr_lines);
    let tx_clone = progress_tx.clone();

    // Drain stderr on its own thread: keep a bounded tail for error
    // classification, and mine it for progress too (some yt-dlp builds log
    // progress there).
    if let Some(stderr_stream) = stderr {
        std::thread::spawn(move || {
            let reader = BufReader::new(stderr_stream);
            for line in reader.lines().map_while(Result::ok) {
                log::debug!("yt-dlp stderr: {}", line);
                if let Ok(mut lines) = stderr_lines_clone.lock() {
                    lines.push_back(line.clone());
                    if lines.len() > config::download::STDERR_TAIL_LINES {
                        lines.pop_front();
                    }
                }
                if let Some(progress) = parse_progress(&line) {
                    let _ = tx_clone.send(progress);
                }
            }
        });
    }

    let mut destination: Option<PathBuf> = None;

    if let Some(stdout_stream) = stdout {
        let reader = BufReader::new(stdout_stream);
        for line in reader.lines().map_while(Result::ok) {
            log::debug!("yt-dlp: {}", line);
            if let Some(path) = parse_destination(&line) {
                destination = Some(path);
            }
            if let Some(progress) = parse_progress(&line) {
                let _ = progress_tx.send(progress);
            }
        }
    }

    // stdout is closed; wait out the exit with a hard deadline.
    let timeout = config::download::process_timeout();
    let deadline = std::time::Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if std::time::Instant::now() >= deadline {
                    log::error!("yt-dlp timed out after {}s, killing", timeout.as_secs());
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(DownloadError::Transient(format!(
                        "yt-dlp timed out after {}s",
                        timeout.as_secs()
                    )));
                }
                std::thread::sleep(Duration::from_millis(500));
            }
            Err(e) => {
                return Err(DownloadError::Permanent(format!("waiting on yt-dlp failed: {}", e)));
            }
        }
    };

    if status.success() {
        return Ok(destination);
    }

    let stderr_text = stderr_lines
        .lock()
        .map(|mut lines| lines.make_contiguous().join("\n"))
        .unwrap_or_default();

    Err(classify_stderr(&stderr_text))
}

/// Output path reported by yt-dlp. Post-processors move the file, so the
/// last line seen wins.
fn parse_destination(line: &str) -> Option<PathBuf> {
    for prefix in ["[download] Destination: ", "[ExtractAudio] Destination: "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Some(PathBuf::from(rest.trim()));
        }
    }

    if let Some(idx) = line.find("Merging formats into \"") {
        let rest = &line[idx + "Merging formats into \"".len()..];
        if let Some(end) = rest.find('"') {
            return Some(PathBuf::from(&rest[..end]));
        }
    }

    if let Some(rest) = line.strip_prefix("[download] ") {
        if let Some(path) = rest.strip_suffix(" has already been downloaded") {
            return Some(PathBuf::from(path.trim()));
        }
    }

    None
}

/// Parses a `--newline` progress line into a raw sample.
///
/// Two shapes occur:
/// `[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10` (known total,
/// possibly `of ~` for an estimate) and
/// `[download] 2.50MiB at 1.20MiB/s (frag 3/120)` (unknown total).
fn parse_progress(line: &str) -> Option<RawProgress> {
    if !line.contains("[download]") {
        return None;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut percent: Option<f64> = None;
    let mut total: Option<u64> = None;
    let mut direct_bytes: Option<u64> = None;
    let mut speed: Option<f64> = None;

    for (i, token) in tokens.iter().enumerate() {
        if let Some(stripped) = token.strip_suffix('%') {
            percent = stripped.parse::<f64>().ok();
        } else if *token == "of" || *token == "of~" {
            if let Some(next) = tokens.get(i + 1) {
                let cleaned = next.trim_start_matches('~');
                total = if cleaned.is_empty() {
                    // "of ~ 10.00MiB" with a free-standing tilde
                    tokens.get(i + 2).and_then(|t| parse_size(t))
                } else {
                    parse_size(cleaned)
                };
            }
        } else if *token == "at" {
            if let Some(next) = tokens.get(i + 1) {
                speed = parse_size(next.trim_end_matches("/s")).map(|b| b as f64);
            }
        } else if i == 1 && token.ends_with("iB") {
            // size-so-far shape, no percent/total
            direct_bytes = parse_size(token);
        }
    }

    let bytes_downloaded = match (direct_bytes, percent, total) {
        (Some(bytes), _, _) => bytes,
        (None, Some(pct), Some(total)) => (pct / 100.0 * total as f64) as u64,
        _ => return None,
    };

    Some(RawProgress {
        bytes_downloaded,
        bytes_total: total,
        speed_bytes_per_sec: speed,
    })
}

/// Parses yt-dlp's binary-unit sizes: `10.00MiB`, `500.5KiB`, `1.2GiB`, `999B`.
fn parse_size(size_str: &str) -> Option<u64> {
    let s = size_str.trim();
    for (suffix, factor) in [
        ("GiB", 1024.0 * 1024.0 * 1024.0),
        ("MiB", 1024.0 * 1024.0),
        ("KiB", 1024.0),
        ("B", 1.0),
    ] {
        if let Some(num) = s.strip_suffix(suffix) {
            return num.parse::<f64>().ok().map(|n| (n * factor) as u64);
        }
    }
    None
}

/// Maps a failed run's stderr tail onto the error taxonomy. Anything not
/// positively identified as a network hiccup is treated as permanent so the
/// retry budget is never burned on errors another attempt cannot fix.
fn classify_stderr(stderr: &str) -> DownloadError {
    let lower = stderr.to_lowercase();
    let message = first_error_line(stderr);

    let transient = [
        "timed out",
        "timeout",
        "connection reset",
        "connection refused",
        "connection aborted",
        "temporary failure in name resolution",
        "name or service not known",
        "network is unreachable",
        "unable to connect",
        "incomplete read",
        "[errno 104]",
        "[errno 110]",
        "503",
        "502",
    ];
    if transient.iter().any(|pat| lower.contains(pat)) {
        return DownloadError::Transient(message);
    }

    DownloadError::Permanent(message)
}

/// The most informative stderr line: the first `ERROR:` line, else the last
/// non-empty one. Truncated for display.
fn first_error_line(stderr: &str) -> String {
    let line = stderr
        .lines()
        .find(|l| l.contains("ERROR"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("unknown yt-dlp error");

    let line = line.trim();
    if line.chars().count() > 300 {
        let mut truncated: String = line.chars().take(300).collect();
        truncated.push_str("...");
        truncated
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::task::{DownloadOptions, MediaFormat};

    #[test]
    fn test_parse_progress_standard_line() {
        let progress = parse_progress("[download]  45.2% of 10.00MiB at 500.00KiB/s ETA 00:10").unwrap();
        assert_eq!(progress.bytes_total, Some(10 * 1024 * 1024));
        assert_eq!(progress.bytes_downloaded, 4_739_563);
        assert_eq!(progress.speed_bytes_per_sec, Some(512_000.0));
    }

    #[test]
    fn test_parse_progress_approximate_total() {
        let progress = parse_progress("[download]  50.0% of ~ 2.00MiB at 1.00MiB/s ETA 00:01").unwrap();
        assert_eq!(progress.bytes_total, Some(2 * 1024 * 1024));
        assert_eq!(progress.bytes_downloaded, 1024 * 1024);
    }

    #[test]
    fn test_parse_progress_unknown_total() {
        let progress = parse_progress("[download] 2.50MiB at 1.20MiB/s (frag 3/120)").unwrap();
        assert_eq!(progress.bytes_total, None);
        assert_eq!(progress.bytes_downloaded, 2_621_440);
    }

    #[test]
    fn test_parse_progress_rejects_other_lines() {
        assert!(parse_progress("[youtube] abc: Downloading webpage").is_none());
        assert!(parse_progress("[download] Destination: /tmp/video.mp4").is_none());
        assert!(parse_progress("[download] 100% of some garbage").is_none());
    }

    #[test]
    fn test_parse_size_units() {
        assert_eq!(parse_size("999B"), Some(999));
        assert_eq!(parse_size("1.00KiB"), Some(1024));
        assert_eq!(parse_size("10.00MiB"), Some(10 * 1024 * 1024));
        assert_eq!(parse_size("1.50GiB"), Some(1_610_612_736));
        assert_eq!(parse_size("12.5"), None);
        assert_eq!(parse_size("fastMiB"), None);
    }

    #[test]
    fn test_parse_destination_variants() {
        assert_eq!(
            parse_destination("[download] Destination: /tmp/My Video.mp4"),
            Some(PathBuf::from("/tmp/My Video.mp4"))
        );
        assert_eq!(
            parse_destination("[ExtractAudio] Destination: /tmp/song.mp3"),
            Some(PathBuf::from("/tmp/song.mp3"))
        );
        assert_eq!(
            parse_destination("[Merger] Merging formats into \"/tmp/clip.mkv\""),
            Some(PathBuf::from("/tmp/clip.mkv"))
        );
        assert_eq!(
            parse_destination("[download] /tmp/old.mp4 has already been downloaded"),
            Some(PathBuf::from("/tmp/old.mp4"))
        );
        assert_eq!(parse_destination("[download]  45.2% of 10.00MiB at 1.00MiB/s"), None);
    }

    #[test]
    fn test_classify_stderr_network_errors_are_transient() {
        let err = classify_stderr("ERROR: unable to download video data: The read operation timed out");
        assert!(err.is_retryable());

        let err = classify_stderr("ERROR: [Errno 104] Connection reset by peer");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_classify_stderr_unavailable_is_permanent() {
        let err = classify_stderr("ERROR: [youtube] dQw4w9WgXcQ: Video unavailable");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("Video unavailable"));
    }

    #[test]
    fn test_classify_stderr_defaults_to_permanent() {
        let err = classify_stderr("something nobody has seen before");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_first_error_line_prefers_error_marker() {
        let stderr = "WARNING: slow connection\nERROR: Unsupported URL: https://x\ntrailing noise";
        assert_eq!(first_error_line(stderr), "ERROR: Unsupported URL: https://x");
        assert_eq!(first_error_line(""), "unknown yt-dlp error");
    }

    #[test]
    fn test_is_playlist_url() {
        let yes = [
            "https://www.youtube.com/playlist?list=PLx",
            "https://www.youtube.com/watch?v=abc&list=PLx",
            "https://www.youtube.com/@somechannel",
            "https://soundcloud.com/artist/sets/album",
            "https://artist.bandcamp.com/album/record",
        ];
        for url in yes {
            assert!(is_playlist_url(&Url::parse(url).unwrap()), "{}", url);
        }

        let no = [
            "https://www.youtube.com/watch?v=abc",
            "https://youtu.be/abc",
            "https://soundcloud.com/artist/track",
            "https://example.com/video",
        ];
        for url in no {
            assert!(!is_playlist_url(&Url::parse(url).unwrap()), "{}", url);
        }
    }

    #[test]
    fn test_parse_flat_playlist_entry_per_line() {
        let stdout = concat!(
            "{\"id\": \"a1\", \"title\": \"First\", \"playlist_title\": \"Mix\"}\n",
            "{\"url\": \"https://www.youtube.com/watch?v=b2\", \"title\": \"Second\"}\n",
            "\n",
            "not json\n",
        );
        let playlist = parse_flat_playlist(stdout);
        assert_eq!(playlist.title, "Mix");
        assert_eq!(playlist.entries.len(), 2);
        assert_eq!(playlist.entries[0].url.as_str(), "https://www.youtube.com/watch?v=a1");
        assert_eq!(playlist.entries[0].title.as_deref(), Some("First"));
        assert_eq!(playlist.entries[1].title.as_deref(), Some("Second"));
    }

    #[test]
    fn test_parse_flat_playlist_combined_object() {
        let stdout = r#"{"title": "Album", "entries": [{"id": "x"}, {"id": "y"}, {"id": "z"}]}"#;
        let playlist = parse_flat_playlist(stdout);
        assert_eq!(playlist.title, "Album");
        assert_eq!(playlist.entries.len(), 3);
        // Expansion preserves playlist order
        assert!(playlist.entries[0].url.as_str().ends_with("v=x"));
        assert!(playlist.entries[2].url.as_str().ends_with("v=z"));
    }

    #[test]
    fn test_flat_playlist_truncates_oversized_enumeration() {
        let stdout: String = (0..5)
            .map(|i| format!("{{\"id\": \"v{i}\", \"title\": \"Track {i}\"}}\n"))
            .collect();
        let mut playlist = parse_flat_playlist(&stdout);
        assert_eq!(playlist.entries.len(), 5);

        playlist.truncate_to(3);
        assert_eq!(playlist.entries.len(), 3);
        assert!(playlist.entries[2].url.as_str().ends_with("v=v2"));

        // Within the cap nothing is dropped
        playlist.truncate_to(3);
        assert_eq!(playlist.entries.len(), 3);
    }

    #[test]
    fn test_build_format_selector() {
        assert_eq!(build_format_selector(Quality::Best), "bestvideo+bestaudio/best");
        assert_eq!(
            build_format_selector(Quality::P720),
            "bestvideo[height<=720]+bestaudio/best[height<=720]"
        );
    }

    fn request_with(options: DownloadOptions) -> DownloadRequest {
        DownloadRequest {
            url: Url::parse("https://www.youtube.com/watch?v=abc").unwrap(),
            destination: PathBuf::from("/downloads"),
            options,
        }
    }

    #[test]
    fn test_build_download_args_video() {
        let args = build_download_args(&request_with(DownloadOptions::default()));
        assert!(args.contains(&"--newline".to_string()));
        assert!(args.contains(&"-o".to_string()));
        assert!(args.contains(&"/downloads/%(title)s.%(ext)s".to_string()));
        assert!(args.contains(&"--merge-output-format".to_string()));
        assert!(args.contains(&"mp4".to_string()));
        assert!(!args.contains(&"-x".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_build_download_args_audio() {
        let options = DownloadOptions {
            format: MediaFormat::Mp3,
            ..DownloadOptions::default()
        };
        let args = build_download_args(&request_with(options));
        assert!(args.contains(&"-x".to_string()));
        assert!(args.contains(&"--audio-format".to_string()));
        assert!(args.contains(&"mp3".to_string()));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn test_build_download_args_subtitles() {
        let options = DownloadOptions {
            subtitles: true,
            ..DownloadOptions::default()
        };
        let args = build_download_args(&request_with(options));
        assert!(args.contains(&"--write-subs".to_string()));
        assert!(args.contains(&"en".to_string()));
    }
}
