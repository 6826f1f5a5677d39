use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use url::Url;

use downline::cli::Cli;
use downline::core::retry::RetryConfig;
use downline::core::utils::format_size;
use downline::core::{config, init_logger};
use downline::download::queue::QueueStats;
use downline::download::task::{DownloadOptions, DownloadTask};
use downline::download::{DownloadManager, ManagerConfig, QueueEvent, YtDlpExtractor};

/// Entry point for the downline CLI.
///
/// Enqueues every URL given on the command line, runs the queue to
/// completion and prints a per-item summary.
///
/// # Errors
/// Returns an error if initialization fails or any item could not be
/// downloaded, so that shell scripts can rely on the exit code.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log the panic instead of dying silently if a worker task blows up
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {panic_info:?}");
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Load .env before any config static is first read
    let _ = dotenv();

    init_logger(cli.log_file.as_deref().unwrap_or(config::LOG_FILE_PATH.as_str()))?;

    let mut retry = RetryConfig::transfer();
    if let Some(max) = cli.max_retries {
        retry = retry.max_retries(max);
    }
    let mut manager_config = ManagerConfig::default().with_retry(retry);
    if let Some(output) = cli.output.clone() {
        manager_config = manager_config.with_destination(output);
    }

    let options = DownloadOptions {
        format: cli.format,
        quality: cli.quality,
        subtitles: cli.subtitles,
    };

    let extractor = Arc::new(YtDlpExtractor::new());
    let (manager, mut events) = DownloadManager::new(extractor, manager_config);

    let mut rejected = 0usize;
    let mut enqueued = 0usize;
    for raw in &cli.urls {
        match Url::parse(raw) {
            Ok(url) => {
                // A URL that fails to resolve is recorded as a failed task;
                // the remaining URLs still go in.
                match manager.enqueue(url, options).await {
                    Ok(ids) => enqueued += ids.len(),
                    Err(_) => log::warn!("Continuing with the remaining URLs"),
                }
            }
            Err(e) => {
                log::error!("Skipping {raw}: not a valid URL ({e})");
                rejected += 1;
            }
        }
    }

    if enqueued > 0 {
        manager.start().await;
        loop {
            match events.recv().await {
                Some(event) => {
                    if cli.json {
                        print_json(&event);
                    }
                    if matches!(event, QueueEvent::Drained { .. }) {
                        break;
                    }
                }
                None => anyhow::bail!("event channel closed before the queue drained"),
            }
        }
    } else if cli.json {
        // Nothing will run, but the resolution failures already produced
        // events worth reporting.
        while let Ok(event) = events.try_recv() {
            print_json(&event);
        }
    }

    let stats = manager.stats().await;
    if !cli.json {
        print_summary(&manager.snapshot().await, &stats);
    }

    let failed = stats.failed + rejected;
    if failed > 0 {
        anyhow::bail!("{failed} item(s) failed");
    }
    Ok(())
}

fn print_json(event: &QueueEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{line}"),
        Err(e) => log::warn!("Failed to serialize event: {e}"),
    }
}

fn print_summary(tasks: &[DownloadTask], stats: &QueueStats) {
    println!();
    println!("{:<42} {:>10} {:>12} {:>12}", "Title", "Size", "Status", "Speed");
    for task in tasks {
        let size = task
            .size_bytes
            .map(format_size)
            .unwrap_or_else(|| "--".to_string());
        let speed = task
            .progress
            .map(|p| p.speed_label())
            .unwrap_or_else(|| "--".to_string());
        println!(
            "{:<42} {:>10} {:>12} {:>12}",
            truncate(task.display_title(), 40),
            size,
            task.state.label(),
            speed
        );
    }
    println!();
    println!("Total size: {}", format_size(stats.total_downloaded_bytes));
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}
