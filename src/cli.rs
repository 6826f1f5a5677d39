use clap::Parser;
use std::path::PathBuf;

use crate::download::task::{MediaFormat, Quality};

#[derive(Parser)]
#[command(name = "downline")]
#[command(author, version, about = "Single-worker download queue on top of yt-dlp", long_about = None)]
pub struct Cli {
    /// Media page or playlist URLs to download, processed in order
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Directory downloads are written to
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Container or codec of the result (mp4, mp3, mkv, webm)
    #[arg(short, long, default_value = "mp4")]
    pub format: MediaFormat,

    /// Resolution cap (best, 1080p, 720p, 360p, 144p)
    #[arg(short, long, default_value = "best")]
    pub quality: Quality,

    /// Also fetch English subtitles
    #[arg(long)]
    pub subtitles: bool,

    /// Retries allowed after a failed download attempt
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Log file path (defaults to LOG_FILE_PATH or downline.log)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<String>,

    /// Print queue events as JSON lines instead of the summary table
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
