//! Logging initialization
//!
//! Console plus file output via simplelog's `CombinedLogger`. The file half
//! is skipped (with a terminal warning) when the log file cannot be created,
//! so a read-only working directory never prevents startup.

use anyhow::Result;
use simplelog::*;
use std::fs::File;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Errors
/// Returns an error if the logger is already initialized.
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let term = TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    );

    let loggers: Vec<Box<dyn SharedLogger>> = match File::create(log_file_path) {
        Ok(log_file) => vec![
            term,
            WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
        ],
        Err(e) => {
            eprintln!("warning: cannot create log file {}: {}", log_file_path, e);
            vec![term]
        }
    };

    CombinedLogger::init(loggers).map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}
