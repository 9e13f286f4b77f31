use crate::config::AppConfig;
use anyhow::{Context, Result};
use std::fs::OpenOptions;

/// Send log records to a file in the data directory. The terminal belongs
/// to the UI, so nothing may be written to stderr while it runs.
pub fn init_logging(config: &AppConfig) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
    let log_path = config.log_file();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    env_logger::Builder::new()
        .parse_filters(&config.log_filter)
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}
