use anyhow::{Context, Result};
use log::LevelFilter;

pub mod commands;

/// Pick the log level: each `-v` raises it one step from Info; without
/// flags the configured level (if any) applies.
pub fn log_level(verbosity: u8, configured: Option<&str>) -> LevelFilter {
    match verbosity {
        0 => configured.and_then(|level| level.parse().ok()).unwrap_or(LevelFilter::Info),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Route `log` records to stderr with a timestamp.
pub fn setup_logging(level: LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{:5}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("Failed to configure logging")
}
