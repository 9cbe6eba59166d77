use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Settings;

pub const LOG_FILTER_ENV: &str = "TUI_RSS_LOG";
const DAYS_TO_KEEP: usize = 7;

/// Sends logs to a daily file so nothing is printed over the terminal UI.
/// Keep the returned guard alive until exit to flush buffered lines.
pub fn init() -> Result<WorkerGuard> {
    let log_dir = Settings::data_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(DAYS_TO_KEEP)
        .filename_prefix("tui-rss")
        .filename_suffix("log")
        .build(&log_dir)
        .context("Failed to create log file appender")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env_filter =
        EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .with_level(true),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
