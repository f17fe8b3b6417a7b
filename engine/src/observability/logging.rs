use crate::config::LoggingConfig;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "qkernel.log";

/// Default log directory: `~/.qkernel/logs`
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".qkernel")
        .join("logs")
}

/// Initialize logging from the `[logging]` config section
///
/// Returns the log directory when file logging is enabled.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Option<PathBuf>> {
    if config.log_to_file {
        let log_dir = config.log_dir.clone().unwrap_or_else(default_log_dir);
        init_production_logging(&config.level, Some(log_dir.clone()))?;
        Ok(Some(log_dir))
    } else {
        init_simple_logging(&config.level)?;
        Ok(None)
    }
}

/// `RUST_LOG` overrides the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize run logging with file rotation
///
/// Sets up dual output:
/// - Daily rotating log files in `log_dir` (default `~/.qkernel/logs/qkernel.log`)
/// - Stderr with pretty formatting, so stdout stays free for command output
/// - Configurable via RUST_LOG environment variable
///
/// The file layer also records span closes, so every run leaves one line with
/// its `run_id` and total busy/idle time.
pub fn init_production_logging(level: &str, log_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let log_dir = log_dir.unwrap_or_else(default_log_dir);

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_NAME);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::CLOSE),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_line_number(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!(
        log_dir = %log_dir.display(),
        level = %level,
        "File logging initialized"
    );

    Ok(())
}

/// Initialize simple logging for CLI commands (stderr only)
pub fn init_simple_logging(level: &str) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_line_number(false),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
