use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    prelude::*,
    EnvFilter,
};

const DEFAULT_FILTER: &str = "ferry_core=debug,ferry_transport=debug,ferry_peer=debug,warn";
const TEST_FILTER: &str = "ferry_core=trace,ferry_transport=trace,ferry_peer=trace,debug";

/// Line format of the log file. The console always gets text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `FERRY_LOG_FORMAT=json` selects JSON lines.
    pub fn from_env() -> Self {
        match std::env::var("FERRY_LOG_FORMAT") {
            Ok(value) if value.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Console logging on stderr plus a daily rolling file under `log_dir`.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    log_prefix: &str,
    format: LogFormat,
) -> anyhow::Result<()> {
    let log_dir_path = log_dir.as_ref();
    std::fs::create_dir_all(log_dir_path)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(log_prefix)
        .build(log_dir_path)?;
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr);

    let (text_file, json_file) = match format {
        LogFormat::Text => (
            Some(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_writer(file_writer),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(file_writer),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(text_file)
        .with(json_file)
        .try_init()?;

    // Dropping the guard would stop the file writer
    std::mem::forget(guard);

    tracing::info!("Logging to {:?} ({:?})", log_dir_path, format);
    Ok(())
}

/// Console-only logging captured by the test harness. Safe to call repeatedly.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(TEST_FILTER)),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_is_repeatable() {
        init_test_logging();
        init_test_logging();
        tracing::debug!("still alive");
    }

    #[test]
    fn test_default_format_is_text() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }
}
