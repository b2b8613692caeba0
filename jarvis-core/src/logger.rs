use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter: `info`, with chatty audio and ML crates held at `warn`.
const DEFAULT_FILTER: &str = "info,ort=warn,cpal=warn,rodio=warn,symphonia=warn,whisper_rs=warn";

/// Initialize the structured logging system.
///
/// Sets up:
/// - File output: rolling `jarvis.<date>.log` files in `log_dir`, daily
///   rotation, keeping the latest 5 files.
/// - Console output (stderr): compact, human-readable.
/// - Environment filter: `RUST_LOG`, defaulting to [`DEFAULT_FILTER`].
///
/// If the log directory cannot be used, logging continues on the console
/// only. Fails if a global subscriber is already installed.
pub fn init(log_dir: &Path) -> anyhow::Result<()> {
    let (file_layer, file_error) = match open_appender(log_dir) {
        Ok(appender) => {
            let layer = fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(true)
                .with_line_number(true);
            (Some(layer), None)
        }
        Err(e) => (None, Some(e)),
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logger already initialized: {e}"))?;

    match file_error {
        None => tracing::info!(log_dir = %log_dir.display(), "Logger initialized"),
        Some(e) => tracing::warn!(
            log_dir = %log_dir.display(),
            error = %e,
            "File logging unavailable, logging to console only"
        ),
    }
    Ok(())
}

fn open_appender(log_dir: &Path) -> anyhow::Result<RollingFileAppender> {
    fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("jarvis")
        .filename_suffix("log")
        .max_log_files(5)
        .build(log_dir)?;
    Ok(appender)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appender_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");
        open_appender(&logs).unwrap();
        assert!(logs.is_dir());
    }

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
