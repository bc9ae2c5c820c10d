//! Subscriber setup for the `blewatch` binary.
//!
//! Everything goes to stderr so stdout stays reserved for device listings. With
//! `log.production` set, a JSON copy of every event is also appended to a daily file
//! under `<data dir>/logs`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use blewatch_core::LogConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "blewatch";

/// Flushes the JSON file writer on exit.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. Log files go under `data_dir`, or the platform
/// data directory when none is configured.
///
/// # Errors
///
/// Returns an error if the filter directive is invalid or the log directory cannot be
/// created.
pub fn init(config: &LogConfig, data_dir: Option<&Path>) -> anyhow::Result<()> {
    let filter = build_filter(&config.level)?;

    let file_layer = if config.production {
        let dir = log_directory(data_dir);
        std::fs::create_dir_all(&dir)?;
        let appender = RollingFileAppender::new(Rotation::DAILY, &dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
    } else {
        None
    };

    // compact when a file copy exists, readable otherwise
    let stderr_layer = if config.production {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;
    Ok(())
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?)
}

fn log_directory(data_dir: Option<&Path>) -> PathBuf {
    let base = data_dir.map_or_else(
        || blewatch_core::default_data_dir().unwrap_or_default(),
        Path::to_path_buf,
    );
    base.join("logs")
}
