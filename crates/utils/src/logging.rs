//! provides logging helpers

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

const MAX_LOG_FILES: usize = 3;

fn env_filter() -> filter::EnvFilter {
    filter::EnvFilter::builder()
        .with_default_directive(filter::LevelFilter::INFO.into())
        .from_env_lossy()
}

/// initiate the global tracing subscriber
///
/// Logs always go to stderr. When `log_file` is given, a daily rolling copy is
/// written next to it as well; keep the returned guard alive until exit so
/// buffered lines are flushed.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let fmt_layer = layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(env_filter());

    let Some(log_file) = log_file else {
        registry().with(fmt_layer).init();
        return Ok(None);
    };

    let (file_writer, file_guard) = file_writer(log_file)?;
    let file_layer = layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(env_filter());

    registry().with(fmt_layer).with(file_layer).init();
    Ok(Some(file_guard))
}

fn file_writer(
    log_file: &Path,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let dir = log_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let prefix = log_file
        .file_name()
        .and_then(|f| f.to_str())
        .context("log file path has no valid file name")?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .with_context(|| format!("failed to create rolling file appender in {dir:?}"))?;

    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_writer_rejects_path_without_file_name() {
        let result = file_writer(Path::new("/"));
        assert!(result.is_err(), "root path has no file name");
    }

    #[test]
    fn file_writer_creates_appender_in_parent_dir() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("host-monitor.log");

        let (_writer, _guard) = file_writer(&path).expect("should build file writer");
    }
}
