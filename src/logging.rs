// src/logging.rs

//! Log setup
//!
//! Everything a run logs goes to one file so the per-container messages
//! survive next to the daemons' own logs. The file is capped at
//! [`MAX_LOG_FILE_SIZE`]; full files are rotated to numbered, gzipped
//! backups. `RUST_LOG` takes precedence over the level given on the
//! command line.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Directive used when neither `RUST_LOG` nor the given level parses
const FALLBACK_LEVEL: &str = "info";

/// Size at which the log file is rotated
pub const MAX_LOG_FILE_SIZE: usize = 10 * 1024 * 1024;
/// Rotated files kept next to the live one
pub const MAX_LOG_BACKUPS: usize = 10;

const LOG_FILE_MODE: u32 = 0o640;

/// Build the filter for `level`, letting `RUST_LOG` override it
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
}

/// Size-capped writer for `path`, creating its parent directory first
///
/// Fails if the file cannot be opened for appending.
pub fn rotating_writer(path: &Path, max_bytes: usize) -> io::Result<FileRotate<AppendCount>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)?;

    Ok(FileRotate::new(
        path,
        AppendCount::new(MAX_LOG_BACKUPS),
        ContentLimit::Bytes(max_bytes),
        Compression::OnRotate(0),
        Some(LOG_FILE_MODE),
    ))
}

/// Install the global subscriber
///
/// Falls back to stdout when the log file cannot be opened. The returned
/// guard flushes buffered lines when dropped and must outlive the run.
pub fn init(path: &Path, level: &str) -> Option<WorkerGuard> {
    match rotating_writer(path, MAX_LOG_FILE_SIZE) {
        Ok(writer) => {
            let (writer, guard) = tracing_appender::non_blocking(writer);
            tracing_subscriber::fmt()
                .with_env_filter(filter(level))
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        Err(e) => {
            println!(
                "cannot open log file {}: {}, logging to stdout",
                path.display(),
                e
            );
            tracing_subscriber::fmt()
                .with_env_filter(filter(level))
                .with_writer(io::stdout)
                .init();
            None
        }
    }
}
