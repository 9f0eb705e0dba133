//! Durable error log.
//!
//! # Responsibilities
//! - Append `[timestamp] message` lines to the error log file
//! - Create the log's parent directory on first use
//! - Echo records to the console unless quiet mode is on
//!
//! # Design Decisions
//! - No long-lived file handle: every record opens, appends once, and closes
//! - File access runs on the blocking pool so request workers never stall on disk
//! - Each line is written with a single `write_all` on an append handle
//! - The startup line truncates the file to mark a fresh run

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::config::LoggingConfig;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render one log line, including the trailing newline.
pub fn format_line(timestamp: DateTime<Local>, message: &str) -> String {
    format!("[{}] {}\n", timestamp.format(TIMESTAMP_FORMAT), message)
}

/// Append-only diagnostic log shared by every request worker.
#[derive(Debug, Clone)]
pub struct ErrorSink {
    path: PathBuf,
    quiet: bool,
}

impl ErrorSink {
    pub fn new(path: impl Into<PathBuf>, quiet: bool) -> Self {
        Self {
            path: path.into(),
            quiet,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(config.error_log.clone(), config.quiet)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Truncate the log and write the first line of a new run.
    pub async fn start_run(&self, message: &str) -> io::Result<()> {
        self.write_line(message, true).await
    }

    /// Append a record, echoing it to the console unless quiet.
    ///
    /// A failure to write the file is reported on the console and otherwise ignored.
    pub async fn record(&self, message: &str) {
        if let Err(e) = self.try_record(message).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write error log");
        }
        if !self.quiet {
            tracing::error!("{}", message);
        }
    }

    /// Append a record to the file only.
    pub async fn try_record(&self, message: &str) -> io::Result<()> {
        self.write_line(message, false).await
    }

    async fn write_line(&self, message: &str, truncate: bool) -> io::Result<()> {
        let path = self.path.clone();
        let line = format_line(Local::now(), message);

        tokio::task::spawn_blocking(move || write_to(&path, &line, truncate))
            .await
            .map_err(io::Error::other)?
    }
}

/// Open `path` and write `line` with a single `write_all`.
fn write_to(path: &Path, line: &str, truncate: bool) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    if truncate {
        options.write(true).create(true).truncate(true);
    } else {
        options.append(true).create(true);
    }

    options.open(path)?.write_all(line.as_bytes())
}
