//! Per-batch log sink with file and callback output.
//!
//! Each batch gets its own logger that:
//! - Appends `<timestamp> [<severity>] <message>` lines to a log file
//! - Forwards each formatted line to an optional callback

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use super::types::{LogCallback, LogConfig, Severity};

/// Append-only batch logger with dual output (file + callback).
pub struct BatchLogger {
    /// Batch name for identification.
    batch_name: String,
    /// Path to the log file.
    log_path: PathBuf,
    /// File writer (buffered).
    file_writer: Arc<Mutex<Option<BufWriter<File>>>>,
    /// Display callback for live output.
    callback: Arc<Mutex<Option<LogCallback>>>,
    /// Logging configuration.
    config: LogConfig,
}

impl BatchLogger {
    /// Create a new batch logger.
    ///
    /// The log file is opened in append mode so repeated batches in the
    /// same session accumulate into one record per batch name.
    pub fn new(
        batch_name: impl Into<String>,
        log_dir: impl AsRef<Path>,
        config: LogConfig,
        callback: Option<LogCallback>,
    ) -> std::io::Result<Self> {
        let batch_name = batch_name.into();
        let log_dir = log_dir.as_ref();

        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("{}.log", sanitize_filename(&batch_name)));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            batch_name,
            log_path,
            file_writer: Arc::new(Mutex::new(Some(BufWriter::new(file)))),
            callback: Arc::new(Mutex::new(callback)),
            config,
        })
    }

    /// Get the batch name.
    pub fn batch_name(&self) -> &str {
        &self.batch_name
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log a message with the given severity.
    pub fn log(&self, severity: Severity, message: &str) {
        let formatted = self.format_line(severity, message);

        if self.config.echo_to_tracing {
            tracing::debug!(batch = %self.batch_name, "{}", formatted);
        }

        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writeln!(writer, "{}", formatted);
        }

        if let Some(ref callback) = *self.callback.lock() {
            callback(&formatted);
        }
    }

    /// Log an info message.
    pub fn info(&self, message: &str) {
        self.log(Severity::Info, message);
    }

    /// Log a command being executed.
    pub fn command(&self, command: &str) {
        self.log(Severity::Command, &format!("$ {}", command));
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        self.log(Severity::Success, message);
    }

    /// Log a warning message.
    pub fn warn(&self, message: &str) {
        self.log(Severity::Warning, message);
    }

    /// Log an error message.
    pub fn error(&self, message: &str) {
        self.log(Severity::Error, message);
    }

    /// Flush the log file.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.file_writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Close the logger and release the file handle.
    pub fn close(&self) {
        self.flush();
        *self.file_writer.lock() = None;
    }

    /// `<timestamp> [<severity>] <message>`, timestamp optional.
    fn format_line(&self, severity: Severity, message: &str) -> String {
        if self.config.show_timestamps {
            let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
            format!("{} [{}] {}", timestamp, severity, message)
        } else {
            format!("[{}] {}", severity, message)
        }
    }
}

impl Drop for BatchLogger {
    fn drop(&mut self) {
        self.close();
    }
}

/// Sanitize a string to be safe for use as a filename.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
