//! Logging types and configuration.

use serde::{Deserialize, Serialize};

/// Severity tag attached to every user-facing log line.
///
/// The vocabulary follows the colors the front end renders
/// (info/cyan, command/blue, success/green, warning/yellow, error/red).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Command,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Tag used inside the `[<severity>]` bracket of the log sink.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Command => "command",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for the batch log sink.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Prefix each line with a `%Y-%m-%d %H:%M:%S` timestamp.
    pub show_timestamps: bool,
    /// Mirror every formatted line to `tracing::debug!`.
    pub echo_to_tracing: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            echo_to_tracing: false,
        }
    }
}

/// Callback receiving each formatted log line, for live display.
pub type LogCallback = Box<dyn Fn(&str) + Send + Sync>;
