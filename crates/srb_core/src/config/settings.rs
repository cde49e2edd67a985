//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML
//! tables. Each section can be updated independently for atomic
//! section-level updates.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::{BatchConfig, UpscaleModel};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// External tool settings.
    #[serde(default)]
    pub tool: ToolSettings,

    /// Worker pool settings.
    #[serde(default)]
    pub pool: PoolSettings,

    /// Path-related settings.
    #[serde(default)]
    pub paths: PathSettings,

    /// Log sink configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Snapshot of the fields a batch needs at submission time.
    ///
    /// Later settings edits do not affect jobs created from an earlier
    /// snapshot.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            tool_path: PathBuf::from(&self.tool.executable),
            model: self.tool.model,
            max_concurrency: self.pool.effective_concurrency(),
        }
    }
}

/// External tool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    /// Path to the super-resolution executable.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Model passed to the tool via `-n`.
    #[serde(default)]
    pub model: UpscaleModel,
}

fn default_executable() -> String {
    "realesrgan-ncnn-vulkan".to_string()
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            model: UpscaleModel::default(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum number of jobs running simultaneously.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl PoolSettings {
    /// Configured concurrency clamped to `1..=CPU count`.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.clamp(1, num_cpus::get())
    }
}

/// Path configuration for log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Folder for batch log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            logs_folder: default_logs_folder(),
        }
    }
}

/// Log sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Prefix log lines with timestamps.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,

    /// Mirror formatted log lines to `tracing::debug!`.
    #[serde(default)]
    pub echo_to_tracing: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            show_timestamps: true,
            echo_to_tracing: false,
        }
    }
}

impl LoggingSettings {
    /// Convert to the log sink's runtime configuration.
    pub fn to_log_config(&self) -> crate::logging::LogConfig {
        crate::logging::LogConfig {
            show_timestamps: self.show_timestamps,
            echo_to_tracing: self.echo_to_tracing,
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Tool,
    Pool,
    Paths,
    Logging,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Tool => "tool",
            ConfigSection::Pool => "pool",
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_serializes() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        assert!(toml.contains("[tool]"));
        assert!(toml.contains("[pool]"));
        assert!(toml.contains("executable"));
    }

    #[test]
    fn settings_round_trip() {
        let settings = Settings::default();
        let toml = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.tool.executable, settings.tool.executable);
        assert_eq!(parsed.pool.max_concurrency, settings.pool.max_concurrency);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let minimal = "[tool]\nexecutable = \"/opt/sr/realesrgan-ncnn-vulkan\"";
        let parsed: Settings = toml::from_str(minimal).unwrap();
        assert_eq!(parsed.tool.executable, "/opt/sr/realesrgan-ncnn-vulkan");
        assert_eq!(parsed.pool.max_concurrency, 4);
        assert_eq!(parsed.tool.model, UpscaleModel::RealesrganX4plusAnime);
    }

    #[test]
    fn concurrency_clamped_to_cpu_count() {
        let pool = PoolSettings {
            max_concurrency: 0,
        };
        assert_eq!(pool.effective_concurrency(), 1);

        let pool = PoolSettings {
            max_concurrency: 10_000,
        };
        assert!(pool.effective_concurrency() <= num_cpus::get());
        assert!(pool.effective_concurrency() >= 1);
    }

    #[test]
    fn batch_config_snapshot_is_detached() {
        let mut settings = Settings::default();
        let snapshot = settings.batch_config();

        settings.tool.model = UpscaleModel::RealsrAnimevideov3X2;

        assert_eq!(snapshot.model, UpscaleModel::RealesrganX4plusAnime);
    }
}
