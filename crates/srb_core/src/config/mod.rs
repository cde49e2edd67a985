//! Configuration: TOML-backed settings with atomic persistence.

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, LoggingSettings, PathSettings, PoolSettings, Settings, ToolSettings,
};
