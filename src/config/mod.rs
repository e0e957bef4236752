// Configuration management module
// TOML settings with validation, loaded from the platform config directory

pub mod settings;

pub use settings::{Config, ConfigError, LlmConfig, OllamaConfig, ServerConfig, StorageConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
