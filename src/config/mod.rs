// Configuration management module
// TOML settings for the vector store, analytical store and service

pub mod settings;


pub use settings::{AnalyticalConfig, Config, ConfigError, ServerConfig, VectorStoreConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
