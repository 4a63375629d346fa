//! Configuration for the IBC escrow audit tool

mod config;
mod loader;

pub use crate::config::{
    ApiConfig, AppConfig, AuditConfig, AuditMode, CacheConfig, DataConfig, TransportPreference,
};
pub use loader::ConfigLoader;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("config source error: {0}")]
    SourceError(#[from] ::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
