//! Configuration loading from files and the environment

use crate::{AppConfig, ConfigError, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Configuration loader with support for multiple formats and sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file, picking the format by extension
    pub fn from_file(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)?;

        match file_format(path)? {
            FileFormat::Json => Self::from_json(&content),
            _ => Self::from_toml(&content),
        }
    }

    pub fn from_toml(content: &str) -> Result<AppConfig> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn from_json(content: &str) -> Result<AppConfig> {
        serde_json::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration from `ESCROW_AUDIT_*` environment variables,
    /// e.g. `ESCROW_AUDIT_API_RETRIES=5`.
    pub fn from_env() -> Result<AppConfig> {
        Self::from_env_with_prefix("ESCROW_AUDIT")
    }

    pub fn from_env_with_prefix(prefix: &str) -> Result<AppConfig> {
        let config = Config::builder()
            .add_source(Environment::with_prefix(prefix).separator("_"))
            .build()?;

        config.try_deserialize().map_err(ConfigError::from)
    }

    /// Load from file with environment overrides layered on top.
    ///
    /// Both sources feed one key-level merge, so an environment variable
    /// overrides exactly the key it names and every other file value
    /// survives.
    pub fn from_file_with_env(path: &Path, env_prefix: &str) -> Result<AppConfig> {
        let config = Config::builder()
            .add_source(File::from(path).format(file_format(path)?).required(true))
            .add_source(Environment::with_prefix(env_prefix).separator("_"))
            .build()?;

        config.try_deserialize().map_err(ConfigError::from)
    }
}

fn file_format(path: &Path) -> Result<FileFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(FileFormat::Toml),
        Some("json") => Ok(FileFormat::Json),
        Some(other) => Err(ConfigError::LoadError(format!(
            "unsupported file extension: {other}"
        ))),
        None => Err(ConfigError::LoadError("no file extension".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuditMode;
    use std::io::Write;

    #[test]
    fn test_load_from_toml() {
        let toml = r#"
            [api]
            retries = 5
            delay_ms = 100

            [audit]
            default_mode = "comprehensive"
            use_binary_transport = false

            [cache]
            version_check_interval_ms = 3600000

            [data]
            dir = "/tmp/escrow-audit-data"
        "#;

        let config = ConfigLoader::from_toml(toml).unwrap();
        assert_eq!(config.api.retries, 5);
        assert_eq!(config.api.delay_ms, 100);
        // Unset fields keep their defaults.
        assert_eq!(config.api.timeout_ms, 30_000);
        assert_eq!(config.audit.default_mode, AuditMode::Comprehensive);
        assert!(!config.audit.use_binary_transport);
        assert_eq!(config.cache.version_check_interval_ms, 3_600_000);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{
            "api": { "retries": 2 },
            "audit": { "escrow_port": "transfer" }
        }"#;

        let config = ConfigLoader::from_json(json).unwrap();
        assert_eq!(config.api.retries, 2);
        assert_eq!(config.audit.escrow_port, "transfer");
    }

    #[test]
    fn test_load_from_file() {
        let toml = r#"
            [api]
            retries = 7
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        let config = ConfigLoader::from_file(file.path()).unwrap();
        assert_eq!(config.api.retries, 7);
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        assert!(ConfigLoader::from_file(file.path()).is_err());
        assert!(ConfigLoader::from_file_with_env(file.path(), "ESCROW_AUDIT_TEST").is_err());
    }

    #[test]
    fn test_file_values_survive_env_overlay() {
        let toml = r#"
            [api]
            retries = 9

            [audit]
            escrow_port = "ics20"
            use_binary_transport = false
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        // No matching env vars set: every file value must come through
        // unchanged, and unset keys keep their defaults.
        let config =
            ConfigLoader::from_file_with_env(file.path(), "ESCROW_AUDIT_UNSET_PREFIX").unwrap();
        assert_eq!(config.api.retries, 9);
        assert_eq!(config.audit.escrow_port, "ics20");
        assert!(!config.audit.use_binary_transport);
        assert_eq!(config.api.timeout_ms, 30_000);
    }

    #[test]
    fn test_env_overrides_only_named_keys() {
        let toml = r#"
            [api]
            retries = 9

            [audit]
            escrow_port = "ics20"
        "#;

        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(toml.as_bytes()).unwrap();

        // Env prefixes are per-test so parallel tests cannot interfere.
        std::env::set_var("ESCROW_AUDIT_OVERLAY_API_RETRIES", "4");
        let config =
            ConfigLoader::from_file_with_env(file.path(), "ESCROW_AUDIT_OVERLAY").unwrap();
        std::env::remove_var("ESCROW_AUDIT_OVERLAY_API_RETRIES");

        // The named key is overridden; the rest of the file survives.
        assert_eq!(config.api.retries, 4);
        assert_eq!(config.audit.escrow_port, "ics20");
    }
}
