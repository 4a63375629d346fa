//! Core configuration structures for the IBC escrow audit tool

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Query client behavior
    #[serde(default)]
    pub api: ApiConfig,

    /// Audit orchestration defaults
    #[serde(default)]
    pub audit: AuditConfig,

    /// Descriptor/version cache behavior
    #[serde(default)]
    pub cache: CacheConfig,

    /// Local data store locations
    #[serde(default)]
    pub data: DataConfig,
}

/// Query client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Maximum attempts per endpoint
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base backoff delay in milliseconds; doubles per attempt
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Per-attempt deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Endpoint host fragments whose responses are decoded verbatim,
    /// bypassing the legacy `result` envelope unwrap
    #[serde(default = "default_passthrough_hosts")]
    pub passthrough_hosts: Vec<String>,
}

/// Audit orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Mode used when the CLI does not specify one
    #[serde(default)]
    pub default_mode: AuditMode,

    /// Port id of the transfer module
    #[serde(default = "default_escrow_port")]
    pub escrow_port: String,

    /// Prefer the binary (gRPC) transport over REST
    #[serde(default = "default_true")]
    pub use_binary_transport: bool,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum interval between app-version probes, in milliseconds
    #[serde(default = "default_version_check_interval_ms")]
    pub version_check_interval_ms: u64,

    /// Schema cache TTL in milliseconds
    #[serde(default = "default_schema_ttl_ms")]
    pub schema_ttl_ms: u64,

    /// Disk cache root; defaults to `<data.dir>/cache`
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Local data store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory the registry mirror populates
    #[serde(default = "default_data_dir")]
    pub dir: PathBuf,
}

/// Audit modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Audit only the native staking token of each chain
    #[default]
    Quick,

    /// Audit every balance in the escrow account
    Comprehensive,

    /// Quick-mode steps against an operator-supplied channel id
    Manual,
}

/// Transport selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportPreference {
    /// gRPC only
    Binary,

    /// REST only
    Text,

    /// gRPC pass first, REST fallback
    #[default]
    Auto,
}

impl AppConfig {
    /// Effective disk cache root.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| self.data.dir.join("cache"))
    }

    /// Transport preference implied by `audit.use_binary_transport`.
    pub fn transport_preference(&self) -> TransportPreference {
        if self.audit.use_binary_transport {
            TransportPreference::Auto
        } else {
            TransportPreference::Text
        }
    }
}

// Default value functions
fn default_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    250
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_passthrough_hosts() -> Vec<String> {
    vec!["sei".to_string()]
}

fn default_escrow_port() -> String {
    "transfer".to_string()
}

fn default_true() -> bool {
    true
}

fn default_version_check_interval_ms() -> u64 {
    86_400_000 // 24 hours
}

fn default_schema_ttl_ms() -> u64 {
    86_400_000 // 24 hours
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            delay_ms: default_delay_ms(),
            timeout_ms: default_timeout_ms(),
            passthrough_hosts: default_passthrough_hosts(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_mode: AuditMode::Quick,
            escrow_port: default_escrow_port(),
            use_binary_transport: default_true(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version_check_interval_ms: default_version_check_interval_ms(),
            schema_ttl_ms: default_schema_ttl_ms(),
            dir: None,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: default_data_dir(),
        }
    }
}
