use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One schema cache record as persisted under `descriptors/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorCacheEntry {
    pub endpoint: String,

    /// App version the schema was fetched under; a live version that
    /// differs makes this entry stale.
    pub chain_app_version: u64,

    pub fetched_at: DateTime<Utc>,

    /// Base64 of the serialized query-services descriptor.
    pub schema: String,
}

impl DescriptorCacheEntry {
    pub fn schema_bytes(&self) -> Option<Vec<u8>> {
        use base64::Engine as _;
        base64::engine::general_purpose::STANDARD
            .decode(&self.schema)
            .ok()
    }
}

/// One version cache record inside `versions.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionProbe {
    pub chain_id: String,
    pub app_version: u64,
    pub last_checked_at: DateTime<Utc>,
}

/// Outcome of `check_needs_update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionCheck {
    pub needs_update: bool,

    /// Live version, when a probe actually ran.
    pub current: Option<u64>,

    /// Version on record before the check.
    pub cached: Option<u64>,
}
