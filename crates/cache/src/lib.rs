//! Descriptor and app-version cache
//!
//! Two caches with a shared two-tier layout (bounded in-memory LRU,
//! write-through JSON files on disk):
//!
//! - the **schema cache**, keyed by gRPC endpoint, holding the reflection
//!   descriptor blob needed to frame typed queries;
//! - the **version cache**, keyed by chain id, holding the last observed
//!   `app_version` so schema refreshes only happen across upgrades.
//!
//! Disk state is advisory: missing directories are created on demand and
//! unparsable files are treated as misses. Refreshes of the same endpoint
//! are single-flighted.

mod entry;
mod fetch;
mod store;

pub use entry::{DescriptorCacheEntry, VersionCheck, VersionProbe};
pub use fetch::{FetchError, SchemaFetcher, TendermintVersionFetcher, VersionFetcher};
pub use store::{endpoint_slug, CacheSettings, DescriptorCache};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("schema fetch for {endpoint} failed: {reason}")]
    SchemaFetch { endpoint: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
