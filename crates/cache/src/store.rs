use chrono::Utc;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::entry::{DescriptorCacheEntry, VersionCheck, VersionProbe};
use crate::fetch::{SchemaFetcher, VersionFetcher};
use crate::CacheError;

const DESCRIPTORS_DIR: &str = "descriptors";
const VERSIONS_FILE: &str = "versions.json";

/// Cache behavior knobs.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Disk cache root.
    pub dir: PathBuf,

    /// Memory TTL for schema entries.
    pub schema_ttl: Duration,

    /// Memory TTL for version probes.
    pub version_ttl: Duration,

    /// Minimum interval between live version probes.
    pub version_check_interval: Duration,

    /// Bound on each memory LRU.
    pub max_entries: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/cache"),
            schema_ttl: Duration::from_secs(24 * 60 * 60),
            version_ttl: Duration::from_secs(6 * 60 * 60),
            version_check_interval: Duration::from_secs(24 * 60 * 60),
            max_entries: 64,
        }
    }
}

struct TimedEntry<T> {
    value: T,
    cached_at: Instant,
}

/// Two-tier descriptor and version cache.
///
/// Shared across audits; all mutation goes through the methods here.
/// Writes are serialized per key and schema refreshes are single-flighted.
pub struct DescriptorCache {
    settings: CacheSettings,
    version_fetcher: Arc<dyn VersionFetcher>,
    schemas: Mutex<LruCache<String, TimedEntry<DescriptorCacheEntry>>>,
    versions: Mutex<LruCache<String, TimedEntry<VersionProbe>>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DescriptorCache {
    pub fn new(settings: CacheSettings, version_fetcher: Arc<dyn VersionFetcher>) -> Self {
        let capacity = NonZeroUsize::new(settings.max_entries.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            settings,
            version_fetcher,
            schemas: Mutex::new(LruCache::new(capacity)),
            versions: Mutex::new(LruCache::new(capacity)),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Decide whether the schema for `chain_id` needs a refresh.
    ///
    /// Within the probe interval the cached verdict stands and no network
    /// traffic happens. Outside it the live `app_version` is probed and
    /// compared. A failed probe is pessimistic with an empty cache and
    /// stale-tolerant otherwise.
    pub async fn check_needs_update(&self, chain_id: &str, rpc_endpoint: &str) -> VersionCheck {
        let now = Utc::now();
        let cached = self.lookup_version(chain_id).await;

        if let Some(probe) = &cached {
            // A future-dated stamp counts as fresh.
            let fresh = now
                .signed_duration_since(probe.last_checked_at)
                .to_std()
                .map(|age| age < self.settings.version_check_interval)
                .unwrap_or(true);
            if fresh {
                debug!(chain_id, version = probe.app_version, "version probe within interval");
                return VersionCheck {
                    needs_update: false,
                    current: None,
                    cached: Some(probe.app_version),
                };
            }
        }

        match self.version_fetcher.app_version(rpc_endpoint).await {
            Ok(current) => {
                let cached_version = cached.as_ref().map(|p| p.app_version);
                let needs_update = cached_version != Some(current);
                self.store_version(VersionProbe {
                    chain_id: chain_id.to_string(),
                    app_version: current,
                    last_checked_at: now,
                })
                .await;
                if needs_update {
                    debug!(chain_id, ?cached_version, current, "app version changed");
                }
                VersionCheck {
                    needs_update,
                    current: Some(current),
                    cached: cached_version,
                }
            }
            Err(e) => {
                warn!(chain_id, endpoint = %rpc_endpoint, error = %e, "version probe failed");
                VersionCheck {
                    needs_update: cached.is_none(),
                    current: None,
                    cached: cached.map(|p| p.app_version),
                }
            }
        }
    }

    /// Return the cached schema for `endpoint`, fetching it when absent or
    /// recorded under a different app version. Concurrent callers for the
    /// same endpoint share one fetch.
    pub async fn ensure_schema(
        &self,
        endpoint: &str,
        current_version: Option<u64>,
        fetcher: &dyn SchemaFetcher,
    ) -> Result<DescriptorCacheEntry, CacheError> {
        if let Some(entry) = self.lookup_schema(endpoint).await {
            if current_version.map_or(true, |v| v == entry.chain_app_version) {
                return Ok(entry);
            }
        }

        let gate = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(endpoint.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = gate.lock().await;

        // A concurrent refresh may have landed while waiting on the gate.
        if let Some(entry) = self.lookup_schema(endpoint).await {
            if current_version.map_or(true, |v| v == entry.chain_app_version) {
                return Ok(entry);
            }
        }

        debug!(endpoint, ?current_version, "fetching schema descriptor");
        let blob = fetcher
            .fetch_schema(endpoint)
            .await
            .map_err(|e| CacheError::SchemaFetch {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        use base64::Engine as _;
        let entry = DescriptorCacheEntry {
            endpoint: endpoint.to_string(),
            chain_app_version: current_version.unwrap_or(0),
            fetched_at: Utc::now(),
            schema: base64::engine::general_purpose::STANDARD.encode(blob),
        };

        self.write_disk_schema(&entry)?;
        self.schemas.lock().await.put(
            endpoint.to_string(),
            TimedEntry {
                value: entry.clone(),
                cached_at: Instant::now(),
            },
        );
        Ok(entry)
    }

    /// Memory-then-disk schema lookup without fetching.
    pub async fn lookup_schema(&self, endpoint: &str) -> Option<DescriptorCacheEntry> {
        {
            let mut schemas = self.schemas.lock().await;
            if let Some(timed) = schemas.get(endpoint) {
                if timed.cached_at.elapsed() < self.settings.schema_ttl {
                    return Some(timed.value.clone());
                }
                schemas.pop(endpoint);
            }
        }

        let entry = self.read_disk_schema(endpoint)?;
        self.schemas.lock().await.put(
            endpoint.to_string(),
            TimedEntry {
                value: entry.clone(),
                cached_at: Instant::now(),
            },
        );
        Some(entry)
    }

    async fn lookup_version(&self, chain_id: &str) -> Option<VersionProbe> {
        {
            let mut versions = self.versions.lock().await;
            if let Some(timed) = versions.get(chain_id) {
                if timed.cached_at.elapsed() < self.settings.version_ttl {
                    return Some(timed.value.clone());
                }
                versions.pop(chain_id);
            }
        }

        let probe = self.read_disk_versions().remove(chain_id)?;
        self.versions.lock().await.put(
            chain_id.to_string(),
            TimedEntry {
                value: probe.clone(),
                cached_at: Instant::now(),
            },
        );
        Some(probe)
    }

    async fn store_version(&self, probe: VersionProbe) {
        if let Err(e) = self.write_disk_version(&probe) {
            warn!(chain_id = %probe.chain_id, error = %e, "failed to persist version probe");
        }
        self.versions.lock().await.put(
            probe.chain_id.clone(),
            TimedEntry {
                value: probe,
                cached_at: Instant::now(),
            },
        );
    }

    /// Number of schema entries on disk, for `status` output.
    pub fn schema_entry_count(&self) -> usize {
        let dir = self.settings.dir.join(DESCRIPTORS_DIR);
        std::fs::read_dir(dir)
            .map(|entries| entries.filter_map(|e| e.ok()).count())
            .unwrap_or(0)
    }

    /// Number of version probes on disk, for `status` output.
    pub fn version_entry_count(&self) -> usize {
        self.read_disk_versions().len()
    }

    fn descriptors_dir(&self) -> PathBuf {
        self.settings.dir.join(DESCRIPTORS_DIR)
    }

    fn versions_path(&self) -> PathBuf {
        self.settings.dir.join(VERSIONS_FILE)
    }

    fn read_disk_schema(&self, endpoint: &str) -> Option<DescriptorCacheEntry> {
        let path = self
            .descriptors_dir()
            .join(format!("{}.json", endpoint_slug(endpoint)));
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<DescriptorCacheEntry>(&content) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unparsable schema cache file");
                None
            }
        }
    }

    fn write_disk_schema(&self, entry: &DescriptorCacheEntry) -> Result<(), CacheError> {
        let dir = self.descriptors_dir();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", endpoint_slug(&entry.endpoint)));
        std::fs::write(path, serde_json::to_string_pretty(entry)?)?;
        Ok(())
    }

    fn read_disk_versions(&self) -> HashMap<String, VersionProbe> {
        let path = self.versions_path();
        let Ok(content) = std::fs::read_to_string(&path) else {
            return HashMap::new();
        };
        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unparsable versions file");
                HashMap::new()
            }
        }
    }

    fn write_disk_version(&self, probe: &VersionProbe) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.settings.dir)?;
        let mut map = self.read_disk_versions();
        map.insert(probe.chain_id.clone(), probe.clone());
        std::fs::write(self.versions_path(), serde_json::to_string_pretty(&map)?)?;
        Ok(())
    }
}

/// File-name-safe form of an endpoint URL.
pub fn endpoint_slug(endpoint: &str) -> String {
    endpoint
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}
