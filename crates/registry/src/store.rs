use chrono::{DateTime, SecondsFormat, Utc};
use escrow_audit_types::{ChainInfo, ChannelPairFile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

use crate::RegistryError;

const LAST_UPDATE_FILE: &str = ".last-update";
const IBC_DIR: &str = "ibc";

/// Handle over the mirror-populated data directory.
///
/// Chain records are immutable during an audit; the store only maintains an
/// in-memory `chain_id -> chain_name` index as records are loaded.
pub struct RegistryStore {
    data_dir: PathBuf,
    chain_id_index: RwLock<HashMap<String, String>>,
}

impl RegistryStore {
    pub fn open(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            chain_id_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Load and validate one chain record.
    pub fn load_chain(&self, name: &str) -> Result<ChainInfo, RegistryError> {
        let path = self.data_dir.join(format!("{name}.json"));
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::ChainUnknown {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let chain: ChainInfo =
            serde_json::from_str(&content).map_err(|e| RegistryError::InvalidChain {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        Self::validate(name, &chain)?;

        self.chain_id_index
            .write()
            .expect("chain id index poisoned")
            .insert(chain.chain_id.clone(), chain.chain_name.clone());

        debug!(chain = %chain.chain_name, chain_id = %chain.chain_id, "loaded chain record");
        Ok(chain)
    }

    fn validate(name: &str, chain: &ChainInfo) -> Result<(), RegistryError> {
        if chain.chain_name.is_empty() {
            return Err(RegistryError::InvalidChain {
                name: name.to_string(),
                reason: "missing chain_name".to_string(),
            });
        }
        if chain.bech32_prefix.is_empty() {
            return Err(RegistryError::InvalidChain {
                name: name.to_string(),
                reason: "missing bech32_prefix".to_string(),
            });
        }
        if !chain.has_queryable_endpoint() {
            return Err(RegistryError::InvalidChain {
                name: name.to_string(),
                reason: "no rest or grpc endpoint".to_string(),
            });
        }
        Ok(())
    }

    /// Map a chain id to its registry name.
    ///
    /// Serves from the index when a record with that id was already loaded;
    /// otherwise scans the directory, loading records until one matches.
    pub fn chain_name_for_id(&self, chain_id: &str) -> Result<String, RegistryError> {
        if let Some(name) = self
            .chain_id_index
            .read()
            .expect("chain id index poisoned")
            .get(chain_id)
        {
            return Ok(name.clone());
        }

        for name in self.list_chains()? {
            match self.load_chain(&name) {
                Ok(chain) if chain.chain_id == chain_id => return Ok(chain.chain_name),
                Ok(_) => {}
                Err(e) => {
                    warn!(chain = %name, error = %e, "skipping unreadable chain record during id scan");
                }
            }
        }

        Err(RegistryError::ChainIdUnknown {
            chain_id: chain_id.to_string(),
        })
    }

    /// Names of all chain record files in the store.
    pub fn list_chains(&self) -> Result<Vec<String>, RegistryError> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(".json") {
                if !name.is_empty() && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Load the channel-pair bundle for two chains.
    pub fn load_channel_pairs(
        &self,
        chain_a: &str,
        chain_b: &str,
    ) -> Result<ChannelPairFile, RegistryError> {
        let file = pair_file_name(chain_a, chain_b);
        let path = self.data_dir.join(IBC_DIR).join(&file);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RegistryError::ChannelFileMissing { file })
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| RegistryError::Parse {
            file,
            reason: e.to_string(),
        })
    }

    /// Number of channel-pair bundles on disk.
    pub fn channel_pair_count(&self) -> Result<usize, RegistryError> {
        let dir = self.data_dir.join(IBC_DIR);
        if !dir.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && entry.file_name().to_str().map_or(false, |n| n.ends_with(".json"))
            {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Timestamp of the last registry sync, when recorded.
    pub fn last_update(&self) -> Result<Option<DateTime<Utc>>, RegistryError> {
        let path = self.data_dir.join(LAST_UPDATE_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stamp = DateTime::parse_from_rfc3339(content.trim()).map_err(|e| {
            RegistryError::Parse {
                file: LAST_UPDATE_FILE.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Some(stamp.with_timezone(&Utc)))
    }

    /// Record a registry re-validation.
    pub fn touch_last_update(&self, now: DateTime<Utc>) -> Result<(), RegistryError> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::write(
            self.data_dir.join(LAST_UPDATE_FILE),
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        Ok(())
    }

    /// Reload every chain record, rebuilding the chain-id index. Returns
    /// the number of valid records; invalid records are logged and skipped.
    pub fn reindex(&self) -> Result<usize, RegistryError> {
        self.chain_id_index
            .write()
            .expect("chain id index poisoned")
            .clear();

        let mut valid = 0;
        for name in self.list_chains()? {
            match self.load_chain(&name) {
                Ok(_) => valid += 1,
                Err(e) => warn!(chain = %name, error = %e, "invalid chain record"),
            }
        }
        Ok(valid)
    }
}

/// Channel-pair bundle file name: alphabetically sorted chain names joined
/// by `-`.
pub fn pair_file_name(chain_a: &str, chain_b: &str) -> String {
    let (first, second) = if chain_a <= chain_b {
        (chain_a, chain_b)
    } else {
        (chain_b, chain_a)
    };
    format!("{first}-{second}.json")
}
