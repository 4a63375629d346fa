//! Local chain-registry store
//!
//! Reads the directory the registry mirror populates: one `<chain>.json`
//! per chain, `ibc/<a>-<b>.json` channel-pair bundles, and a
//! `.last-update` stamp. The store never writes chain records itself; the
//! mirror owns them.

mod store;

pub use store::{pair_file_name, RegistryStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown chain: {name}")]
    ChainUnknown { name: String },

    #[error("invalid chain record {name}: {reason}")]
    InvalidChain { name: String, reason: String },

    #[error("no chain registered with chain id {chain_id}")]
    ChainIdUnknown { chain_id: String },

    #[error("no channel-pair file for {file}")]
    ChannelFileMissing { file: String },

    #[error("failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
