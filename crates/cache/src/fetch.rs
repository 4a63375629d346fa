//! Probe seams
//!
//! Version and schema fetches go through traits so the orchestration and
//! cache logic test against scripted fakes; the production implementations
//! talk to live endpoints.

use async_trait::async_trait;
use tendermint_rpc::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct FetchError {
    pub reason: String,
}

impl FetchError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Live `app_version` lookup for a chain.
#[async_trait]
pub trait VersionFetcher: Send + Sync {
    async fn app_version(&self, rpc_endpoint: &str) -> Result<u64, FetchError>;
}

/// Reflection-descriptor lookup for a gRPC endpoint.
#[async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch_schema(&self, grpc_endpoint: &str) -> Result<Vec<u8>, FetchError>;
}

/// Production version fetcher: Tendermint RPC `abci_info`.
#[derive(Debug, Default)]
pub struct TendermintVersionFetcher;

#[async_trait]
impl VersionFetcher for TendermintVersionFetcher {
    async fn app_version(&self, rpc_endpoint: &str) -> Result<u64, FetchError> {
        let client = tendermint_rpc::HttpClient::new(rpc_endpoint)
            .map_err(|e| FetchError::new(format!("invalid rpc endpoint: {e}")))?;
        let info = client
            .abci_info()
            .await
            .map_err(|e| FetchError::new(format!("abci_info failed: {e}")))?;
        debug!(endpoint = %rpc_endpoint, app_version = info.app_version, "probed app version");
        Ok(info.app_version)
    }
}
