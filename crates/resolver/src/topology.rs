//! On-chain counterparty resolution
//!
//! `channel -> connection_hops[0] -> client -> client_state.chain_id`,
//! all queried on the near chain, then mapped to a registry chain name.

use escrow_audit_client::{ClientError, QueryClient, QueryOp};
use escrow_audit_registry::RegistryStore;
use escrow_audit_types::ChainInfo;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The far end of a channel, as the near chain sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterpartyInfo {
    pub chain_name: String,
    pub chain_id: String,
    pub channel_id: String,
    pub connection_id: String,
    pub client_id: String,
}

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("counterparty resolution for {channel} on {chain} failed at {step}: {reason}")]
    Failed {
        chain: String,
        channel: String,
        step: &'static str,
        reason: String,
    },

    #[error("query cancelled")]
    Cancelled,
}

impl TopologyError {
    fn failed(
        chain: &ChainInfo,
        channel: &str,
        step: &'static str,
        reason: impl ToString,
    ) -> Self {
        Self::Failed {
            chain: chain.chain_name.clone(),
            channel: channel.to_string(),
            step,
            reason: reason.to_string(),
        }
    }

    fn from_client(chain: &ChainInfo, channel: &str, step: &'static str, e: ClientError) -> Self {
        match e {
            ClientError::Cancelled => Self::Cancelled,
            other => Self::failed(chain, channel, step, other),
        }
    }
}

pub struct TopologyResolver {
    client: Arc<QueryClient>,
    registry: Arc<RegistryStore>,
}

impl TopologyResolver {
    pub fn new(client: Arc<QueryClient>, registry: Arc<RegistryStore>) -> Self {
        Self { client, registry }
    }

    /// Identify the chain at the far end of `(port, channel_id)` on
    /// `chain`.
    pub async fn resolve_counterparty(
        &self,
        chain: &ChainInfo,
        port: &str,
        channel_id: &str,
        cancel: &CancellationToken,
    ) -> Result<CounterpartyInfo, TopologyError> {
        let channel = self
            .client
            .query(
                chain,
                QueryOp::IbcChannel {
                    port: port.to_string(),
                    channel: channel_id.to_string(),
                },
                cancel,
            )
            .await
            .map_err(|e| TopologyError::from_client(chain, channel_id, "channel", e))?
            .into_channel()
            .map_err(|e| TopologyError::from_client(chain, channel_id, "channel", e))?;

        let connection_id = channel
            .connection_hops
            .first()
            .cloned()
            .ok_or_else(|| {
                TopologyError::failed(chain, channel_id, "channel", "no connection hops")
            })?;
        if channel.counterparty_channel_id.is_empty() {
            return Err(TopologyError::failed(
                chain,
                channel_id,
                "channel",
                "empty counterparty channel id",
            ));
        }

        let connection = self
            .client
            .query(
                chain,
                QueryOp::IbcConnection {
                    connection_id: connection_id.clone(),
                },
                cancel,
            )
            .await
            .map_err(|e| TopologyError::from_client(chain, channel_id, "connection", e))?
            .into_connection()
            .map_err(|e| TopologyError::from_client(chain, channel_id, "connection", e))?;

        let client_state = self
            .client
            .query(
                chain,
                QueryOp::IbcClientState {
                    client_id: connection.client_id.clone(),
                },
                cancel,
            )
            .await
            .map_err(|e| TopologyError::from_client(chain, channel_id, "client state", e))?
            .into_client_state()
            .map_err(|e| TopologyError::from_client(chain, channel_id, "client state", e))?;

        let chain_name = self
            .registry
            .chain_name_for_id(&client_state.chain_id)
            .map_err(|e| TopologyError::failed(chain, channel_id, "registry lookup", e))?;

        debug!(
            chain = %chain.chain_name,
            channel = %channel_id,
            counterparty = %chain_name,
            counterparty_channel = %channel.counterparty_channel_id,
            "resolved counterparty"
        );

        Ok(CounterpartyInfo {
            chain_name,
            chain_id: client_state.chain_id,
            channel_id: channel.counterparty_channel_id,
            connection_id: connection.counterparty_connection_id,
            client_id: connection.counterparty_client_id,
        })
    }
}
