//! Binary transport: typed gRPC queries
//!
//! One persistent channel per endpoint with keep-alive configured; queries
//! go through the generated `cosmos-sdk-proto` / `ibc-proto` clients. The
//! reflection service doubles as the schema fetcher for the descriptor
//! cache.

use async_trait::async_trait;
use cosmos_sdk_proto::cosmos::bank::v1beta1::{
    query_client::QueryClient as BankQueryClient, QueryAllBalancesRequest, QueryBalanceRequest,
    QuerySupplyOfRequest,
};
use cosmos_sdk_proto::cosmos::base::reflection::v2alpha1::{
    reflection_service_client::ReflectionServiceClient, GetQueryServicesDescriptorRequest,
};
use cosmos_sdk_proto::cosmos::base::tendermint::v1beta1::{
    service_client::ServiceClient as TendermintServiceClient, GetNodeInfoRequest,
};
use escrow_audit_cache::{FetchError, SchemaFetcher};
use escrow_audit_types::{Coin, DenomTrace};
use ibc_proto::ibc::applications::transfer::v1::{
    query_client::QueryClient as TransferQueryClient, QueryDenomTraceRequest,
    QueryEscrowAddressRequest,
};
use ibc_proto::ibc::core::channel::v1::{
    query_client::QueryClient as ChannelQueryClient, QueryChannelRequest,
};
use ibc_proto::ibc::core::client::v1::{
    query_client::QueryClient as ClientQueryClient, QueryClientStateRequest,
};
use ibc_proto::ibc::core::connection::v1::{
    query_client::QueryClient as ConnectionQueryClient, QueryConnectionRequest,
};
use prost::Message;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, info};

use crate::ops::QueryOp;
use crate::response::{ChannelInfo, ClientStateInfo, ConnectionInfo, NodeInfo, QueryResponse};
use crate::transport::{Transport, TransportError, TransportKind};

const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);
const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

pub struct GrpcTransport {
    channels: Mutex<HashMap<String, Channel>>,
}

impl GrpcTransport {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Close every pooled connection.
    pub async fn shutdown(&self) {
        self.channels.lock().await.clear();
    }

    async fn channel(&self, endpoint: &str) -> Result<Channel, TransportError> {
        if let Some(channel) = self.channels.lock().await.get(endpoint) {
            return Ok(channel.clone());
        }

        let url = endpoint_url(endpoint);
        let use_tls = url.starts_with("https://");

        let mut builder = Endpoint::from_shared(url.clone())
            .map_err(|e| TransportError::rotate(format!("invalid grpc endpoint: {e}")))?
            .connect_timeout(CONNECT_TIMEOUT)
            .http2_keep_alive_interval(KEEPALIVE_INTERVAL)
            .keep_alive_timeout(KEEPALIVE_TIMEOUT)
            .keep_alive_while_idle(true);

        if use_tls {
            builder = builder
                .tls_config(ClientTlsConfig::new())
                .map_err(|e| TransportError::rotate(format!("tls config failed: {e}")))?;
        }

        let channel = builder
            .connect()
            .await
            .map_err(|e| TransportError::retry(format!("grpc connect failed: {e}")))?;

        info!(endpoint = %url, "connected grpc channel");
        self.channels
            .lock()
            .await
            .insert(endpoint.to_string(), channel.clone());
        Ok(channel)
    }
}

impl Default for GrpcTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for GrpcTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Binary
    }

    async fn execute(
        &self,
        endpoint: &str,
        op: &QueryOp,
    ) -> Result<QueryResponse, TransportError> {
        let channel = self.channel(endpoint).await?;
        debug!(endpoint, operation = op.name(), "grpc query");

        match op {
            QueryOp::BankBalance { address, denom } => {
                let mut client = BankQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .balance(QueryBalanceRequest {
                        address: address.clone(),
                        denom: denom.clone(),
                    })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                let balance = response
                    .into_inner()
                    .balance
                    .map(coin_from_proto)
                    .unwrap_or_else(|| Coin::new(denom.clone(), "0"));
                Ok(QueryResponse::Balance(balance))
            }
            QueryOp::BankAllBalances { address } => {
                let mut client = BankQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .all_balances(QueryAllBalancesRequest {
                        address: address.clone(),
                        ..Default::default()
                    })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                Ok(QueryResponse::AllBalances(
                    response
                        .into_inner()
                        .balances
                        .into_iter()
                        .map(coin_from_proto)
                        .collect(),
                ))
            }
            QueryOp::BankSupplyByDenom { denom } => {
                let mut client = BankQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .supply_of(QuerySupplyOfRequest {
                        denom: denom.clone(),
                    })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                let amount = response
                    .into_inner()
                    .amount
                    .map(coin_from_proto)
                    .unwrap_or_else(|| Coin::new(denom.clone(), "0"));
                Ok(QueryResponse::Supply(amount))
            }
            QueryOp::IbcChannel { port, channel: channel_id } => {
                let mut client = ChannelQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .channel(QueryChannelRequest {
                        port_id: port.clone(),
                        channel_id: channel_id.clone(),
                    })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                let ch = response
                    .into_inner()
                    .channel
                    .ok_or_else(|| TransportError::fatal("channel not found"))?;
                let counterparty = ch.counterparty.unwrap_or_default();
                Ok(QueryResponse::Channel(ChannelInfo {
                    state: channel_state_name(ch.state),
                    ordering: channel_order_name(ch.ordering),
                    version: ch.version,
                    counterparty_port_id: counterparty.port_id,
                    counterparty_channel_id: counterparty.channel_id,
                    connection_hops: ch.connection_hops,
                }))
            }
            QueryOp::IbcConnection { connection_id } => {
                let mut client = ConnectionQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .connection(QueryConnectionRequest {
                        connection_id: connection_id.clone(),
                    })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                let conn = response
                    .into_inner()
                    .connection
                    .ok_or_else(|| TransportError::fatal("connection not found"))?;
                let counterparty = conn.counterparty.unwrap_or_default();
                Ok(QueryResponse::Connection(ConnectionInfo {
                    client_id: conn.client_id,
                    state: connection_state_name(conn.state),
                    counterparty_client_id: counterparty.client_id,
                    counterparty_connection_id: counterparty.connection_id,
                }))
            }
            QueryOp::IbcClientState { client_id } => {
                let mut client = ClientQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .client_state(QueryClientStateRequest {
                        client_id: client_id.clone(),
                    })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                let any = response
                    .into_inner()
                    .client_state
                    .ok_or_else(|| TransportError::fatal("client state not found"))?;
                if !any.type_url.contains("tendermint") {
                    return Err(TransportError::fatal(format!(
                        "unsupported client type {}",
                        any.type_url
                    )));
                }
                let state =
                    ibc_proto::ibc::lightclients::tendermint::v1::ClientState::decode(
                        any.value.as_slice(),
                    )
                    .map_err(|e| {
                        TransportError::retry(format!("client state decode failed: {e}"))
                    })?;
                Ok(QueryResponse::ClientState(ClientStateInfo {
                    chain_id: state.chain_id,
                }))
            }
            QueryOp::IbcDenomTrace { hash } => {
                let mut client = TransferQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .denom_trace(QueryDenomTraceRequest { hash: hash.clone() })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                let trace = response
                    .into_inner()
                    .denom_trace
                    .ok_or_else(|| TransportError::fatal("denom trace not found"))?;
                Ok(QueryResponse::DenomTrace(DenomTrace {
                    path: trace.path,
                    base_denom: trace.base_denom,
                }))
            }
            QueryOp::IbcEscrowAddress { port, channel: channel_id } => {
                let mut client = TransferQueryClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .escrow_address(QueryEscrowAddressRequest {
                        port_id: port.clone(),
                        channel_id: channel_id.clone(),
                    })
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                Ok(QueryResponse::EscrowAddress(
                    response.into_inner().escrow_address,
                ))
            }
            QueryOp::TendermintNodeInfo => {
                let mut client = TendermintServiceClient::new(channel)
                    .max_decoding_message_size(MAX_MESSAGE_BYTES)
                    .max_encoding_message_size(MAX_MESSAGE_BYTES);
                let response = client
                    .get_node_info(GetNodeInfoRequest {})
                    .await
                    .map_err(|s| status_error(op.name(), s))?;
                let inner = response.into_inner();
                let app = inner.application_version.unwrap_or_default();
                Ok(QueryResponse::NodeInfo(NodeInfo {
                    network: inner
                        .default_node_info
                        .map(|n| n.network)
                        .unwrap_or_default(),
                    app_name: app.app_name,
                    app_version: app.version,
                }))
            }
        }
    }
}

#[async_trait]
impl SchemaFetcher for GrpcTransport {
    async fn fetch_schema(&self, grpc_endpoint: &str) -> Result<Vec<u8>, FetchError> {
        let channel = self
            .channel(grpc_endpoint)
            .await
            .map_err(|e| FetchError::new(e.to_string()))?;
        let mut client = ReflectionServiceClient::new(channel)
            .max_decoding_message_size(MAX_MESSAGE_BYTES)
            .max_encoding_message_size(MAX_MESSAGE_BYTES);
        let response = client
            .get_query_services_descriptor(GetQueryServicesDescriptorRequest {})
            .await
            .map_err(|s| FetchError::new(format!("reflection query failed: {s}")))?;
        let descriptor = response
            .into_inner()
            .queries
            .ok_or_else(|| FetchError::new("empty query services descriptor"))?;
        Ok(descriptor.encode_to_vec())
    }
}

fn coin_from_proto(coin: cosmos_sdk_proto::cosmos::base::v1beta1::Coin) -> Coin {
    Coin::new(coin.denom, coin.amount)
}

fn channel_state_name(raw: i32) -> String {
    ibc_proto::ibc::core::channel::v1::State::try_from(raw)
        .map(|s| s.as_str_name().to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn channel_order_name(raw: i32) -> String {
    ibc_proto::ibc::core::channel::v1::Order::try_from(raw)
        .map(|o| o.as_str_name().to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn connection_state_name(raw: i32) -> String {
    ibc_proto::ibc::core::connection::v1::State::try_from(raw)
        .map(|s| s.as_str_name().to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Map a gRPC status onto the retry classes: `Unimplemented` rotates (the
/// endpoint does not serve the query), transient server conditions retry,
/// everything else is a request-level rejection.
fn status_error(operation: &str, status: tonic::Status) -> TransportError {
    use tonic::Code;
    let message = format!("{operation} failed with {}: {}", status.code(), status.message());
    match status.code() {
        Code::Unimplemented => TransportError::rotate(message),
        Code::Unavailable
        | Code::ResourceExhausted
        | Code::DeadlineExceeded
        | Code::Aborted
        | Code::Internal
        | Code::Unknown => TransportError::retry(message),
        _ => TransportError::fatal(message),
    }
}

/// Registry gRPC entries are usually bare `host:port`; default scheme by
/// port, 443 implying TLS.
fn endpoint_url(endpoint: &str) -> String {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else if endpoint.ends_with(":443") {
        format!("https://{endpoint}")
    } else {
        format!("http://{endpoint}")
    }
}
