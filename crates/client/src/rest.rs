//! Text transport: HTTP GET against the standard Cosmos REST paths

use async_trait::async_trait;
use escrow_audit_types::{Coin, DenomTrace};
use serde::Deserialize;
use tracing::debug;

use crate::ops::QueryOp;
use crate::response::{ChannelInfo, ClientStateInfo, ConnectionInfo, NodeInfo, QueryResponse};
use crate::transport::{Transport, TransportError, TransportKind};

pub struct RestTransport {
    http: reqwest::Client,

    /// Host fragments whose responses bypass the legacy envelope unwrap.
    passthrough_hosts: Vec<String>,
}

impl RestTransport {
    pub fn new(passthrough_hosts: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            passthrough_hosts,
        }
    }

    fn is_passthrough(&self, endpoint: &str) -> bool {
        self.passthrough_hosts
            .iter()
            .any(|tag| !tag.is_empty() && endpoint.contains(tag.as_str()))
    }
}

#[async_trait]
impl Transport for RestTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Text
    }

    async fn execute(
        &self,
        endpoint: &str,
        op: &QueryOp,
    ) -> Result<QueryResponse, TransportError> {
        let url = format!("{}{}", endpoint.trim_end_matches('/'), op.rest_path());
        debug!(%url, operation = op.name(), "rest query");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::retry(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("{} returned HTTP {status}: {body}", op.name());
            return Err(match status.as_u16() {
                501 | 502 => TransportError::rotate(message),
                429 | 503 => TransportError::retry(message),
                s if (400..500).contains(&s) => TransportError::fatal(message),
                _ => TransportError::retry(message),
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::retry(format!("invalid JSON body: {e}")))?;

        let body = unwrap_envelope(body, self.is_passthrough(endpoint));
        decode(op, body)
    }
}

/// Legacy gateways wrap the payload in a top-level `result` object. Tagged
/// host families return the payload directly and must be taken verbatim.
fn unwrap_envelope(body: serde_json::Value, passthrough: bool) -> serde_json::Value {
    if passthrough {
        return body;
    }
    match body {
        serde_json::Value::Object(mut map) if map.contains_key("result") => map
            .remove("result")
            .filter(|v| v.is_object())
            .unwrap_or_else(|| serde_json::Value::Object(map)),
        other => other,
    }
}

fn decode(op: &QueryOp, body: serde_json::Value) -> Result<QueryResponse, TransportError> {
    let decode_err =
        |e: serde_json::Error| TransportError::retry(format!("{} decode failed: {e}", op.name()));

    match op {
        QueryOp::BankBalance { denom, .. } => {
            let envelope: BalanceEnvelope = serde_json::from_value(body).map_err(decode_err)?;
            Ok(QueryResponse::Balance(
                envelope.balance.unwrap_or_else(|| Coin::new(denom.clone(), "0")),
            ))
        }
        QueryOp::BankAllBalances { .. } => {
            let envelope: AllBalancesEnvelope =
                serde_json::from_value(body).map_err(decode_err)?;
            Ok(QueryResponse::AllBalances(envelope.balances))
        }
        QueryOp::BankSupplyByDenom { denom } => {
            let envelope: SupplyEnvelope = serde_json::from_value(body).map_err(decode_err)?;
            Ok(QueryResponse::Supply(
                envelope.amount.unwrap_or_else(|| Coin::new(denom.clone(), "0")),
            ))
        }
        QueryOp::IbcDenomTrace { .. } => {
            let envelope: DenomTraceEnvelope =
                serde_json::from_value(body).map_err(decode_err)?;
            Ok(QueryResponse::DenomTrace(DenomTrace {
                path: envelope.denom_trace.path,
                base_denom: envelope.denom_trace.base_denom,
            }))
        }
        QueryOp::IbcChannel { .. } => {
            let envelope: ChannelEnvelope = serde_json::from_value(body).map_err(decode_err)?;
            let channel = envelope
                .channel
                .ok_or_else(|| TransportError::fatal("channel not found"))?;
            Ok(QueryResponse::Channel(ChannelInfo {
                state: channel.state,
                ordering: channel.ordering,
                version: channel.version,
                counterparty_port_id: channel.counterparty.port_id,
                counterparty_channel_id: channel.counterparty.channel_id,
                connection_hops: channel.connection_hops,
            }))
        }
        QueryOp::IbcConnection { .. } => {
            let envelope: ConnectionEnvelope =
                serde_json::from_value(body).map_err(decode_err)?;
            let connection = envelope
                .connection
                .ok_or_else(|| TransportError::fatal("connection not found"))?;
            Ok(QueryResponse::Connection(ConnectionInfo {
                client_id: connection.client_id,
                state: connection.state,
                counterparty_client_id: connection.counterparty.client_id,
                counterparty_connection_id: connection.counterparty.connection_id,
            }))
        }
        QueryOp::IbcClientState { .. } => {
            let envelope: ClientStateEnvelope =
                serde_json::from_value(body).map_err(decode_err)?;
            let state = envelope
                .client_state
                .ok_or_else(|| TransportError::fatal("client state not found"))?;
            if state.chain_id.is_empty() {
                return Err(TransportError::fatal("client state carries no chain_id"));
            }
            Ok(QueryResponse::ClientState(ClientStateInfo {
                chain_id: state.chain_id,
            }))
        }
        QueryOp::IbcEscrowAddress { .. } => {
            let envelope: EscrowAddressEnvelope =
                serde_json::from_value(body).map_err(decode_err)?;
            Ok(QueryResponse::EscrowAddress(envelope.escrow_address))
        }
        QueryOp::TendermintNodeInfo => {
            let envelope: NodeInfoEnvelope =
                serde_json::from_value(body).map_err(decode_err)?;
            let app = envelope.application_version.unwrap_or_default();
            Ok(QueryResponse::NodeInfo(NodeInfo {
                network: envelope
                    .default_node_info
                    .map(|n| n.network)
                    .unwrap_or_default(),
                app_name: app.app_name,
                app_version: app.version,
            }))
        }
    }
}

#[derive(Deserialize)]
struct BalanceEnvelope {
    #[serde(default)]
    balance: Option<Coin>,
}

#[derive(Deserialize)]
struct AllBalancesEnvelope {
    #[serde(default)]
    balances: Vec<Coin>,
}

#[derive(Deserialize)]
struct SupplyEnvelope {
    #[serde(default)]
    amount: Option<Coin>,
}

#[derive(Deserialize)]
struct DenomTraceEnvelope {
    denom_trace: RawDenomTrace,
}

#[derive(Deserialize)]
struct RawDenomTrace {
    #[serde(default)]
    path: String,
    base_denom: String,
}

#[derive(Deserialize)]
struct ChannelEnvelope {
    #[serde(default)]
    channel: Option<RawChannel>,
}

#[derive(Deserialize)]
struct RawChannel {
    #[serde(default)]
    state: String,
    #[serde(default)]
    ordering: String,
    counterparty: RawChannelCounterparty,
    #[serde(default)]
    connection_hops: Vec<String>,
    #[serde(default)]
    version: String,
}

#[derive(Deserialize)]
struct RawChannelCounterparty {
    #[serde(default)]
    port_id: String,
    #[serde(default)]
    channel_id: String,
}

#[derive(Deserialize)]
struct ConnectionEnvelope {
    #[serde(default)]
    connection: Option<RawConnection>,
}

#[derive(Deserialize)]
struct RawConnection {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    state: String,
    counterparty: RawConnectionCounterparty,
}

#[derive(Deserialize)]
struct RawConnectionCounterparty {
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    connection_id: String,
}

#[derive(Deserialize)]
struct ClientStateEnvelope {
    #[serde(default)]
    client_state: Option<RawClientState>,
}

#[derive(Deserialize)]
struct RawClientState {
    #[serde(default)]
    chain_id: String,
}

#[derive(Deserialize)]
struct EscrowAddressEnvelope {
    escrow_address: String,
}

#[derive(Deserialize)]
struct NodeInfoEnvelope {
    #[serde(default)]
    default_node_info: Option<RawDefaultNodeInfo>,
    #[serde(default)]
    application_version: Option<RawAppVersion>,
}

#[derive(Deserialize)]
struct RawDefaultNodeInfo {
    #[serde(default)]
    network: String,
}

#[derive(Deserialize, Default)]
struct RawAppVersion {
    #[serde(default)]
    app_name: String,
    #[serde(default)]
    version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op_supply() -> QueryOp {
        QueryOp::BankSupplyByDenom {
            denom: "uatom".to_string(),
        }
    }

    #[test]
    fn test_decode_supply() {
        let body = serde_json::json!({ "amount": { "denom": "uatom", "amount": "12345" } });
        let response = decode(&op_supply(), body).unwrap();
        assert_eq!(
            response.into_supply().unwrap(),
            Coin::new("uatom", "12345")
        );
    }

    #[test]
    fn test_decode_missing_supply_is_zero() {
        let response = decode(&op_supply(), serde_json::json!({})).unwrap();
        assert_eq!(response.into_supply().unwrap(), Coin::new("uatom", "0"));
    }

    #[test]
    fn test_decode_denom_trace() {
        let body = serde_json::json!({
            "denom_trace": { "path": "transfer/channel-0", "base_denom": "uatom" }
        });
        let op = QueryOp::IbcDenomTrace {
            hash: "27394FB0".to_string(),
        };
        let trace = decode(&op, body).unwrap().into_denom_trace().unwrap();
        assert_eq!(trace.path, "transfer/channel-0");
        assert_eq!(trace.base_denom, "uatom");
    }

    #[test]
    fn test_decode_channel() {
        let body = serde_json::json!({
            "channel": {
                "state": "STATE_OPEN",
                "ordering": "ORDER_UNORDERED",
                "counterparty": { "port_id": "transfer", "channel_id": "channel-0" },
                "connection_hops": ["connection-257"],
                "version": "ics20-1"
            }
        });
        let op = QueryOp::IbcChannel {
            port: "transfer".to_string(),
            channel: "channel-141".to_string(),
        };
        let channel = decode(&op, body).unwrap().into_channel().unwrap();
        assert_eq!(channel.counterparty_channel_id, "channel-0");
        assert_eq!(channel.connection_hops, vec!["connection-257"]);
    }

    #[test]
    fn test_envelope_unwrapped_by_default() {
        let wrapped = serde_json::json!({
            "result": { "amount": { "denom": "uatom", "amount": "7" } }
        });
        let body = unwrap_envelope(wrapped, false);
        let response = decode(&op_supply(), body).unwrap();
        assert_eq!(response.into_supply().unwrap(), Coin::new("uatom", "7"));
    }

    #[test]
    fn test_envelope_kept_for_passthrough_hosts() {
        let transport = RestTransport::new(vec!["sei".to_string()]);
        assert!(transport.is_passthrough("https://rest.sei-apis.example"));
        assert!(!transport.is_passthrough("https://api.cosmos.example"));

        // A passthrough body with a `result` member of its own survives.
        let body = serde_json::json!({ "result": { "custom": true } });
        let unwrapped = unwrap_envelope(body.clone(), true);
        assert_eq!(unwrapped, body);
    }

    #[test]
    fn test_non_object_result_not_unwrapped() {
        let body = serde_json::json!({
            "result": "ok",
            "amount": { "denom": "uatom", "amount": "3" }
        });
        let unwrapped = unwrap_envelope(body, false);
        let response = decode(&op_supply(), unwrapped).unwrap();
        assert_eq!(response.into_supply().unwrap(), Coin::new("uatom", "3"));
    }

    #[test]
    fn test_decode_failure_is_retryable() {
        let op = QueryOp::IbcDenomTrace {
            hash: "AB".to_string(),
        };
        let err = decode(&op, serde_json::json!({ "unrelated": 1 })).unwrap_err();
        assert_eq!(err.class, crate::FailureClass::Retry);
    }

    #[test]
    fn test_decode_node_info() {
        let body = serde_json::json!({
            "default_node_info": { "network": "cosmoshub-4" },
            "application_version": { "app_name": "gaia", "version": "v18.1.0" }
        });
        let info = decode(&QueryOp::TendermintNodeInfo, body)
            .unwrap()
            .into_node_info()
            .unwrap();
        assert_eq!(info.network, "cosmoshub-4");
        assert_eq!(info.app_name, "gaia");
    }
}
