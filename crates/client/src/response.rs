//! Transport-neutral query responses
//!
//! Both transports decode into these shapes, so the resolvers and the
//! orchestrator never see whether a value came over gRPC or REST.

use escrow_audit_types::{Coin, DenomTrace};

use crate::ClientError;

/// Channel end as reported by the queried chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub state: String,
    pub ordering: String,
    pub version: String,
    pub counterparty_port_id: String,
    pub counterparty_channel_id: String,
    pub connection_hops: Vec<String>,
}

/// Connection end as reported by the queried chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub client_id: String,
    pub state: String,
    pub counterparty_client_id: String,
    pub counterparty_connection_id: String,
}

/// The part of a light-client state the auditor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStateInfo {
    pub chain_id: String,
}

/// Node identity from the tendermint service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub network: String,
    pub app_name: String,
    pub app_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResponse {
    Balance(Coin),
    AllBalances(Vec<Coin>),
    Supply(Coin),
    DenomTrace(DenomTrace),
    Channel(ChannelInfo),
    Connection(ConnectionInfo),
    ClientState(ClientStateInfo),
    EscrowAddress(String),
    NodeInfo(NodeInfo),
}

impl QueryResponse {
    pub fn into_balance(self) -> Result<Coin, ClientError> {
        match self {
            QueryResponse::Balance(coin) => Ok(coin),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "BankBalance",
            }),
        }
    }

    pub fn into_balances(self) -> Result<Vec<Coin>, ClientError> {
        match self {
            QueryResponse::AllBalances(coins) => Ok(coins),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "BankAllBalances",
            }),
        }
    }

    pub fn into_supply(self) -> Result<Coin, ClientError> {
        match self {
            QueryResponse::Supply(coin) => Ok(coin),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "BankSupplyByDenom",
            }),
        }
    }

    pub fn into_denom_trace(self) -> Result<DenomTrace, ClientError> {
        match self {
            QueryResponse::DenomTrace(trace) => Ok(trace),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "IbcDenomTrace",
            }),
        }
    }

    pub fn into_channel(self) -> Result<ChannelInfo, ClientError> {
        match self {
            QueryResponse::Channel(channel) => Ok(channel),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "IbcChannel",
            }),
        }
    }

    pub fn into_connection(self) -> Result<ConnectionInfo, ClientError> {
        match self {
            QueryResponse::Connection(connection) => Ok(connection),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "IbcConnection",
            }),
        }
    }

    pub fn into_client_state(self) -> Result<ClientStateInfo, ClientError> {
        match self {
            QueryResponse::ClientState(state) => Ok(state),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "IbcClientState",
            }),
        }
    }

    pub fn into_escrow_address(self) -> Result<String, ClientError> {
        match self {
            QueryResponse::EscrowAddress(address) => Ok(address),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "IbcEscrowAddress",
            }),
        }
    }

    pub fn into_node_info(self) -> Result<NodeInfo, ClientError> {
        match self {
            QueryResponse::NodeInfo(info) => Ok(info),
            _ => Err(ClientError::UnexpectedResponse {
                operation: "TendermintNodeInfo",
            }),
        }
    }
}
