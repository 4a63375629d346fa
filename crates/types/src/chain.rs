//! Chain registry records
//!
//! Mirrors the subset of the cosmos/chain-registry `chain.json` schema the
//! auditor needs, so mirror-populated files deserialize directly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A chain's registry record: identity, native token, and endpoints.
///
/// Immutable for the duration of an audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_name: String,

    #[serde(default)]
    pub chain_id: String,

    pub bech32_prefix: String,

    #[serde(default)]
    pub pretty_name: Option<String>,

    #[serde(default)]
    pub staking: Option<StakingInfo>,

    #[serde(default)]
    pub fees: Option<FeeInfo>,

    #[serde(default)]
    pub apis: ApiSet,
}

/// Staking module metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakingInfo {
    #[serde(default)]
    pub staking_tokens: Vec<DenomRecord>,
}

/// Fee module metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeInfo {
    #[serde(default)]
    pub fee_tokens: Vec<DenomRecord>,
}

/// A denom entry under `staking` or `fees`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenomRecord {
    pub denom: String,
}

/// Transport descriptor sets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSet {
    #[serde(default)]
    pub rpc: Vec<ApiEndpoint>,

    #[serde(default)]
    pub rest: Vec<ApiEndpoint>,

    #[serde(default)]
    pub grpc: Vec<ApiEndpoint>,
}

/// One endpoint entry under `apis`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpoint {
    pub address: String,

    #[serde(default)]
    pub provider: Option<String>,
}

impl ChainInfo {
    /// The chain's native staking denom, falling back to the first fee
    /// token when no staking token is declared.
    pub fn native_denom(&self) -> Result<&str, ChainInfoError> {
        if let Some(staking) = &self.staking {
            if let Some(token) = staking.staking_tokens.first() {
                return Ok(&token.denom);
            }
        }
        if let Some(fees) = &self.fees {
            if let Some(token) = fees.fee_tokens.first() {
                return Ok(&token.denom);
            }
        }
        Err(ChainInfoError::NoNativeToken {
            chain: self.chain_name.clone(),
        })
    }

    pub fn rpc_endpoints(&self) -> impl Iterator<Item = &str> {
        self.apis.rpc.iter().map(|e| e.address.as_str())
    }

    pub fn rest_endpoints(&self) -> impl Iterator<Item = &str> {
        self.apis.rest.iter().map(|e| e.address.as_str())
    }

    pub fn grpc_endpoints(&self) -> impl Iterator<Item = &str> {
        self.apis.grpc.iter().map(|e| e.address.as_str())
    }

    /// A chain is queryable if it exposes at least one REST or gRPC endpoint.
    pub fn has_queryable_endpoint(&self) -> bool {
        !self.apis.rest.is_empty() || !self.apis.grpc.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ChainInfoError {
    #[error("chain {chain} declares no staking or fee token")]
    NoNativeToken { chain: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_with(staking: Option<&str>, fee: Option<&str>) -> ChainInfo {
        ChainInfo {
            chain_name: "testchain".to_string(),
            chain_id: "testchain-1".to_string(),
            bech32_prefix: "test".to_string(),
            pretty_name: None,
            staking: staking.map(|d| StakingInfo {
                staking_tokens: vec![DenomRecord {
                    denom: d.to_string(),
                }],
            }),
            fees: fee.map(|d| FeeInfo {
                fee_tokens: vec![DenomRecord {
                    denom: d.to_string(),
                }],
            }),
            apis: ApiSet::default(),
        }
    }

    #[test]
    fn test_native_denom_prefers_staking_token() {
        let chain = chain_with(Some("uatom"), Some("ufee"));
        assert_eq!(chain.native_denom().unwrap(), "uatom");
    }

    #[test]
    fn test_native_denom_falls_back_to_fee_token() {
        let chain = chain_with(None, Some("ufee"));
        assert_eq!(chain.native_denom().unwrap(), "ufee");
    }

    #[test]
    fn test_native_denom_missing() {
        let chain = chain_with(None, None);
        assert!(matches!(
            chain.native_denom(),
            Err(ChainInfoError::NoNativeToken { .. })
        ));
    }

    #[test]
    fn test_deserialize_registry_record() {
        let json = r#"{
            "chain_name": "cosmoshub",
            "chain_id": "cosmoshub-4",
            "pretty_name": "Cosmos Hub",
            "bech32_prefix": "cosmos",
            "staking": { "staking_tokens": [{ "denom": "uatom" }] },
            "fees": { "fee_tokens": [{ "denom": "uatom", "fixed_min_gas_price": 0.005 }] },
            "apis": {
                "rpc": [{ "address": "https://rpc.cosmos.example", "provider": "x" }],
                "rest": [{ "address": "https://api.cosmos.example" }],
                "grpc": [{ "address": "grpc.cosmos.example:443" }]
            }
        }"#;

        let chain: ChainInfo = serde_json::from_str(json).unwrap();
        assert_eq!(chain.chain_id, "cosmoshub-4");
        assert_eq!(chain.native_denom().unwrap(), "uatom");
        assert_eq!(chain.rest_endpoints().count(), 1);
        assert_eq!(chain.grpc_endpoints().count(), 1);
        assert!(chain.has_queryable_endpoint());
    }
}
