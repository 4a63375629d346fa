//! Channel-pair bundles
//!
//! The `<data>/ibc/<a>-<b>.json` files follow the chain-registry `_IBC`
//! layout: two chain sides bound by client/connection ids, plus the channel
//! list multiplexed over that connection.

use serde::{Deserialize, Serialize};

/// One `<a>-<b>.json` bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPairFile {
    #[serde(rename = "chain_1")]
    pub chain_a: ChannelSide,

    #[serde(rename = "chain_2")]
    pub chain_b: ChannelSide,

    #[serde(default)]
    pub channels: Vec<ChannelPair>,
}

/// One chain's side of the connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSide {
    pub chain_name: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub connection_id: String,
}

/// A single channel across the pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelPair {
    #[serde(rename = "chain_1")]
    pub chain_a: ChannelEnd,

    #[serde(rename = "chain_2")]
    pub chain_b: ChannelEnd,

    #[serde(default)]
    pub ordering: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub tags: Option<ChannelTags>,
}

/// One end of a channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelEnd {
    pub channel_id: String,

    #[serde(default = "default_port_id")]
    pub port_id: String,
}

/// Free-form registry channel tags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelTags {
    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub preferred: Option<bool>,

    #[serde(default)]
    pub dex: Option<String>,
}

fn default_port_id() -> String {
    "transfer".to_string()
}

impl ChannelPairFile {
    /// The channel id on `chain_name`'s side of the first transfer channel,
    /// together with the counterparty channel id.
    pub fn transfer_channel_for(&self, chain_name: &str) -> Option<(&str, &str)> {
        let on_a = self.chain_a.chain_name == chain_name;
        if !on_a && self.chain_b.chain_name != chain_name {
            return None;
        }
        self.channels
            .iter()
            .find(|c| c.chain_a.port_id == "transfer" && c.chain_b.port_id == "transfer")
            .map(|c| {
                if on_a {
                    (c.chain_a.channel_id.as_str(), c.chain_b.channel_id.as_str())
                } else {
                    (c.chain_b.channel_id.as_str(), c.chain_a.channel_id.as_str())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUNDLE: &str = r#"{
        "chain_1": { "chain_name": "cosmoshub", "client_id": "07-tendermint-259", "connection_id": "connection-257" },
        "chain_2": { "chain_name": "osmosis", "client_id": "07-tendermint-1", "connection_id": "connection-1" },
        "channels": [
            {
                "chain_1": { "channel_id": "channel-141", "port_id": "transfer" },
                "chain_2": { "channel_id": "channel-0", "port_id": "transfer" },
                "ordering": "unordered",
                "version": "ics20-1",
                "tags": { "status": "live", "preferred": true }
            }
        ]
    }"#;

    #[test]
    fn test_deserialize_bundle() {
        let file: ChannelPairFile = serde_json::from_str(BUNDLE).unwrap();
        assert_eq!(file.chain_a.chain_name, "cosmoshub");
        assert_eq!(file.channels.len(), 1);
        assert_eq!(file.channels[0].chain_b.channel_id, "channel-0");
        assert_eq!(
            file.channels[0].tags.as_ref().unwrap().preferred,
            Some(true)
        );
    }

    #[test]
    fn test_transfer_channel_lookup_both_sides() {
        let file: ChannelPairFile = serde_json::from_str(BUNDLE).unwrap();
        assert_eq!(
            file.transfer_channel_for("cosmoshub"),
            Some(("channel-141", "channel-0"))
        );
        assert_eq!(
            file.transfer_channel_for("osmosis"),
            Some(("channel-0", "channel-141"))
        );
        assert_eq!(file.transfer_channel_for("juno"), None);
    }
}
