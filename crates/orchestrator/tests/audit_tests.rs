//! End-to-end audit scenarios against a scripted network
//!
//! The fake transport answers the same closed operation set the real
//! transports do, keyed by endpoint, so the orchestrator, resolvers, and
//! retry engine all run for real.

use async_trait::async_trait;
use escrow_audit_client::{
    ChannelInfo, ClientStateInfo, ConnectionInfo, QueryClient, QueryOp, QueryResponse, Transport,
    TransportError, TransportKind,
};
use escrow_audit_config::{ApiConfig, AuditConfig, AuditMode, TransportPreference};
use escrow_audit_orchestrator::{AuditError, AuditRequest, Auditor};
use escrow_audit_registry::RegistryStore;
use escrow_audit_types::{denom::ibc_denom, escrow_address, AuditStatus, Coin, DenomTrace};
use num_bigint::BigInt;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct FakeNet {
    /// (endpoint, address, denom) -> amount
    balances: HashMap<(String, String, String), String>,
    /// (endpoint, address) -> coins
    all_balances: HashMap<(String, String), Vec<Coin>>,
    /// (endpoint, denom) -> amount
    supplies: HashMap<(String, String), String>,
    /// (endpoint, channel) -> escrow address
    escrow_addrs: HashMap<(String, String), String>,
    /// (endpoint, hash) -> trace
    traces: HashMap<(String, String), DenomTrace>,
    /// (endpoint, channel) -> (counterparty chain id, counterparty channel)
    counterparties: HashMap<(String, String), (String, String)>,
    /// (endpoint, denom) supply queries that always fail retryably
    failing_supplies: HashSet<(String, String)>,
    /// denom -> delay applied to its supply query
    supply_delays: HashMap<String, u64>,
}

impl FakeNet {
    fn balance(mut self, ep: &str, addr: &str, denom: &str, amount: &str) -> Self {
        self.balances
            .insert((ep.into(), addr.into(), denom.into()), amount.into());
        self
    }

    fn all_balances(mut self, ep: &str, addr: &str, coins: Vec<Coin>) -> Self {
        self.all_balances.insert((ep.into(), addr.into()), coins);
        self
    }

    fn supply(mut self, ep: &str, denom: &str, amount: &str) -> Self {
        self.supplies.insert((ep.into(), denom.into()), amount.into());
        self
    }

    fn escrow(mut self, ep: &str, channel: &str, addr: &str) -> Self {
        self.escrow_addrs
            .insert((ep.into(), channel.into()), addr.into());
        self
    }

    fn trace(mut self, ep: &str, denom: &str, path: &str, base: &str) -> Self {
        let hash = denom.trim_start_matches("ibc/").to_string();
        self.traces
            .insert((ep.into(), hash), DenomTrace::new(path, base));
        self
    }

    fn channel(mut self, ep: &str, channel: &str, chain_id: &str, far_channel: &str) -> Self {
        self.counterparties.insert(
            (ep.into(), channel.into()),
            (chain_id.into(), far_channel.into()),
        );
        self
    }

    fn failing_supply(mut self, ep: &str, denom: &str) -> Self {
        self.failing_supplies.insert((ep.into(), denom.into()));
        self
    }

    fn supply_delay(mut self, denom: &str, ms: u64) -> Self {
        self.supply_delays.insert(denom.into(), ms);
        self
    }
}

#[async_trait]
impl Transport for FakeNet {
    fn kind(&self) -> TransportKind {
        TransportKind::Text
    }

    async fn execute(
        &self,
        endpoint: &str,
        op: &QueryOp,
    ) -> Result<QueryResponse, TransportError> {
        let ep = endpoint.to_string();
        match op {
            QueryOp::BankBalance { address, denom } => {
                let amount = self
                    .balances
                    .get(&(ep, address.clone(), denom.clone()))
                    .cloned()
                    .unwrap_or_else(|| "0".to_string());
                Ok(QueryResponse::Balance(Coin::new(denom.clone(), amount)))
            }
            QueryOp::BankAllBalances { address } => Ok(QueryResponse::AllBalances(
                self.all_balances
                    .get(&(ep, address.clone()))
                    .cloned()
                    .unwrap_or_default(),
            )),
            QueryOp::BankSupplyByDenom { denom } => {
                if let Some(ms) = self.supply_delays.get(denom) {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                if self.failing_supplies.contains(&(ep.clone(), denom.clone())) {
                    return Err(TransportError::retry("HTTP 503 service unavailable"));
                }
                let amount = self
                    .supplies
                    .get(&(ep, denom.clone()))
                    .cloned()
                    .unwrap_or_else(|| "0".to_string());
                Ok(QueryResponse::Supply(Coin::new(denom.clone(), amount)))
            }
            QueryOp::IbcEscrowAddress { channel, .. } => self
                .escrow_addrs
                .get(&(ep, channel.clone()))
                .cloned()
                .map(QueryResponse::EscrowAddress)
                .ok_or_else(|| TransportError::rotate("HTTP 501 not implemented")),
            QueryOp::IbcDenomTrace { hash } => self
                .traces
                .get(&(ep, hash.clone()))
                .cloned()
                .map(QueryResponse::DenomTrace)
                .ok_or_else(|| TransportError::fatal("denom trace not found")),
            QueryOp::IbcChannel { channel, .. } => {
                let Some((_, far_channel)) = self.counterparties.get(&(ep, channel.clone()))
                else {
                    return Err(TransportError::fatal("channel not found"));
                };
                Ok(QueryResponse::Channel(ChannelInfo {
                    state: "STATE_OPEN".to_string(),
                    ordering: "ORDER_UNORDERED".to_string(),
                    version: "ics20-1".to_string(),
                    counterparty_port_id: "transfer".to_string(),
                    counterparty_channel_id: far_channel.clone(),
                    connection_hops: vec![format!("conn|{channel}")],
                }))
            }
            QueryOp::IbcConnection { connection_id } => {
                Ok(QueryResponse::Connection(ConnectionInfo {
                    client_id: format!("cl|{}", connection_id.trim_start_matches("conn|")),
                    state: "STATE_OPEN".to_string(),
                    counterparty_client_id: "cl-far".to_string(),
                    counterparty_connection_id: "conn-far".to_string(),
                }))
            }
            QueryOp::IbcClientState { client_id } => {
                let channel = client_id.trim_start_matches("cl|").to_string();
                self.counterparties
                    .get(&(ep, channel))
                    .map(|(chain_id, _)| {
                        QueryResponse::ClientState(ClientStateInfo {
                            chain_id: chain_id.clone(),
                        })
                    })
                    .ok_or_else(|| TransportError::fatal("client state not found"))
            }
            QueryOp::TendermintNodeInfo => Err(TransportError::fatal("not scripted")),
        }
    }
}

fn write_chain(dir: &Path, name: &str, chain_id: &str, endpoint: &str, denom: &str, prefix: &str) {
    let record = serde_json::json!({
        "chain_name": name,
        "chain_id": chain_id,
        "bech32_prefix": prefix,
        "staking": { "staking_tokens": [{ "denom": denom }] },
        "apis": { "rest": [{ "address": endpoint }] }
    });
    std::fs::write(dir.join(format!("{name}.json")), record.to_string()).unwrap();
}

fn write_pair(dir: &Path, a: &str, a_channel: &str, b: &str, b_channel: &str) {
    let ibc = dir.join("ibc");
    std::fs::create_dir_all(&ibc).unwrap();
    let bundle = serde_json::json!({
        "chain_1": { "chain_name": a },
        "chain_2": { "chain_name": b },
        "channels": [{
            "chain_1": { "channel_id": a_channel, "port_id": "transfer" },
            "chain_2": { "channel_id": b_channel, "port_id": "transfer" },
            "ordering": "unordered",
            "version": "ics20-1"
        }]
    });
    std::fs::write(ibc.join(format!("{a}-{b}.json")), bundle.to_string()).unwrap();
}

/// Two-chain world: chaina (uatom) <-> chainb (uosmo) over
/// channel-141/channel-0, escrow account scripted on chaina.
fn base_world(dir: &Path) -> FakeNet {
    write_chain(dir, "chaina", "chaina-1", "http://a", "uatom", "cosmos");
    write_chain(dir, "chainb", "chainb-1", "http://b", "uosmo", "osmo");
    write_pair(dir, "chaina", "channel-141", "chainb", "channel-0");

    FakeNet::default()
        .channel("http://a", "channel-141", "chainb-1", "channel-0")
        .channel("http://b", "channel-0", "chaina-1", "channel-141")
        .escrow("http://a", "channel-141", "cosmos1escrowaaaa")
        .escrow("http://b", "channel-0", "osmo1escrowbbbb")
}

fn auditor(dir: &Path, net: FakeNet) -> Auditor {
    let registry = Arc::new(RegistryStore::open(dir));
    let api = ApiConfig {
        retries: 2,
        delay_ms: 1,
        timeout_ms: 1_000,
        passthrough_hosts: Vec::new(),
    };
    let client = Arc::new(QueryClient::with_transports(
        api,
        TransportPreference::Text,
        Arc::new(FakeNet::default()),
        Arc::new(net),
    ));
    Auditor::new(registry, client, &AuditConfig::default())
}

fn quick_request() -> AuditRequest {
    AuditRequest {
        primary: "chaina".to_string(),
        secondary: "chainb".to_string(),
        mode: AuditMode::Quick,
        channel_id: None,
        reverse: false,
    }
}

#[tokio::test]
async fn test_quick_single_hop_balanced() {
    let dir = tempfile::tempdir().unwrap();
    let wrapped = ibc_denom("transfer", "channel-0", "uatom");
    let net = base_world(dir.path())
        .balance("http://a", "cosmos1escrowaaaa", "uatom", "1000000")
        .supply("http://b", &wrapped, "1000000");

    let report = auditor(dir.path(), net)
        .run(&quick_request(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.primary.len(), 1);
    let result = &report.primary[0];
    assert_eq!(result.status, AuditStatus::Balanced);
    assert_eq!(result.discrepancy, BigInt::from(0));
    assert_eq!(result.chain, "chaina");
    assert_eq!(result.denom, "uatom");
    assert_eq!(result.escrow_address, "cosmos1escrowaaaa");
    assert!(result.complete);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn test_quick_single_hop_discrepancy() {
    let dir = tempfile::tempdir().unwrap();
    let wrapped = ibc_denom("transfer", "channel-0", "uatom");
    let net = base_world(dir.path())
        .balance("http://a", "cosmos1escrowaaaa", "uatom", "1000000")
        .supply("http://b", &wrapped, "900000");

    let report = auditor(dir.path(), net)
        .run(&quick_request(), &CancellationToken::new())
        .await
        .unwrap();

    let result = &report.primary[0];
    assert_eq!(result.status, AuditStatus::Discrepancy);
    assert_eq!(result.discrepancy, BigInt::from(100_000));
    assert!(result.complete);
    assert_eq!(report.exit_code(), 1);
}

#[tokio::test]
async fn test_quick_reverse_pass_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let wrapped_atom = ibc_denom("transfer", "channel-0", "uatom");
    let wrapped_osmo = ibc_denom("transfer", "channel-141", "uosmo");
    let net = base_world(dir.path())
        .balance("http://a", "cosmos1escrowaaaa", "uatom", "500")
        .supply("http://b", &wrapped_atom, "500")
        .balance("http://b", "osmo1escrowbbbb", "uosmo", "900")
        .supply("http://a", &wrapped_osmo, "900");

    let mut request = quick_request();
    request.reverse = true;

    let report = auditor(dir.path(), net)
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    // Primary direction first, reverse second, regardless of completion.
    assert_eq!(report.primary.len(), 1);
    assert_eq!(report.reverse.len(), 1);
    assert_eq!(report.primary[0].chain, "chaina");
    assert_eq!(report.reverse[0].chain, "chainb");
    assert_eq!(report.worst_status(), AuditStatus::Balanced);
}

#[tokio::test]
async fn test_comprehensive_continues_past_exhausted_supply() {
    let dir = tempfile::tempdir().unwrap();
    // A third chain whose token is parked in chaina's escrow.
    write_chain(
        dir.path(),
        "chainc",
        "chainc-1",
        "http://c",
        "uc",
        "cchain",
    );

    let foreign_on_a = ibc_denom("transfer", "channel-7", "uc");
    let wrapped_native = ibc_denom("transfer", "channel-0", "uatom");
    let wrapped_foreign = ibc_denom("transfer", "channel-0", "transfer/channel-7/uc");

    let net = base_world(dir.path())
        .channel("http://a", "channel-7", "chainc-1", "channel-9")
        .all_balances(
            "http://a",
            "cosmos1escrowaaaa",
            vec![
                Coin::new("uatom", "1000"),
                Coin::new(foreign_on_a.clone(), "250"),
            ],
        )
        .trace("http://a", &foreign_on_a, "transfer/channel-7", "uc")
        // The native token's counterparty supply never answers.
        .failing_supply("http://b", &wrapped_native)
        .supply("http://b", &wrapped_foreign, "250")
        .supply("http://c", "uc", "90000000");

    let mut request = quick_request();
    request.mode = AuditMode::Comprehensive;

    let report = auditor(dir.path(), net)
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    // Both tokens reported, enumeration order preserved.
    assert_eq!(report.primary.len(), 2);
    let native = &report.primary[0];
    assert_eq!(native.denom, "uatom");
    assert_eq!(native.status, AuditStatus::Errored);
    assert_eq!(native.counterparty_supply, None);
    assert_eq!(native.escrow_balance, 1000u32.into());
    assert!(native
        .errors
        .iter()
        .any(|e| e.contains("exhausted all endpoints")));

    let foreign = &report.primary[1];
    assert_eq!(foreign.denom, foreign_on_a);
    assert_eq!(foreign.status, AuditStatus::Balanced);
    assert_eq!(foreign.origin_chain.as_deref(), Some("chainc"));
    assert_eq!(foreign.base_denom.as_deref(), Some("uc"));
    assert_eq!(foreign.hops.len(), 1);
    assert_eq!(foreign.hops[0].chain, "chaina");

    assert_eq!(report.exit_code(), 3);
}

#[tokio::test]
async fn test_comprehensive_preserves_enumeration_order() {
    let dir = tempfile::tempdir().unwrap();
    let first = ibc_denom("transfer", "channel-0", "token-one");
    let second = ibc_denom("transfer", "channel-0", "token-two");
    let third = ibc_denom("transfer", "channel-0", "token-three");

    // The first token's supply query is the slowest; order must hold.
    let net = base_world(dir.path())
        .all_balances(
            "http://a",
            "cosmos1escrowaaaa",
            vec![
                Coin::new("token-one", "1"),
                Coin::new("token-two", "2"),
                Coin::new("token-three", "3"),
            ],
        )
        .supply("http://b", &first, "1")
        .supply("http://b", &second, "2")
        .supply("http://b", &third, "3")
        .supply_delay(&first, 150)
        .supply_delay(&second, 50);

    let mut request = quick_request();
    request.mode = AuditMode::Comprehensive;

    let report = auditor(dir.path(), net)
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();

    let denoms: Vec<&str> = report.primary.iter().map(|r| r.denom.as_str()).collect();
    assert_eq!(denoms, vec!["token-one", "token-two", "token-three"]);
    assert!(report
        .primary
        .iter()
        .all(|r| r.status == AuditStatus::Balanced));
}

#[tokio::test]
async fn test_manual_channel_without_registry_pair() {
    let dir = tempfile::tempdir().unwrap();
    let wrapped = ibc_denom("transfer", "channel-0", "uatom");
    let net = base_world(dir.path())
        .balance("http://a", "cosmos1escrowaaaa", "uatom", "42")
        .supply("http://b", &wrapped, "42");
    // Remove the pair file: manual mode must not need it.
    std::fs::remove_dir_all(dir.path().join("ibc")).unwrap();

    let request = AuditRequest {
        primary: "chaina".to_string(),
        secondary: "chainb".to_string(),
        mode: AuditMode::Manual,
        channel_id: Some("channel-141".to_string()),
        reverse: false,
    };

    let report = auditor(dir.path(), net)
        .run(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.primary[0].status, AuditStatus::Balanced);
}

#[tokio::test]
async fn test_quick_without_channel_pair_fails() {
    let dir = tempfile::tempdir().unwrap();
    let net = base_world(dir.path());
    std::fs::remove_dir_all(dir.path().join("ibc")).unwrap();

    let err = auditor(dir.path(), net)
        .run(&quick_request(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::NoChannel { .. }));
}

#[tokio::test]
async fn test_unknown_chain_fails_audit() {
    let dir = tempfile::tempdir().unwrap();
    let net = base_world(dir.path());

    let mut request = quick_request();
    request.primary = "atlantis".to_string();

    let err = auditor(dir.path(), net)
        .run(&request, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Registry(_)));
}

#[tokio::test]
async fn test_escrow_address_falls_back_to_local_derivation() {
    let dir = tempfile::tempdir().unwrap();
    let derived = escrow_address("cosmos", "transfer", "channel-141").unwrap();
    let wrapped = ibc_denom("transfer", "channel-0", "uatom");

    write_chain(dir.path(), "chaina", "chaina-1", "http://a", "uatom", "cosmos");
    write_chain(dir.path(), "chainb", "chainb-1", "http://b", "uosmo", "osmo");
    write_pair(dir.path(), "chaina", "channel-141", "chainb", "channel-0");

    // No scripted escrow address: the live query 501s and the audit falls
    // back to the ics20 derivation.
    let net = FakeNet::default()
        .channel("http://a", "channel-141", "chainb-1", "channel-0")
        .balance("http://a", &derived, "uatom", "77")
        .supply("http://b", &wrapped, "77");

    let report = auditor(dir.path(), net)
        .run(&quick_request(), &CancellationToken::new())
        .await
        .unwrap();

    let result = &report.primary[0];
    assert_eq!(result.escrow_address, derived);
    assert_eq!(result.status, AuditStatus::Balanced);
}

#[tokio::test]
async fn test_unresolvable_counterparty_marks_token_incomplete() {
    let dir = tempfile::tempdir().unwrap();
    write_chain(dir.path(), "chaina", "chaina-1", "http://a", "uatom", "cosmos");
    write_chain(dir.path(), "chainb", "chainb-1", "http://b", "uosmo", "osmo");
    write_pair(dir.path(), "chaina", "channel-141", "chainb", "channel-0");

    // No channel mapping on chaina: topology resolution fails, the token
    // keeps its raw escrow balance and classifies incomplete.
    let net = FakeNet::default()
        .escrow("http://a", "channel-141", "cosmos1escrowaaaa")
        .balance("http://a", "cosmos1escrowaaaa", "uatom", "123");

    let report = auditor(dir.path(), net)
        .run(&quick_request(), &CancellationToken::new())
        .await
        .unwrap();

    let result = &report.primary[0];
    assert_eq!(result.status, AuditStatus::Incomplete);
    assert_eq!(result.escrow_balance, 123u32.into());
    assert_eq!(result.counterparty_supply, None);
    assert_eq!(report.exit_code(), 2);
}

#[tokio::test]
async fn test_cancelled_audit_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let net = base_world(dir.path());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = auditor(dir.path(), net)
        .run(&quick_request(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::Cancelled));
}
