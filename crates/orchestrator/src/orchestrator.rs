use escrow_audit_client::{ClientError, QueryClient, QueryOp};
use escrow_audit_config::{AuditConfig, AuditMode};
use escrow_audit_registry::RegistryStore;
use escrow_audit_resolver::{DenomResolver, TopologyResolver};
use escrow_audit_types::{
    denom::{ibc_denom, is_ibc_denom},
    escrow::escrow_address,
    AuditResult, ChainInfo, UnwrapFailure, UnwrapResult,
};
use futures::StreamExt;
use num_bigint::BigUint;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{AuditError, AuditReport};

/// Bound on concurrently reconciled tokens within one audit.
const MAX_WORKERS: usize = 8;

/// One audit invocation.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub primary: String,
    pub secondary: String,
    pub mode: AuditMode,

    /// Manual mode: the primary chain's channel id.
    pub channel_id: Option<String>,

    pub reverse: bool,
}

/// Per-audit lifecycle, surfaced through tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AuditPhase {
    ResolvingChains,
    EnumeratingBalances,
    PerTokenLoop,
    Reporting,
}

fn phase(phase: AuditPhase) {
    debug!(?phase, "audit phase");
}

/// Drives one or more audits. Owns no per-audit state between runs; the
/// client, cache, and registry handles are shared.
pub struct Auditor {
    registry: Arc<RegistryStore>,
    client: Arc<QueryClient>,
    resolver: DenomResolver,
    topology: TopologyResolver,
    escrow_port: String,
}

impl Auditor {
    pub fn new(
        registry: Arc<RegistryStore>,
        client: Arc<QueryClient>,
        audit_config: &AuditConfig,
    ) -> Self {
        Self {
            resolver: DenomResolver::new(client.clone(), registry.clone()),
            topology: TopologyResolver::new(client.clone(), registry.clone()),
            registry,
            client,
            escrow_port: audit_config.escrow_port.clone(),
        }
    }

    pub async fn run(
        &self,
        request: &AuditRequest,
        cancel: &CancellationToken,
    ) -> Result<AuditReport, AuditError> {
        phase(AuditPhase::ResolvingChains);
        let chain_a = self.registry.load_chain(&request.primary)?;
        let chain_b = self.registry.load_chain(&request.secondary)?;

        info!(
            primary = %chain_a.chain_name,
            secondary = %chain_b.chain_name,
            mode = ?request.mode,
            reverse = request.reverse,
            "starting audit"
        );

        let primary = self
            .audit_direction(
                &chain_a,
                &chain_b,
                request.mode,
                request.channel_id.as_deref(),
                cancel,
            )
            .await?;

        let reverse = if request.reverse {
            // A manually supplied channel names the primary side; its far
            // end is re-derived on chain before swapping directions.
            let reverse_channel = match request.channel_id.as_deref() {
                Some(channel) => self
                    .topology
                    .resolve_counterparty(&chain_a, &self.escrow_port, channel, cancel)
                    .await
                    .map(|info| info.channel_id)
                    .ok(),
                None => None,
            };
            self.audit_direction(
                &chain_b,
                &chain_a,
                request.mode,
                reverse_channel.as_deref(),
                cancel,
            )
            .await?
        } else {
            Vec::new()
        };

        phase(AuditPhase::Reporting);
        Ok(AuditReport { primary, reverse })
    }

    /// Audit the escrow of `near` on its channel toward `far`.
    async fn audit_direction(
        &self,
        near: &ChainInfo,
        far: &ChainInfo,
        mode: AuditMode,
        manual_channel: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditResult>, AuditError> {
        if cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }

        let near_channel = match manual_channel {
            Some(channel) => channel.to_string(),
            None => self
                .registry
                .load_channel_pairs(&near.chain_name, &far.chain_name)
                .ok()
                .and_then(|file| {
                    file.transfer_channel_for(&near.chain_name)
                        .map(|(own, _)| own.to_string())
                })
                .ok_or_else(|| AuditError::NoChannel {
                    chain_a: near.chain_name.clone(),
                    chain_b: far.chain_name.clone(),
                })?,
        };

        // The counterparty channel is always re-derived on chain; the
        // registry pair file is not trusted for it.
        let far_channel = match self
            .topology
            .resolve_counterparty(near, &self.escrow_port, &near_channel, cancel)
            .await
        {
            Ok(info) => {
                if info.chain_name != far.chain_name {
                    warn!(
                        channel = %near_channel,
                        expected = %far.chain_name,
                        resolved = %info.chain_name,
                        "channel does not lead to the requested counterparty"
                    );
                }
                Some(info.channel_id)
            }
            Err(e) => {
                warn!(channel = %near_channel, error = %e, "counterparty resolution failed");
                None
            }
        };

        let escrow = self.escrow_account(near, &near_channel, cancel).await?;
        debug!(chain = %near.chain_name, channel = %near_channel, escrow = %escrow, "derived escrow account");

        match mode {
            AuditMode::Quick | AuditMode::Manual => {
                self.audit_native(near, far, &near_channel, far_channel.as_deref(), &escrow, cancel)
                    .await
            }
            AuditMode::Comprehensive => {
                self.audit_all_balances(
                    near,
                    far,
                    &near_channel,
                    far_channel.as_deref(),
                    &escrow,
                    cancel,
                )
                .await
            }
        }
    }

    /// Quick/manual: the native staking token only.
    async fn audit_native(
        &self,
        near: &ChainInfo,
        far: &ChainInfo,
        near_channel: &str,
        far_channel: Option<&str>,
        escrow: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditResult>, AuditError> {
        let native = near.native_denom()?.to_string();

        phase(AuditPhase::EnumeratingBalances);
        let balance = match self
            .client
            .query(
                near,
                QueryOp::BankBalance {
                    address: escrow.to_string(),
                    denom: native.clone(),
                },
                cancel,
            )
            .await
            .and_then(|r| r.into_balance())
        {
            Ok(coin) => match coin.parsed_amount() {
                Ok(amount) => amount,
                Err(e) => {
                    return Ok(vec![AuditResult::errored(
                        &near.chain_name,
                        escrow,
                        &native,
                        BigUint::from(0u8),
                        e.to_string(),
                    )])
                }
            },
            Err(ClientError::Cancelled) => return Err(AuditError::Cancelled),
            Err(e) => {
                return Ok(vec![AuditResult::errored(
                    &near.chain_name,
                    escrow,
                    &native,
                    BigUint::from(0u8),
                    e.to_string(),
                )])
            }
        };

        phase(AuditPhase::PerTokenLoop);
        Ok(vec![
            self.reconcile_token(
                near,
                far,
                escrow,
                near_channel,
                far_channel,
                &native,
                balance,
                cancel,
            )
            .await,
        ])
    }

    /// Comprehensive: every balance in the escrow account, reconciled
    /// concurrently with report order pinned to enumeration order.
    async fn audit_all_balances(
        &self,
        near: &ChainInfo,
        far: &ChainInfo,
        near_channel: &str,
        far_channel: Option<&str>,
        escrow: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AuditResult>, AuditError> {
        phase(AuditPhase::EnumeratingBalances);
        let balances = match self
            .client
            .query(
                near,
                QueryOp::BankAllBalances {
                    address: escrow.to_string(),
                },
                cancel,
            )
            .await
            .and_then(|r| r.into_balances())
        {
            Ok(coins) => coins,
            Err(ClientError::Cancelled) => return Err(AuditError::Cancelled),
            Err(e) => return Err(e.into()),
        };

        info!(
            chain = %near.chain_name,
            escrow = %escrow,
            tokens = balances.len(),
            "enumerated escrow balances"
        );

        phase(AuditPhase::PerTokenLoop);
        let workers = MAX_WORKERS.min(balances.len().max(1));
        let results = futures::stream::iter(balances.into_iter().map(|coin| async move {
            match coin.parsed_amount() {
                Ok(amount) => {
                    self.reconcile_token(
                        near,
                        far,
                        escrow,
                        near_channel,
                        far_channel,
                        &coin.denom,
                        amount,
                        cancel,
                    )
                    .await
                }
                Err(e) => AuditResult::errored(
                    &near.chain_name,
                    escrow,
                    &coin.denom,
                    BigUint::from(0u8),
                    e.to_string(),
                ),
            }
        }))
        .buffered(workers)
        .collect::<Vec<_>>()
        .await;

        Ok(results)
    }

    /// Reconcile one escrow balance against the counterparty supply of its
    /// forward-hashed denom. Failures never escape: they classify the
    /// token.
    #[allow(clippy::too_many_arguments)]
    async fn reconcile_token(
        &self,
        near: &ChainInfo,
        far: &ChainInfo,
        escrow: &str,
        near_channel: &str,
        far_channel: Option<&str>,
        denom: &str,
        balance: BigUint,
        cancel: &CancellationToken,
    ) -> AuditResult {
        if cancel.is_cancelled() {
            return AuditResult::errored(
                &near.chain_name,
                escrow,
                denom,
                balance,
                "audit cancelled",
            );
        }

        let mut errors = Vec::new();

        // Foreign tokens in escrow got here over additional hops; resolve
        // their origin for the report.
        let unwrap = if is_ibc_denom(denom) {
            Some(self.resolver.unwrap(near, denom, cancel).await)
        } else {
            None
        };

        if let Some(result) = &unwrap {
            if !result.complete {
                return AuditResult::reconciled(
                    &near.chain_name,
                    escrow,
                    denom,
                    balance,
                    None,
                    unwrap.as_ref(),
                    errors,
                );
            }
            self.log_origin_supply(result, cancel).await;
        }

        let Some(far_channel) = far_channel else {
            // Without the on-chain counterparty channel the wrapped denom
            // on the far side cannot be named.
            let failure = UnwrapResult::partial(
                denom,
                &near.chain_name,
                unwrap.map(|u| u.hops).unwrap_or_default(),
                UnwrapFailure::Topology {
                    channel: near_channel.to_string(),
                    reason: "counterparty channel unresolved".to_string(),
                },
            );
            return AuditResult::reconciled(
                &near.chain_name,
                escrow,
                denom,
                balance,
                None,
                Some(&failure),
                errors,
            );
        };

        let forward_base = match &unwrap {
            Some(result) => full_trace_string(result),
            None => denom.to_string(),
        };
        let wrapped_denom = ibc_denom(&self.escrow_port, far_channel, &forward_base);

        let supply = match self
            .client
            .query(
                far,
                QueryOp::BankSupplyByDenom {
                    denom: wrapped_denom.clone(),
                },
                cancel,
            )
            .await
            .and_then(|r| r.into_supply())
        {
            Ok(coin) => match coin.parsed_amount() {
                Ok(amount) => Some(amount),
                Err(e) => {
                    errors.push(format!("counterparty supply unreadable: {e}"));
                    None
                }
            },
            Err(e) => {
                errors.push(format!("counterparty supply unavailable: {e}"));
                None
            }
        };

        debug!(
            chain = %near.chain_name,
            denom = %denom,
            wrapped = %wrapped_denom,
            balance = %balance,
            supply = ?supply,
            "reconciled token"
        );

        AuditResult::reconciled(
            &near.chain_name,
            escrow,
            denom,
            balance,
            supply,
            unwrap.as_ref(),
            errors,
        )
    }

    /// Origin-chain supply of the base denom, logged for context.
    async fn log_origin_supply(&self, unwrap: &UnwrapResult, cancel: &CancellationToken) {
        let Ok(origin) = self.registry.load_chain(&unwrap.origin_chain) else {
            return;
        };
        match self
            .client
            .query(
                &origin,
                QueryOp::BankSupplyByDenom {
                    denom: unwrap.base_denom.clone(),
                },
                cancel,
            )
            .await
            .and_then(|r| r.into_supply())
        {
            Ok(coin) => info!(
                origin = %unwrap.origin_chain,
                denom = %unwrap.base_denom,
                supply = %coin.amount,
                "origin supply"
            ),
            Err(e) => debug!(
                origin = %unwrap.origin_chain,
                denom = %unwrap.base_denom,
                error = %e,
                "origin supply unavailable"
            ),
        }
    }

    /// The escrow account for `(port, channel)` on `chain`: live query
    /// first, local derivation when unavailable.
    async fn escrow_account(
        &self,
        chain: &ChainInfo,
        channel: &str,
        cancel: &CancellationToken,
    ) -> Result<String, AuditError> {
        match self
            .client
            .query(
                chain,
                QueryOp::IbcEscrowAddress {
                    port: self.escrow_port.clone(),
                    channel: channel.to_string(),
                },
                cancel,
            )
            .await
            .and_then(|r| r.into_escrow_address())
        {
            Ok(address) if !address.is_empty() => Ok(address),
            Err(ClientError::Cancelled) => Err(AuditError::Cancelled),
            Ok(_) => Ok(escrow_address(
                &chain.bech32_prefix,
                &self.escrow_port,
                channel,
            )?),
            Err(e) => {
                debug!(chain = %chain.chain_name, channel, error = %e,
                    "escrow address query unavailable; deriving locally");
                Ok(escrow_address(
                    &chain.bech32_prefix,
                    &self.escrow_port,
                    channel,
                )?)
            }
        }
    }
}

/// Rebuild the full trace string as seen on the chain where the token was
/// observed: the hop pairs in traversal order, then the base denom.
fn full_trace_string(unwrap: &UnwrapResult) -> String {
    let mut parts: Vec<String> = unwrap
        .hops
        .iter()
        .map(|hop| format!("{}/{}", hop.port, hop.channel))
        .collect();
    parts.push(unwrap.base_denom.clone());
    parts.join("/")
}
