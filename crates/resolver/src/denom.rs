//! Recursive denom unwrap
//!
//! One `(port, channel)` pair is peeled per hop: the trace is looked up on
//! the current chain, the outermost pair names the hop taken to get here,
//! the counterparty of that channel is resolved on-chain, and the denom as
//! the counterparty sees it is re-derived by hashing the remaining path
//! with the base denom. The walk ends at a non-IBC denom, a revisited
//! chain, or the hop bound.

use escrow_audit_client::{QueryClient, QueryOp};
use escrow_audit_registry::RegistryStore;
use escrow_audit_types::{
    denom::{hash_from_denom, is_ibc_denom},
    ChainInfo, Hop, UnwrapFailure, UnwrapResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::topology::TopologyResolver;

/// Bound on the walk depth; a longer chain of wrappers aborts the trace.
pub const MAX_HOPS: usize = 32;

pub struct DenomResolver {
    client: Arc<QueryClient>,
    registry: Arc<RegistryStore>,
    topology: TopologyResolver,
}

impl DenomResolver {
    pub fn new(client: Arc<QueryClient>, registry: Arc<RegistryStore>) -> Self {
        Self {
            topology: TopologyResolver::new(client.clone(), registry.clone()),
            client,
            registry,
        }
    }

    /// Walk `denom` as observed on `chain` back to its origin.
    ///
    /// Never fails outright: a broken step returns the deepest state
    /// reached with `complete = false` and the failure kind attached.
    pub async fn unwrap(
        &self,
        chain: &ChainInfo,
        denom: &str,
        cancel: &CancellationToken,
    ) -> UnwrapResult {
        let mut current_chain = chain.clone();
        let mut current_denom = denom.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        let mut hops: Vec<Hop> = Vec::new();

        loop {
            if !is_ibc_denom(&current_denom) {
                debug!(
                    denom = %denom,
                    base = %current_denom,
                    origin = %current_chain.chain_name,
                    hops = hops.len(),
                    "unwrap complete"
                );
                return UnwrapResult::resolved(current_denom, current_chain.chain_name, hops);
            }

            if visited.contains(&current_chain.chain_name) {
                return UnwrapResult::partial(
                    current_denom,
                    current_chain.chain_name.clone(),
                    hops,
                    UnwrapFailure::Cycle {
                        chain: current_chain.chain_name,
                    },
                );
            }

            if hops.len() >= MAX_HOPS {
                return UnwrapResult::partial(
                    current_denom,
                    current_chain.chain_name,
                    hops,
                    UnwrapFailure::HopLimit { max: MAX_HOPS },
                );
            }

            let Some(hash) = hash_from_denom(&current_denom) else {
                return UnwrapResult::partial(
                    current_denom.clone(),
                    current_chain.chain_name,
                    hops,
                    UnwrapFailure::TraceUnavailable {
                        denom: current_denom,
                        reason: "denom carries no hash".to_string(),
                    },
                );
            };

            let trace = match self
                .client
                .query(
                    &current_chain,
                    QueryOp::IbcDenomTrace {
                        hash: hash.to_string(),
                    },
                    cancel,
                )
                .await
                .and_then(|r| r.into_denom_trace())
            {
                Ok(trace) => trace,
                Err(e) => {
                    return UnwrapResult::partial(
                        current_denom.clone(),
                        current_chain.chain_name,
                        hops,
                        UnwrapFailure::TraceUnavailable {
                            denom: current_denom,
                            reason: e.to_string(),
                        },
                    )
                }
            };

            let pairs = match trace.hops() {
                Ok(pairs) if !pairs.is_empty() => pairs,
                _ => {
                    return UnwrapResult::partial(
                        current_denom,
                        current_chain.chain_name,
                        hops,
                        UnwrapFailure::MalformedTrace { path: trace.path },
                    )
                }
            };
            let (port, channel) = (pairs[0].0.to_string(), pairs[0].1.to_string());

            // The outermost pair is the hop taken to reach this chain;
            // record it before trying to cross back over it.
            hops.push(Hop::new(
                current_chain.chain_name.clone(),
                port.clone(),
                channel.clone(),
            ));
            visited.insert(current_chain.chain_name.clone());

            let counterparty = match self
                .topology
                .resolve_counterparty(&current_chain, &port, &channel, cancel)
                .await
            {
                Ok(info) => info,
                Err(e) => {
                    return UnwrapResult::partial(
                        current_denom,
                        current_chain.chain_name.clone(),
                        hops,
                        UnwrapFailure::Topology {
                            channel,
                            reason: e.to_string(),
                        },
                    )
                }
            };

            let next_chain = match self.registry.load_chain(&counterparty.chain_name) {
                Ok(chain) => chain,
                Err(e) => {
                    return UnwrapResult::partial(
                        current_denom,
                        current_chain.chain_name.clone(),
                        hops,
                        UnwrapFailure::Topology {
                            channel,
                            reason: e.to_string(),
                        },
                    )
                }
            };

            let next_denom = match trace.peel() {
                Ok(peeled) => peeled.ibc_denom(),
                Err(_) => {
                    return UnwrapResult::partial(
                        current_denom,
                        current_chain.chain_name,
                        hops,
                        UnwrapFailure::MalformedTrace { path: trace.path },
                    )
                }
            };

            current_chain = next_chain;
            current_denom = next_denom;
        }
    }
}
