//! Audit result model
//!
//! One `AuditResult` per `(chain, channel, denom)` tuple, produced once and
//! never mutated. Per-token failures ride inside the result; they never
//! abort the surrounding audit.

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount;

/// One hop of a wrapped token's return path, in traversal order from the
/// observing chain back toward origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub chain: String,
    pub port: String,
    pub channel: String,
}

impl Hop {
    pub fn new(
        chain: impl Into<String>,
        port: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            chain: chain.into(),
            port: port.into(),
            channel: channel.into(),
        }
    }
}

/// Why an unwrap stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum UnwrapFailure {
    #[error("cycle: chain {chain} revisited during unwrap")]
    Cycle { chain: String },

    #[error("hop limit of {max} exceeded")]
    HopLimit { max: usize },

    #[error("denom trace for {denom} unavailable: {reason}")]
    TraceUnavailable { denom: String, reason: String },

    #[error("counterparty of {channel} unresolved: {reason}")]
    Topology { channel: String, reason: String },

    #[error("malformed trace path: {path}")]
    MalformedTrace { path: String },
}

/// Outcome of recursively unwrapping an `ibc/<hash>` denom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnwrapResult {
    /// The innermost denom reached. Still `ibc/…` when incomplete.
    pub base_denom: String,

    /// The chain the recursion stopped on. The true origin only when
    /// `complete` is set.
    pub origin_chain: String,

    pub hops: Vec<Hop>,

    pub complete: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<UnwrapFailure>,
}

impl UnwrapResult {
    /// A trace that terminated at a non-IBC base denom.
    pub fn resolved(
        base_denom: impl Into<String>,
        origin_chain: impl Into<String>,
        hops: Vec<Hop>,
    ) -> Self {
        Self {
            base_denom: base_denom.into(),
            origin_chain: origin_chain.into(),
            hops,
            complete: true,
            failure: None,
        }
    }

    /// A trace that stopped early; the fields hold the deepest state
    /// reached.
    pub fn partial(
        denom: impl Into<String>,
        chain: impl Into<String>,
        hops: Vec<Hop>,
        failure: UnwrapFailure,
    ) -> Self {
        Self {
            base_denom: denom.into(),
            origin_chain: chain.into(),
            hops,
            complete: false,
            failure: Some(failure),
        }
    }
}

/// Worst-first ordering is derived: `Balanced < Discrepancy < Incomplete <
/// Errored`, matching the process exit codes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Balanced,
    Discrepancy,
    Incomplete,
    Errored,
}

impl AuditStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            AuditStatus::Balanced => 0,
            AuditStatus::Discrepancy => 1,
            AuditStatus::Incomplete => 2,
            AuditStatus::Errored => 3,
        }
    }
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditStatus::Balanced => "balanced",
            AuditStatus::Discrepancy => "discrepancy",
            AuditStatus::Incomplete => "incomplete",
            AuditStatus::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Reconciliation outcome for one token in one escrow account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    /// Chain whose escrow account was inspected.
    pub chain: String,

    pub escrow_address: String,

    /// The denom as held in escrow.
    pub denom: String,

    #[serde(with = "amount::serde_string")]
    pub escrow_balance: BigUint,

    /// `None` when the counterparty supply query failed.
    #[serde(with = "amount::serde_opt_string")]
    pub counterparty_supply: Option<BigUint>,

    /// `escrow_balance - counterparty_supply`; zero when supply is unknown.
    #[serde(with = "amount::serde_int_string")]
    pub discrepancy: BigInt,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_chain: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_denom: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hops: Vec<Hop>,

    pub complete: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,

    pub status: AuditStatus,
}

impl AuditResult {
    /// Derive the status per the reconciliation rules: an incomplete trace
    /// classifies the token `Incomplete`, hard errors (including an
    /// unknown counterparty supply) classify it `Errored`, and only a
    /// complete, error-free token is judged on its discrepancy. The raw
    /// escrow balance is always kept; no discrepancy is fabricated.
    #[allow(clippy::too_many_arguments)]
    pub fn reconciled(
        chain: impl Into<String>,
        escrow_address: impl Into<String>,
        denom: impl Into<String>,
        escrow_balance: BigUint,
        counterparty_supply: Option<BigUint>,
        unwrap: Option<&UnwrapResult>,
        mut errors: Vec<String>,
    ) -> Self {
        let complete = unwrap.map(|u| u.complete).unwrap_or(true);
        if let Some(failure) = unwrap.and_then(|u| u.failure.as_ref()) {
            errors.push(failure.to_string());
        }

        let discrepancy = match &counterparty_supply {
            Some(supply) => amount::discrepancy(&escrow_balance, supply),
            None => BigInt::from(0),
        };

        let status = if !complete {
            AuditStatus::Incomplete
        } else if counterparty_supply.is_none() || !errors.is_empty() {
            AuditStatus::Errored
        } else if discrepancy == BigInt::from(0) {
            AuditStatus::Balanced
        } else {
            AuditStatus::Discrepancy
        };

        Self {
            chain: chain.into(),
            escrow_address: escrow_address.into(),
            denom: denom.into(),
            escrow_balance,
            counterparty_supply,
            discrepancy,
            origin_chain: unwrap.filter(|u| u.complete).map(|u| u.origin_chain.clone()),
            base_denom: unwrap.filter(|u| u.complete).map(|u| u.base_denom.clone()),
            hops: unwrap.map(|u| u.hops.clone()).unwrap_or_default(),
            complete,
            errors,
            status,
        }
    }

    /// A token that could not be reconciled at all.
    pub fn errored(
        chain: impl Into<String>,
        escrow_address: impl Into<String>,
        denom: impl Into<String>,
        escrow_balance: BigUint,
        error: impl Into<String>,
    ) -> Self {
        Self {
            chain: chain.into(),
            escrow_address: escrow_address.into(),
            denom: denom.into(),
            escrow_balance,
            counterparty_supply: None,
            discrepancy: BigInt::from(0),
            origin_chain: None,
            base_denom: None,
            hops: Vec::new(),
            complete: false,
            errors: vec![error.into()],
            status: AuditStatus::Errored,
        }
    }
}
