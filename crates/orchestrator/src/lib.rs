//! Audit orchestration
//!
//! Drives the registry, query client, and resolvers through the three
//! audit modes. Per-token reconciliations fan out over a bounded worker
//! pool; per-token failures ride inside their results and never abort the
//! audit. The report preserves escrow-enumeration order and lists the
//! primary pass before the reverse pass.

mod orchestrator;
mod report;

pub use orchestrator::{AuditRequest, Auditor};
pub use report::AuditReport;

use escrow_audit_client::ClientError;
use escrow_audit_registry::RegistryError;
use escrow_audit_types::{ChainInfoError, EscrowError};
use thiserror::Error;

/// Whole-audit failures. Per-token problems are carried in the per-token
/// results instead.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Chain(#[from] ChainInfoError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error("no transfer channel known between {chain_a} and {chain_b}; pass a channel id")]
    NoChannel { chain_a: String, chain_b: String },

    #[error("audit cancelled")]
    Cancelled,
}
