//! Core types for the IBC escrow audit tool
//!
//! Everything the other crates exchange lives here: chain registry records,
//! channel-pair bundles, ICS-20 denom traces and hashing, escrow address
//! derivation, and the per-token audit result model.

pub mod amount;
pub mod chain;
pub mod channel;
pub mod denom;
pub mod escrow;
pub mod result;

pub use amount::{discrepancy, parse_amount, AmountError, Coin};
pub use chain::{ApiEndpoint, ApiSet, ChainInfo, ChainInfoError, DenomRecord, FeeInfo, StakingInfo};
pub use channel::{ChannelEnd, ChannelPair, ChannelPairFile, ChannelSide, ChannelTags};
pub use denom::{denom_hash, hash_from_denom, ibc_denom, is_ibc_denom, DenomTrace, TraceError};
pub use escrow::{escrow_address, EscrowError};
pub use result::{AuditResult, AuditStatus, Hop, UnwrapFailure, UnwrapResult};
