//! ICS-20 escrow address derivation
//!
//! The transfer module owns one escrow account per channel. Its address is
//! the first 20 bytes of `SHA-256("ics20-1" || 0x00 || "port/channel")`,
//! bech32-encoded with the chain's account prefix. The live
//! `IbcEscrowAddress` query is preferred at runtime; this derivation is the
//! offline fallback.

use bech32::{Bech32, Hrp};
use sha2::{Digest, Sha256};
use thiserror::Error;

const ICS20_VERSION: &str = "ics20-1";

/// Derive the escrow account address for `(port, channel)` on a chain with
/// the given bech32 prefix.
pub fn escrow_address(prefix: &str, port: &str, channel: &str) -> Result<String, EscrowError> {
    let mut hasher = Sha256::new();
    hasher.update(ICS20_VERSION.as_bytes());
    hasher.update([0u8]);
    hasher.update(format!("{port}/{channel}").as_bytes());
    let digest = hasher.finalize();

    let hrp = Hrp::parse(prefix).map_err(|e| EscrowError::InvalidPrefix {
        prefix: prefix.to_string(),
        reason: e.to_string(),
    })?;
    bech32::encode::<Bech32>(hrp, &digest[..20]).map_err(|e| EscrowError::Encode {
        reason: e.to_string(),
    })
}

#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("invalid bech32 prefix {prefix}: {reason}")]
    InvalidPrefix { prefix: String, reason: String },

    #[error("bech32 encoding failed: {reason}")]
    Encode { reason: String },
}
