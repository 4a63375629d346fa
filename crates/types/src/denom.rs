//! ICS-20 denom traces and hashing
//!
//! A wrapped token's on-chain identifier is `ibc/<hash>` where the hash is
//! SHA-256 over the full `port/channel/.../base_denom` string, formatted as
//! upper-case hex. The hash input is a single byte sequence; slashes inside
//! a multi-hop base denom are hashed verbatim.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const IBC_DENOM_PREFIX: &str = "ibc/";

/// How a wrapped token reached the chain it was observed on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomTrace {
    /// `port/channel` segments separated by `/`, outermost hop first.
    /// Empty for a native token.
    #[serde(default)]
    pub path: String,

    pub base_denom: String,
}

impl DenomTrace {
    pub fn new(path: impl Into<String>, base_denom: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base_denom: base_denom.into(),
        }
    }

    /// The canonical on-chain denom for this trace.
    pub fn ibc_denom(&self) -> String {
        if self.path.is_empty() {
            return self.base_denom.clone();
        }
        format!(
            "{}{}",
            IBC_DENOM_PREFIX,
            denom_hash(&format!("{}/{}", self.path, self.base_denom))
        )
    }

    /// The `(port, channel)` pairs in the path, outermost first.
    ///
    /// Fails when the path has an odd number of segments or any empty
    /// segment; such traces cannot come from a conforming transfer module.
    pub fn hops(&self) -> Result<Vec<(&str, &str)>, TraceError> {
        if self.path.is_empty() {
            return Ok(Vec::new());
        }
        let segments: Vec<&str> = self.path.split('/').collect();
        if segments.len() % 2 != 0 || segments.iter().any(|s| s.is_empty()) {
            return Err(TraceError::MalformedPath {
                path: self.path.clone(),
            });
        }
        Ok(segments
            .chunks(2)
            .map(|pair| (pair[0], pair[1]))
            .collect())
    }

    /// Strip the outermost `(port, channel)` pair, returning the trace as
    /// the counterparty chain at that hop sees the token.
    pub fn peel(&self) -> Result<DenomTrace, TraceError> {
        let hops = self.hops()?;
        if hops.is_empty() {
            return Err(TraceError::NothingToPeel {
                base_denom: self.base_denom.clone(),
            });
        }
        let remaining: Vec<String> = hops[1..]
            .iter()
            .map(|(port, channel)| format!("{port}/{channel}"))
            .collect();
        Ok(DenomTrace {
            path: remaining.join("/"),
            base_denom: self.base_denom.clone(),
        })
    }
}

/// Upper-case hex SHA-256 of a full trace string.
pub fn denom_hash(trace: &str) -> String {
    let digest = Sha256::digest(trace.as_bytes());
    hex::encode_upper(digest)
}

/// The wrapped denom a token gains after being sent over `(port, channel)`.
pub fn ibc_denom(port: &str, channel: &str, base: &str) -> String {
    format!(
        "{}{}",
        IBC_DENOM_PREFIX,
        denom_hash(&format!("{port}/{channel}/{base}"))
    )
}

pub fn is_ibc_denom(denom: &str) -> bool {
    denom.starts_with(IBC_DENOM_PREFIX)
}

/// The hex hash portion of an `ibc/<hash>` denom.
pub fn hash_from_denom(denom: &str) -> Option<&str> {
    denom.strip_prefix(IBC_DENOM_PREFIX).filter(|h| !h.is_empty())
}

#[derive(Debug, Clone, Error)]
pub enum TraceError {
    #[error("malformed trace path: {path}")]
    MalformedPath { path: String },

    #[error("trace for {base_denom} has no hops to peel")]
    NothingToPeel { base_denom: String },
}
