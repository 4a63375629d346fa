//! Amounts
//!
//! Bank amounts arrive as decimal strings and can exceed 128 bits (sdk.Int
//! is 256-bit bounded), so they are held as arbitrary-precision integers.
//! Discrepancies are signed.

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A bank coin as it appears on the wire: amount still a decimal string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.into(),
        }
    }

    pub fn parsed_amount(&self) -> Result<BigUint, AmountError> {
        parse_amount(&self.amount)
    }
}

/// Parse a non-negative decimal amount string.
pub fn parse_amount(raw: &str) -> Result<BigUint, AmountError> {
    BigUint::from_str(raw.trim()).map_err(|_| AmountError::Invalid {
        raw: raw.to_string(),
    })
}

/// `escrow - supply`, signed.
pub fn discrepancy(escrow: &BigUint, supply: &BigUint) -> BigInt {
    BigInt::from(escrow.clone()) - BigInt::from(supply.clone())
}

/// Serde helpers keeping big integers as decimal strings in JSON output.
pub mod serde_string {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BigUint::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// As [`serde_string`], for optional amounts.
pub mod serde_opt_string {
    use num_bigint::BigUint;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| BigUint::from_str(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// As [`serde_string`], for signed discrepancies.
pub mod serde_int_string {
    use num_bigint::BigInt;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BigInt::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Error)]
pub enum AmountError {
    #[error("invalid amount: {raw:?}")]
    Invalid { raw: String },
}
