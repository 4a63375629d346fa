//! Transport seam
//!
//! The retry engine treats transports uniformly; each one maps its native
//! failures onto a retry class.

use async_trait::async_trait;
use thiserror::Error;

use crate::{ops::QueryOp, response::QueryResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Binary,
    Text,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Binary => f.write_str("binary"),
            TransportKind::Text => f.write_str("text"),
        }
    }
}

/// How the retry engine should react to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Transient: back off and retry on the same endpoint.
    Retry,

    /// This endpoint cannot serve the operation: move on immediately.
    Rotate,

    /// The request itself was rejected: fail the operation, no retries.
    Fatal,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub class: FailureClass,
    pub message: String,
}

impl TransportError {
    pub fn retry(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Retry,
            message: message.into(),
        }
    }

    pub fn rotate(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Rotate,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            class: FailureClass::Fatal,
            message: message.into(),
        }
    }
}

/// One way of asking a single endpoint a single question.
#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    async fn execute(&self, endpoint: &str, op: &QueryOp)
        -> Result<QueryResponse, TransportError>;
}
