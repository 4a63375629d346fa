//! Multi-endpoint Cosmos query client
//!
//! One logical query interface over a chain's ordered endpoint lists. Each
//! call runs a binary (gRPC) pass over the chain's gRPC endpoints and falls
//! back to a text (REST) pass, with per-endpoint retry and exponential
//! backoff. Transient failures (429/503, network errors, malformed bodies)
//! retry in place; 501/502 and `Unimplemented` rotate to the next endpoint;
//! other 4xx responses fail the operation immediately.

mod backoff;
mod client;
mod grpc;
mod ops;
mod response;
mod rest;
mod transport;

pub use backoff::ExponentialBackoff;
pub use client::{QueryClient, SchemaGate};
pub use grpc::GrpcTransport;
pub use ops::QueryOp;
pub use response::{ChannelInfo, ClientStateInfo, ConnectionInfo, NodeInfo, QueryResponse};
pub use rest::RestTransport;
pub use transport::{FailureClass, Transport, TransportError, TransportKind};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("chain {chain} has no queryable endpoints")]
    NoEndpoints { chain: String },

    #[error("{operation} rejected by {endpoint}: {reason}")]
    Rejected {
        operation: &'static str,
        endpoint: String,
        reason: String,
    },

    #[error("{operation} exhausted all endpoints after {attempts} attempts")]
    EndpointsExhausted {
        operation: &'static str,
        attempts: u32,
    },

    #[error("query cancelled")]
    Cancelled,

    #[error("unexpected response variant for {operation}")]
    UnexpectedResponse { operation: &'static str },
}
