//! Query engine: endpoint rotation, retry, transport fallback
//!
//! Per call: a binary pass over the chain's gRPC endpoints in order, then a
//! text pass over its REST endpoints, unless the transport preference pins
//! one pass. Per endpoint: up to `api.retries` attempts with exponential
//! backoff. The cancel token aborts between and during attempts.

use escrow_audit_cache::{DescriptorCache, SchemaFetcher};
use escrow_audit_config::{ApiConfig, TransportPreference};
use escrow_audit_types::ChainInfo;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backoff::ExponentialBackoff;
use crate::grpc::GrpcTransport;
use crate::ops::QueryOp;
use crate::response::QueryResponse;
use crate::rest::RestTransport;
use crate::transport::{FailureClass, Transport, TransportKind};
use crate::ClientError;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Keeps typed queries framed against a current schema: before a binary
/// pass, the descriptor cache is consulted and refreshed across app
/// upgrades.
pub struct SchemaGate {
    cache: Arc<DescriptorCache>,
    fetcher: Arc<dyn SchemaFetcher>,
}

impl SchemaGate {
    pub fn new(cache: Arc<DescriptorCache>, fetcher: Arc<dyn SchemaFetcher>) -> Self {
        Self { cache, fetcher }
    }

    /// Best-effort: a failed refresh is logged and does not block the
    /// binary pass, since the typed clients may still be served.
    pub async fn ensure(&self, chain: &ChainInfo) {
        let Some(grpc_endpoint) = chain.grpc_endpoints().next() else {
            return;
        };

        let check = match chain.rpc_endpoints().next() {
            Some(rpc_endpoint) => {
                self.cache
                    .check_needs_update(&chain.chain_id, rpc_endpoint)
                    .await
            }
            // No RPC endpoint to probe: only fetch when nothing is cached.
            None => escrow_audit_cache::VersionCheck {
                needs_update: self.cache.lookup_schema(grpc_endpoint).await.is_none(),
                current: None,
                cached: None,
            },
        };

        if !check.needs_update {
            return;
        }

        if let Err(e) = self
            .cache
            .ensure_schema(grpc_endpoint, check.current, self.fetcher.as_ref())
            .await
        {
            warn!(chain = %chain.chain_name, endpoint = %grpc_endpoint, error = %e,
                "schema refresh failed; continuing with typed clients");
        }
    }
}

/// Multi-endpoint query client. Process-wide; share one instance across
/// concurrent audits.
pub struct QueryClient {
    api: ApiConfig,
    preference: TransportPreference,
    binary: Arc<dyn Transport>,
    text: Arc<dyn Transport>,
    schema_gate: Option<SchemaGate>,
}

impl QueryClient {
    pub fn new(api: ApiConfig, preference: TransportPreference) -> Self {
        Self {
            binary: Arc::new(GrpcTransport::new()),
            text: Arc::new(RestTransport::new(api.passthrough_hosts.clone())),
            api,
            preference,
            schema_gate: None,
        }
    }

    /// Share a gRPC transport built elsewhere (so the schema gate's
    /// reflection fetcher reuses the same channel pool).
    pub fn with_grpc(
        api: ApiConfig,
        preference: TransportPreference,
        grpc: Arc<GrpcTransport>,
    ) -> Self {
        Self {
            binary: grpc,
            text: Arc::new(RestTransport::new(api.passthrough_hosts.clone())),
            api,
            preference,
            schema_gate: None,
        }
    }

    /// Wire in the descriptor cache consulted before binary passes.
    pub fn with_schema_gate(mut self, gate: SchemaGate) -> Self {
        self.schema_gate = Some(gate);
        self
    }

    /// Test seam: replace both transports.
    pub fn with_transports(
        api: ApiConfig,
        preference: TransportPreference,
        binary: Arc<dyn Transport>,
        text: Arc<dyn Transport>,
    ) -> Self {
        Self {
            api,
            preference,
            binary,
            text,
            schema_gate: None,
        }
    }

    /// Issue one logical query, walking endpoints and transports until a
    /// response lands or everything is exhausted.
    pub async fn query(
        &self,
        chain: &ChainInfo,
        op: QueryOp,
        cancel: &CancellationToken,
    ) -> Result<QueryResponse, ClientError> {
        let passes = self.passes(chain);
        if passes.iter().all(|(_, endpoints)| endpoints.is_empty()) {
            return Err(ClientError::NoEndpoints {
                chain: chain.chain_name.clone(),
            });
        }

        let timeout = Duration::from_millis(self.api.timeout_ms);
        let mut attempts: u32 = 0;

        for (transport, endpoints) in passes {
            if endpoints.is_empty() {
                continue;
            }

            if transport.kind() == TransportKind::Binary {
                if let Some(gate) = &self.schema_gate {
                    gate.ensure(chain).await;
                }
            }

            'endpoints: for endpoint in endpoints {
                let mut backoff = ExponentialBackoff::new(
                    Duration::from_millis(self.api.delay_ms),
                    MAX_BACKOFF,
                );

                for attempt in 1..=self.api.retries.max(1) {
                    if cancel.is_cancelled() {
                        return Err(ClientError::Cancelled);
                    }
                    attempts += 1;

                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                        r = tokio::time::timeout(timeout, transport.execute(&endpoint, &op)) => r,
                    };

                    match outcome {
                        Ok(Ok(response)) => return Ok(response),
                        Ok(Err(failure)) => match failure.class {
                            FailureClass::Fatal => {
                                return Err(ClientError::Rejected {
                                    operation: op.name(),
                                    endpoint,
                                    reason: failure.message,
                                })
                            }
                            FailureClass::Rotate => {
                                debug!(%endpoint, transport = %transport.kind(),
                                    reason = %failure.message, "rotating endpoint");
                                continue 'endpoints;
                            }
                            FailureClass::Retry => {
                                debug!(%endpoint, transport = %transport.kind(), attempt,
                                    reason = %failure.message, "attempt failed");
                            }
                        },
                        Err(_) => {
                            debug!(%endpoint, transport = %transport.kind(), attempt,
                                "attempt timed out");
                        }
                    }

                    if attempt < self.api.retries.max(1) {
                        let delay = backoff.next_delay();
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        Err(ClientError::EndpointsExhausted {
            operation: op.name(),
            attempts,
        })
    }

    fn passes(&self, chain: &ChainInfo) -> Vec<(Arc<dyn Transport>, Vec<String>)> {
        let grpc: Vec<String> = chain.grpc_endpoints().map(str::to_string).collect();
        let rest: Vec<String> = chain.rest_endpoints().map(str::to_string).collect();

        match self.preference {
            TransportPreference::Binary => vec![(self.binary.clone(), grpc)],
            TransportPreference::Text => vec![(self.text.clone(), rest)],
            TransportPreference::Auto => {
                vec![(self.binary.clone(), grpc), (self.text.clone(), rest)]
            }
        }
    }
}
