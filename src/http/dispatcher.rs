//! Request dispatch.
//!
//! # Responsibilities
//! - Run one request end to end: build, sign, acquire, send, decode, map
//! - Give the connection back on every path: released when healthy,
//!   invalidated after a transport fault
//! - Emit exactly one telemetry event per request, success or failure
//!
//! # Design Decisions
//! - Signing happens before acquisition so a rejected request never holds a slot
//! - The signer gets a copy; if it fails, telemetry reports the unsigned request
//! - Decode failures and error statuses still return the connection to the pool
//! - A caller that drops the future mid-flight emits nothing; the guard
//!   invalidates the connection it held

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::auth::Signer;
use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::http::request::{Method, OutgoingRequest, RequestOptions};
use crate::http::response::{decode_body, map_response, Response};
use crate::observability::{Measurements, Metadata, Telemetry, TelemetryEvent};
use crate::pool::ConnectionPool;

/// Executes requests for one cluster.
pub struct Dispatcher {
    config: Arc<ClusterConfig>,
    signer: Arc<dyn Signer>,
    telemetry: Telemetry,
    event_name: String,
}

impl Dispatcher {
    pub fn new(config: Arc<ClusterConfig>, signer: Arc<dyn Signer>, telemetry: Telemetry) -> Self {
        let event_name = format!("{}.request", config.telemetry_prefix);
        Self {
            config,
            signer,
            telemetry,
            event_name,
        }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Name of the telemetry event emitted per request.
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Send one request through `pool`.
    ///
    /// `pool` is `None` while the cluster is stopped; the request then fails with
    /// [`Error::NotStarted`] after being signed and reported.
    #[allow(clippy::too_many_arguments)]
    pub async fn dispatch(
        &self,
        pool: Option<&Arc<ConnectionPool>>,
        method: Method,
        path: &str,
        body: Option<&Value>,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
        opts: RequestOptions,
    ) -> Result<Response> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!(
            "search_request",
            cluster = %self.config.name,
            request_id = %request_id,
            method = %method,
        );

        async move {
            let request = OutgoingRequest::new(method, path, body, params, headers);
            let mut measurements = Measurements::default();
            let (sent, result) = self.execute(pool, request, &opts, &mut measurements).await;
            measurements.total_time = started.elapsed();

            if let Err(e) = &result {
                tracing::debug!(path = %sent.path, error = %e, "Request failed");
            }
            self.emit(request_id, &sent, &result, measurements);
            result
        }
        .instrument(span)
        .await
    }

    /// Steps between building the request and emitting telemetry.
    ///
    /// Returns the request as it was last seen, for telemetry metadata.
    async fn execute(
        &self,
        pool: Option<&Arc<ConnectionPool>>,
        request: OutgoingRequest,
        opts: &RequestOptions,
        measurements: &mut Measurements,
    ) -> (OutgoingRequest, Result<Response>) {
        let request = match self.signer.sign(&self.config, request.clone()) {
            Ok(signed) => signed,
            Err(e) => {
                tracing::warn!(cluster = %self.config.name, error = %e, "Signer rejected request");
                return (request, Err(Error::Auth(e)));
            }
        };

        let wire = match request.to_wire(&self.config.endpoint) {
            Ok(wire) => wire,
            Err(e) => return (request, Err(e)),
        };

        let Some(pool) = pool else {
            return (request, Err(Error::NotStarted(self.config.name.clone())));
        };
        let pool_timeout = opts.pool_timeout.unwrap_or_else(|| self.config.conn_opts.pool_timeout());
        let mut conn = match pool.acquire(pool_timeout).await {
            Ok(conn) => conn,
            Err(e) => return (request, Err(e)),
        };

        let receive_timeout = opts
            .receive_timeout
            .unwrap_or_else(|| self.config.conn_opts.receive_timeout());
        let sent_at = Instant::now();
        let sent = conn.send(wire, receive_timeout).await;
        measurements.response_time = sent_at.elapsed();
        let raw = match sent {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(connection_id = %conn.id(), error = %e, "Transport failure, invalidating connection");
                pool.invalidate(conn);
                return (request, Err(Error::Transport(e)));
            }
        };

        let decode_at = Instant::now();
        let decoded = decode_body(&raw.body);
        measurements.decode_time = decode_at.elapsed();

        let result = map_response(raw.status, raw.headers, &raw.body, decoded);
        pool.release(conn);
        (request, result)
    }

    fn emit(&self, request_id: Uuid, sent: &OutgoingRequest, result: &Result<Response>, measurements: Measurements) {
        let event = TelemetryEvent {
            name: &self.event_name,
            prefix: &self.config.telemetry_prefix,
            measurements,
            metadata: Metadata {
                request_id,
                method: sent.method,
                path: &sent.path,
                host: &self.config.endpoint.host,
                port: self.config.endpoint.port,
                headers: &sent.headers,
                body: sent.body.as_ref(),
                result,
            },
        };
        self.telemetry.emit(&event);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("cluster", &self.config.name)
            .field("event", &self.event_name)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}
