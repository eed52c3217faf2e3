//! Per-request telemetry events.
//!
//! # Responsibilities
//! - Describe one dispatch: timings plus request/response metadata
//! - Fan each event out to the attached handlers
//! - Keep handler failures away from the caller's result
//!
//! # Design Decisions
//! - Events borrow from the dispatch; handlers copy what they want to keep
//! - Emission is synchronous and handlers must not block
//! - A panicking handler is logged and skipped

use hyper::body::Bytes;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::http::request::Method;
use crate::http::response::Response;
use crate::observability::metrics;

/// Timing phases of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Measurements {
    /// Sending the request and reading the full response.
    pub response_time: Duration,
    /// Decoding the response body.
    pub decode_time: Duration,
    /// Whole dispatch, including signing and waiting for a connection.
    pub total_time: Duration,
}

/// What was sent and what came back.
#[derive(Debug)]
pub struct Metadata<'a> {
    pub request_id: Uuid,
    pub method: Method,
    /// Path and query as sent.
    pub path: &'a str,
    pub host: &'a str,
    pub port: u16,
    /// Headers after signing.
    pub headers: &'a [(String, String)],
    pub body: Option<&'a Bytes>,
    /// The value or error handed back to the caller.
    pub result: &'a Result<Response>,
}

/// One telemetry record, emitted once per request.
#[derive(Debug)]
pub struct TelemetryEvent<'a> {
    /// `<telemetry_prefix>.request`
    pub name: &'a str,
    /// The cluster's telemetry prefix.
    pub prefix: &'a str,
    pub measurements: Measurements,
    pub metadata: Metadata<'a>,
}

impl TelemetryEvent<'_> {
    /// `"ok"` or the error kind, for labels.
    pub fn outcome(&self) -> &'static str {
        match self.metadata.result {
            Ok(_) => "ok",
            Err(e) => e.kind().as_str(),
        }
    }

    /// Status of the response, success or error.
    pub fn status(&self) -> Option<u16> {
        match self.metadata.result {
            Ok(response) => Some(response.status),
            Err(e) => e.status(),
        }
    }
}

/// Receives telemetry events.
pub trait TelemetryHandler: Send + Sync {
    fn handle(&self, event: &TelemetryEvent<'_>);
}

impl<F> TelemetryHandler for F
where
    F: Fn(&TelemetryEvent<'_>) + Send + Sync,
{
    fn handle(&self, event: &TelemetryEvent<'_>) {
        self(event)
    }
}

/// Logs every request at debug level.
#[derive(Debug, Default)]
pub struct LogHandler;

impl TelemetryHandler for LogHandler {
    fn handle(&self, event: &TelemetryEvent<'_>) {
        let m = &event.measurements;
        match event.metadata.result {
            Ok(response) => tracing::debug!(
                event = %event.name,
                request_id = %event.metadata.request_id,
                method = %event.metadata.method,
                path = %event.metadata.path,
                status = response.status,
                response_time = ?m.response_time,
                decode_time = ?m.decode_time,
                total_time = ?m.total_time,
                "Request completed"
            ),
            Err(e) => tracing::debug!(
                event = %event.name,
                request_id = %event.metadata.request_id,
                method = %event.metadata.method,
                path = %event.metadata.path,
                error_kind = e.kind().as_str(),
                error = %e,
                total_time = ?m.total_time,
                "Request failed"
            ),
        }
    }
}

/// Records request counters and phase histograms.
#[derive(Debug, Default)]
pub struct MetricsHandler;

impl TelemetryHandler for MetricsHandler {
    fn handle(&self, event: &TelemetryEvent<'_>) {
        let m = &event.measurements;
        metrics::record_request(
            event.prefix,
            event.metadata.method.as_str(),
            event.outcome(),
            m.response_time,
            m.decode_time,
            m.total_time,
        );
    }
}

/// The set of handlers attached to a cluster.
#[derive(Clone)]
pub struct Telemetry {
    handlers: Arc<Vec<Arc<dyn TelemetryHandler>>>,
}

impl Telemetry {
    pub fn new(handlers: Vec<Arc<dyn TelemetryHandler>>) -> Self {
        Self {
            handlers: Arc::new(handlers),
        }
    }

    /// Log and metrics handlers.
    pub fn default_handlers() -> Vec<Arc<dyn TelemetryHandler>> {
        vec![Arc::new(LogHandler), Arc::new(MetricsHandler)]
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Deliver `event` to every handler. Never fails.
    pub fn emit(&self, event: &TelemetryEvent<'_>) {
        for handler in self.handlers.iter() {
            if catch_unwind(AssertUnwindSafe(|| handler.handle(event))).is_err() {
                tracing::warn!(event = %event.name, request_id = %event.metadata.request_id, "Telemetry handler panicked, event dropped for it");
            }
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(Self::default_handlers())
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").field("handlers", &self.handlers.len()).finish()
    }
}
