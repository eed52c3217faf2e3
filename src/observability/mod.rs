//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every dispatch produces one TelemetryEvent:
//!     → telemetry.rs (fan-out to handlers, panics contained)
//!         → LogHandler  → tracing debug event
//!         → MetricsHandler → metrics.rs (counters, histograms)
//!         → application handlers (closures or TelemetryHandler impls)
//!
//! Pool and connection lifecycle:
//!     → metrics.rs (pool gauges, open/close counters)
//!     → tracing events with cluster and connection_id fields
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Observability never changes a request's result
//! - Request ID flows through span, log events and telemetry metadata
//! - Metrics are cheap and no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
pub mod telemetry;

pub use telemetry::{
    LogHandler, Measurements, Metadata, MetricsHandler, Telemetry, TelemetryEvent, TelemetryHandler,
};
