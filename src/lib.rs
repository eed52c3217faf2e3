//! Client core for a search cluster's HTTP API.
//!
//! # Architecture Overview
//!
//! ```text
//!     application
//!         │  get / post / put / delete / request
//!         ▼
//!  ┌──────────────┐     ┌───────────────┐
//!  │  lifecycle   │────▶│    config     │  resolve + validate, init hook
//!  │   Cluster    │     └───────────────┘
//!  └──────┬───────┘
//!         ▼
//!  ┌──────────────┐     ┌───────────────┐
//!  │    http      │────▶│     auth      │  Basic / None / custom Signer
//!  │  Dispatcher  │     └───────────────┘
//!  │              │     ┌───────────────┐     ┌───────────────┐
//!  │              │────▶│     pool      │────▶│      net      │────▶ cluster
//!  │              │     │ bounded, FIFO │     │ HTTP/1.1 conn │
//!  │              │     └───────────────┘     └───────────────┘
//!  │              │     ┌───────────────┐
//!  │              │────▶│ observability │  one telemetry event per request
//!  └──────────────┘     └───────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pool;

pub use auth::{AuthError, BasicAuth, NoAuth, Signer};
pub use config::{ClusterConfig, ConfigError, RawClusterConfig};
pub use error::{Error, ErrorKind, Result};
pub use http::{HttpError, Method, OutgoingRequest, RequestOptions, Response};
pub use lifecycle::{Cluster, ClusterBuilder, ClusterRegistry};
pub use observability::{Measurements, Telemetry, TelemetryEvent, TelemetryHandler};
pub use pool::PoolStats;
