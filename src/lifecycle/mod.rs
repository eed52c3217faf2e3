//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (cluster.rs):
//!     RawClusterConfig → init hook → resolve → signer + telemetry → pool (+ idle reaper)
//!
//! Shutdown (cluster.rs):
//!     stop(grace) → close pool → drain checked-out connections → abort the rest
//!
//! Registry (registry.rs):
//!     config file → one started Cluster per [clusters.<name>] → stop_all on exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then signer and telemetry, pool last
//! - Ordered shutdown: stop accepting, drain, abort
//! - Shutdown has a deadline: connections still out after the grace period are aborted
//! - A stopped cluster can be started again with the same configuration

pub mod cluster;
pub mod registry;

pub use cluster::{Cluster, ClusterBuilder};
pub use registry::ClusterRegistry;
