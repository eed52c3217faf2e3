//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for applications that want the default setup
//! - Honour `RUST_LOG`, falling back to the configured level
//!
//! # Design Decisions
//! - The library itself only emits `tracing` events; installing a subscriber is the
//!   application's call
//! - Safe to call more than once: later calls report an error instead of panicking

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install a global fmt subscriber filtered by `RUST_LOG` or `config.log_level`.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}
