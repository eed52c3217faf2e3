//! Request signing subsystem.
//!
//! # Data Flow
//! ```text
//! ClusterConfig.auth (selected once at start)
//!     → signer_for() picks BasicAuth / NoAuth, or a custom Signer from the builder
//!     → dispatcher calls sign() on every request before touching the pool
//!     → signed OutgoingRequest goes on the wire
//! ```
//!
//! # Design Decisions
//! - Signing is pure: no I/O, no pool access, safe to share across tasks
//! - Missing credentials degrade to an unauthenticated request, they never fail
//! - Custom strategies may reject a request with AuthError

pub mod basic;

use std::sync::Arc;
use thiserror::Error;

use crate::config::{AuthStrategy, ClusterConfig};
use crate::http::request::OutgoingRequest;

pub use basic::{BasicAuth, NoAuth};

/// A signing strategy rejected the request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AuthError(pub String);

impl AuthError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Adds authentication evidence to an outgoing request.
pub trait Signer: Send + Sync {
    /// Sign `request` for the cluster described by `config`.
    fn sign(&self, config: &ClusterConfig, request: OutgoingRequest) -> Result<OutgoingRequest, AuthError>;
}

impl<F> Signer for F
where
    F: Fn(&ClusterConfig, OutgoingRequest) -> Result<OutgoingRequest, AuthError> + Send + Sync,
{
    fn sign(&self, config: &ClusterConfig, request: OutgoingRequest) -> Result<OutgoingRequest, AuthError> {
        self(config, request)
    }
}

/// Built-in signer for a configured strategy.
pub fn signer_for(strategy: AuthStrategy) -> Arc<dyn Signer> {
    match strategy {
        AuthStrategy::Basic => Arc::new(BasicAuth),
        AuthStrategy::None => Arc::new(NoAuth),
    }
}
