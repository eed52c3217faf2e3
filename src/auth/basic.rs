//! Basic and no-op signing strategies.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::auth::{AuthError, Signer};
use crate::config::ClusterConfig;
use crate::http::request::OutgoingRequest;

/// Appends `Authorization: Basic <base64(user:pass)>` when both credentials are set.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicAuth;

impl BasicAuth {
    /// Header value for the given credentials.
    pub fn header_value(username: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", username, password)))
    }
}

impl Signer for BasicAuth {
    fn sign(&self, config: &ClusterConfig, mut request: OutgoingRequest) -> Result<OutgoingRequest, AuthError> {
        match (config.username.as_deref(), config.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                request
                    .headers
                    .push(("Authorization".to_string(), Self::header_value(username, password)));
            }
            _ => {
                tracing::trace!(cluster = %config.name, "No credentials configured, sending unauthenticated");
            }
        }
        Ok(request)
    }
}

/// Leaves every request untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl Signer for NoAuth {
    fn sign(&self, _config: &ClusterConfig, request: OutgoingRequest) -> Result<OutgoingRequest, AuthError> {
        Ok(request)
    }
}
