//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Require an endpoint URL and check that it is usable
//! - Validate value ranges (timeouts > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RawClusterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is resolved into a ClusterConfig

use thiserror::Error;
use url::Url;

use crate::config::schema::RawClusterConfig;

/// A single semantic problem in a cluster configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("url is required")]
    MissingUrl,

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported url scheme '{0}', only http is supported")]
    UnsupportedScheme(String),

    #[error("conn_opts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),
}

/// Check a raw cluster configuration.
pub fn validate_cluster(raw: &RawClusterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match raw.url.as_deref().map(str::trim) {
        None | Some("") => errors.push(ValidationError::MissingUrl),
        Some(url) => {
            if let Err(e) = check_url(url) {
                errors.push(e);
            }
        }
    }

    let opts = &raw.conn_opts;
    if opts.connect_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_timeout_ms"));
    }
    if opts.receive_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("receive_timeout_ms"));
    }
    if opts.pool_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout("pool_timeout_ms"));
    }
    if opts.idle_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroTimeout("idle_timeout_ms"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|e| ValidationError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if parsed.scheme() != "http" {
        return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    if parsed.host_str().is_none() {
        return Err(ValidationError::InvalidUrl {
            url: url.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(())
}
