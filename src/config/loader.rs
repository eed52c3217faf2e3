//! Configuration loading and resolution.

use std::fs;
use std::path::Path;
use thiserror::Error;
use url::Url;

use crate::config::schema::{
    ClusterConfig, Endpoint, FileConfig, RawClusterConfig, DEFAULT_POOL_SIZE, MAX_POOL_SIZE,
};
use crate::config::validation::{validate_cluster, ValidationError};

/// Error type for configuration loading and resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration for cluster '{cluster}': {}", join_errors(.errors))]
    Validation {
        cluster: String,
        errors: Vec<ValidationError>,
    },

    /// Rejected by an application-supplied init hook.
    #[error("Cluster '{cluster}' init failed: {reason}")]
    Init { cluster: String, reason: String },
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML configuration file and validate every cluster in it.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: FileConfig = toml::from_str(&content)?;

    for (name, raw) in &config.clusters {
        validate_cluster(raw).map_err(|errors| ConfigError::Validation {
            cluster: name.clone(),
            errors,
        })?;
    }

    Ok(config)
}

/// Validate `raw` and apply defaults, producing the immutable config for cluster `name`.
pub fn resolve(name: &str, raw: RawClusterConfig) -> Result<ClusterConfig, ConfigError> {
    validate_cluster(&raw).map_err(|errors| ConfigError::Validation {
        cluster: name.to_string(),
        errors,
    })?;

    // Validation guarantees a parseable http URL with a host.
    let url_str = raw.url.as_deref().map(str::trim).unwrap_or_default();
    let url = Url::parse(url_str).map_err(|e| ConfigError::Validation {
        cluster: name.to_string(),
        errors: vec![ValidationError::InvalidUrl {
            url: url_str.to_string(),
            reason: e.to_string(),
        }],
    })?;
    let endpoint = Endpoint {
        host: url.host_str().unwrap_or_default().to_string(),
        port: url.port_or_known_default().unwrap_or(80),
        base_path: url.path().trim_end_matches('/').to_string(),
        url,
    };

    let pool_size = match raw.pool_size {
        Some(n) if n > 0 => {
            let requested = usize::try_from(n).unwrap_or(usize::MAX);
            if requested > MAX_POOL_SIZE {
                tracing::warn!(cluster = %name, requested = n, max = MAX_POOL_SIZE, "pool_size clamped");
            }
            requested.min(MAX_POOL_SIZE)
        }
        _ => DEFAULT_POOL_SIZE,
    };

    let telemetry_prefix = raw
        .telemetry_prefix
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| default_telemetry_prefix(name));

    Ok(ClusterConfig {
        name: name.to_string(),
        endpoint,
        username: raw.username,
        password: raw.password,
        auth: raw.auth.unwrap_or_default(),
        pool_size,
        conn_opts: raw.conn_opts,
        telemetry_prefix,
    })
}

/// Derive a metric-safe prefix from the cluster name ("Search.Main" → "search_main").
pub fn default_telemetry_prefix(name: &str) -> String {
    let prefix: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let prefix = prefix.trim_matches('_');
    if prefix.is_empty() {
        "search_cluster".to_string()
    } else {
        prefix.to_string()
    }
}
