//! Configuration schema definitions.
//!
//! Raw types derive Serde traits for deserialization from config files. The
//! resolved [`ClusterConfig`] is what the rest of the crate consumes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

/// Pool size used when none (or a non-positive one) is configured.
pub const DEFAULT_POOL_SIZE: usize = 5;

/// Largest pool the connection semaphore can represent. Larger values are clamped.
pub const MAX_POOL_SIZE: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Root of a configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FileConfig {
    /// Cluster definitions keyed by cluster name.
    pub clusters: BTreeMap<String, RawClusterConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Unvalidated cluster configuration, as written in a config file or built in code.
#[derive(Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RawClusterConfig {
    /// Endpoint URL (e.g., "http://localhost:9200"). Required.
    pub url: Option<String>,

    /// Basic auth username.
    pub username: Option<String>,

    /// Basic auth password.
    pub password: Option<String>,

    /// Signing strategy selector.
    pub auth: Option<AuthStrategy>,

    /// Maximum number of connections. Non-positive values fall back to the default.
    pub pool_size: Option<i64>,

    /// Options passed through to the transport layer.
    pub conn_opts: ConnectionOptions,

    /// Prefix for telemetry event and metric names.
    pub telemetry_prefix: Option<String>,
}

impl RawClusterConfig {
    /// Create a raw config pointing at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set basic auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, pool_size: i64) -> Self {
        self.pool_size = Some(pool_size);
        self
    }

    /// Overlay `other` on top of `self`: every field set in `other` wins.
    ///
    /// Connection options are replaced wholesale when `other` carries non-default ones.
    pub fn merge(self, other: RawClusterConfig) -> Self {
        Self {
            url: other.url.or(self.url),
            username: other.username.or(self.username),
            password: other.password.or(self.password),
            auth: other.auth.or(self.auth),
            pool_size: other.pool_size.or(self.pool_size),
            conn_opts: if other.conn_opts == ConnectionOptions::default() {
                self.conn_opts
            } else {
                other.conn_opts
            },
            telemetry_prefix: other.telemetry_prefix.or(self.telemetry_prefix),
        }
    }
}

impl std::fmt::Debug for RawClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawClusterConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth", &self.auth)
            .field("pool_size", &self.pool_size)
            .field("conn_opts", &self.conn_opts)
            .field("telemetry_prefix", &self.telemetry_prefix)
            .finish()
    }
}

/// Signing strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthStrategy {
    /// `Authorization: Basic ...` when both credentials are configured.
    #[default]
    Basic,
    /// Never touches the request.
    None,
}

/// Transport-level options.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionOptions {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Time allowed to send a request and read the full response, in milliseconds.
    pub receive_timeout_ms: u64,

    /// Time a caller may wait for a pooled connection, in milliseconds.
    pub pool_timeout_ms: u64,

    /// Close idle connections unused for this long. Never evicted when unset.
    pub idle_timeout_ms: Option<u64>,

    /// Set TCP_NODELAY on new connections.
    pub nodelay: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            receive_timeout_ms: 15_000,
            pool_timeout_ms: 5_000,
            idle_timeout_ms: None,
            nodelay: true,
        }
    }
}

impl ConnectionOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}

/// Parsed endpoint of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// The full endpoint URL.
    pub url: Url,
    /// Host name or address.
    pub host: String,
    /// TCP port (explicit or scheme default).
    pub port: u16,
    /// Path prefix prepended to every request path, without trailing slash.
    pub base_path: String,
}

impl Endpoint {
    /// Value for the `Host` request header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolved, immutable configuration of one cluster.
#[derive(Clone)]
pub struct ClusterConfig {
    /// Cluster name.
    pub name: String,
    /// Where requests go.
    pub endpoint: Endpoint,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Selected signing strategy.
    pub auth: AuthStrategy,
    /// Maximum concurrently checked-out connections.
    pub pool_size: usize,
    pub conn_opts: ConnectionOptions,
    /// Prefix for telemetry event and metric names.
    pub telemetry_prefix: String,
}

impl std::fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("name", &self.name)
            .field("url", &self.endpoint.url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth", &self.auth)
            .field("pool_size", &self.pool_size)
            .field("conn_opts", &self.conn_opts)
            .field("telemetry_prefix", &self.telemetry_prefix)
            .finish()
    }
}
