//! Cluster handle and startup.
//!
//! # Responsibilities
//! - Resolve configuration, applying the application's init hook
//! - Own the signer, telemetry handlers and the swappable pool slot
//! - Start and stop the pool and its idle reaper
//! - Expose the request API
//!
//! # Design Decisions
//! - Fail fast: an invalid config never produces a cluster
//! - The pool slot is swapped atomically; in-flight requests keep the pool they started with
//! - Stop is graceful up to a deadline, then connections are aborted

use arc_swap::ArcSwapOption;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::auth::{signer_for, Signer};
use crate::config::{resolve, ClusterConfig, ConfigError, RawClusterConfig};
use crate::error::Result;
use crate::http::{Dispatcher, Method, RequestOptions, Response};
use crate::observability::{Telemetry, TelemetryHandler};
use crate::pool::{ConnectionPool, IdleReaper, PoolStats};

type InitHook = Box<dyn FnOnce(RawClusterConfig) -> std::result::Result<RawClusterConfig, ConfigError> + Send>;

/// Builder for a [`Cluster`].
pub struct ClusterBuilder {
    name: String,
    config: RawClusterConfig,
    init: Option<InitHook>,
    signer: Option<Arc<dyn Signer>>,
    default_handlers: bool,
    handlers: Vec<Arc<dyn TelemetryHandler>>,
}

impl ClusterBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: RawClusterConfig::default(),
            init: None,
            signer: None,
            default_handlers: true,
            handlers: Vec::new(),
        }
    }

    /// Static configuration.
    pub fn config(mut self, config: RawClusterConfig) -> Self {
        self.config = config;
        self
    }

    /// Hook that receives the static config at start and returns the final one.
    ///
    /// Use it to pull credentials or endpoints from the environment or a secret store.
    pub fn init<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(RawClusterConfig) -> std::result::Result<RawClusterConfig, ConfigError> + Send + 'static,
    {
        self.init = Some(Box::new(hook));
        self
    }

    /// Replace the signer selected by `auth`.
    pub fn signer(mut self, signer: impl Signer + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Attach a telemetry handler.
    pub fn handler(mut self, handler: impl TelemetryHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Attach several telemetry handlers.
    pub fn handlers(mut self, handlers: impl IntoIterator<Item = Arc<dyn TelemetryHandler>>) -> Self {
        self.handlers.extend(handlers);
        self
    }

    /// Skip the built-in log and metrics handlers.
    pub fn without_default_handlers(mut self) -> Self {
        self.default_handlers = false;
        self
    }

    /// Resolve the configuration and start the cluster.
    ///
    /// Must run inside a Tokio runtime when `idle_timeout_ms` is set, since the idle
    /// reaper is spawned onto it.
    pub fn start(self) -> Result<Arc<Cluster>> {
        let raw = match self.init {
            Some(hook) => hook(self.config)?,
            None => self.config,
        };
        let config = Arc::new(resolve(&self.name, raw)?);

        let signer = self.signer.unwrap_or_else(|| signer_for(config.auth));
        let mut handlers = if self.default_handlers {
            Telemetry::default_handlers()
        } else {
            Vec::new()
        };
        handlers.extend(self.handlers);

        let cluster = Arc::new(Cluster {
            dispatcher: Dispatcher::new(config.clone(), signer, Telemetry::new(handlers)),
            config,
            pool: ArcSwapOption::empty(),
            reaper: Mutex::new(None),
        });
        cluster.start();
        Ok(cluster)
    }
}

/// A running (or stopped) connection to one search cluster.
pub struct Cluster {
    config: Arc<ClusterConfig>,
    dispatcher: Dispatcher,
    /// `None` while stopped.
    pool: ArcSwapOption<ConnectionPool>,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl Cluster {
    pub fn builder(name: impl Into<String>) -> ClusterBuilder {
        ClusterBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.pool.load_full().is_some_and(|pool| !pool.is_closed())
    }

    /// Bookkeeping of the current pool, if running.
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.load_full().map(|pool| pool.stats())
    }

    /// Open a fresh pool. Returns `false` if the cluster was already running.
    pub fn start(&self) -> bool {
        // The reaper lock serialises start and stop, so check and store are one step.
        let mut reaper = self.lock_reaper();
        if self.is_running() {
            return false;
        }

        let pool = ConnectionPool::new(self.config.clone());
        let next = self
            .config
            .conn_opts
            .idle_timeout()
            .map(|idle_timeout| IdleReaper::new(&pool, idle_timeout).spawn());
        if let Some(previous) = std::mem::replace(&mut *reaper, next) {
            previous.abort();
        }
        self.pool.store(Some(pool));
        drop(reaper);

        tracing::info!(
            cluster = %self.config.name,
            url = %self.config.endpoint.url,
            pool_size = self.config.pool_size,
            auth = ?self.config.auth,
            "Cluster started"
        );
        true
    }

    /// Close the pool, wait up to `grace` for in-flight requests, then abort the rest.
    ///
    /// Returns `true` if every connection came back before the deadline.
    pub async fn stop(&self, grace: Duration) -> bool {
        let (pool, reaper) = {
            let mut reaper = self.lock_reaper();
            (self.pool.swap(None), reaper.take())
        };
        if let Some(reaper) = reaper {
            reaper.abort();
        }
        let Some(pool) = pool else {
            return true;
        };

        tracing::info!(cluster = %self.config.name, grace = ?grace, "Stopping cluster");
        pool.close();
        let drained = pool.drain(grace).await;
        if !drained {
            tracing::warn!(
                cluster = %self.config.name,
                checked_out = pool.stats().checked_out,
                "Grace period elapsed, aborting in-flight connections"
            );
        }
        pool.abort_all();
        tracing::info!(cluster = %self.config.name, drained, "Cluster stopped");
        drained
    }

    /// Send a request with full control over params, headers and options.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
        opts: RequestOptions,
    ) -> Result<Response> {
        let pool = self.pool.load_full();
        self.dispatcher
            .dispatch(pool.as_ref(), method, path, body, params, headers, opts)
            .await
    }

    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<Response> {
        self.request(Method::Get, path, None, params, &[], RequestOptions::default())
            .await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response> {
        self.request(Method::Post, path, Some(body), &[], &[], RequestOptions::default())
            .await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Response> {
        self.request(Method::Put, path, Some(body), &[], &[], RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Response> {
        self.request(Method::Delete, path, None, &[], &[], RequestOptions::default())
            .await
    }

    fn lock_reaper(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.reaper.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        if let Some(reaper) = self.lock_reaper().take() {
            reaper.abort();
        }
    }
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("pool", &self.pool_stats())
            .finish()
    }
}
