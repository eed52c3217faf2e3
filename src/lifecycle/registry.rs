//! Named clusters started from one configuration file.

use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{load_config, FileConfig, ObservabilityConfig};
use crate::error::Result;
use crate::lifecycle::cluster::Cluster;

/// Running clusters keyed by name.
#[derive(Debug, Default)]
pub struct ClusterRegistry {
    clusters: DashMap<String, Arc<Cluster>>,
    observability: ObservabilityConfig,
}

impl ClusterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` and start every cluster it defines.
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = load_config(path)?;
        tracing::info!(path = %path.display(), clusters = config.clusters.len(), "Loaded cluster configuration");
        Self::from_config(config)
    }

    /// Start every cluster in `config`. Fails on the first cluster that does not start.
    ///
    /// Clusters with an idle timeout spawn their reaper, so call this inside a Tokio runtime.
    pub fn from_config(config: FileConfig) -> Result<Self> {
        let registry = Self {
            clusters: DashMap::new(),
            observability: config.observability,
        };
        for (name, raw) in config.clusters {
            let cluster = Cluster::builder(name).config(raw).start()?;
            registry.insert(cluster);
        }
        Ok(registry)
    }

    /// Observability settings from the loaded file.
    pub fn observability(&self) -> &ObservabilityConfig {
        &self.observability
    }

    /// Register `cluster` under its name, returning any cluster it replaced.
    pub fn insert(&self, cluster: Arc<Cluster>) -> Option<Arc<Cluster>> {
        self.clusters.insert(cluster.name().to_string(), cluster)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Cluster>> {
        self.clusters.get(name).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Cluster>> {
        self.clusters.remove(name).map(|(_, cluster)| cluster)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    /// Stop every cluster, each with the same grace period.
    ///
    /// Returns `true` if all of them drained in time.
    pub async fn stop_all(&self, grace: Duration) -> bool {
        // Collect first so no map shard is locked across an await.
        let clusters: Vec<Arc<Cluster>> = self.clusters.iter().map(|entry| entry.value().clone()).collect();
        let mut drained = true;
        for cluster in clusters {
            drained &= cluster.stop(grace).await;
        }
        drained
    }
}
