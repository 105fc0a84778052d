use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::ClusterConfig;
use crate::errors::{CloudError, CloudResult};
use crate::resources::Cluster;

/// The live inventory behind a cluster provider. Real implementations talk to
/// the management API; every call may be expensive.
pub trait Inventory: Send + Sync {
    fn lookup_cluster(&self, name: &str, config: &ClusterConfig) -> CloudResult<Cluster>;
}

/// Inventory answering from a fixed capacity snapshot.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    clusters: Vec<Cluster>,
    by_name: HashMap<String, usize>,
}

#[derive(Debug, Deserialize)]
struct InventorySnapshot {
    #[serde(default)]
    clusters: Vec<Cluster>,
}

impl StaticInventory {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        let by_name = clusters
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name().to_string(), idx))
            .collect();
        Self { clusters, by_name }
    }

    pub fn from_json(json: &str) -> CloudResult<Self> {
        let snapshot: InventorySnapshot = serde_json::from_str(json)?;
        Ok(Self::new(snapshot.clusters))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let inventory = Self::from_json(&json)?;
        info!(
            path = %path.display(),
            clusters = inventory.clusters.len(),
            "Loaded inventory snapshot"
        );
        Ok(inventory)
    }

    /// Every cluster in snapshot order.
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }
}

impl Inventory for StaticInventory {
    fn lookup_cluster(&self, name: &str, _config: &ClusterConfig) -> CloudResult<Cluster> {
        self.by_name
            .get(name)
            .map(|&idx| self.clusters[idx].clone())
            .ok_or_else(|| CloudError::ClusterNotFound {
                name: name.to_string(),
            })
    }
}
