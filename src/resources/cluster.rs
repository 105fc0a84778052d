use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use super::Datastore;

/// Point-in-time snapshot of a compute pool and the datastores it can reach.
///
/// Two snapshots are equal when they name the same cluster, whatever their
/// capacity figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "ClusterSnapshot", into = "ClusterSnapshot")]
pub struct Cluster {
    name: String,
    free_memory: u64, // MB
    datastores: BTreeMap<String, Datastore>,
}

impl Cluster {
    /// Datastores sharing a name collapse into the last one given.
    pub fn new(
        name: impl Into<String>,
        free_memory: u64,
        datastores: impl IntoIterator<Item = Datastore>,
    ) -> Self {
        Self {
            name: name.into(),
            free_memory,
            datastores: datastores
                .into_iter()
                .map(|ds| (ds.name.clone(), ds))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn free_memory(&self) -> u64 {
        self.free_memory
    }

    pub fn accessible_datastores(&self) -> &BTreeMap<String, Datastore> {
        &self.datastores
    }

    pub fn datastore(&self, name: &str) -> Option<&Datastore> {
        self.datastores.get(name)
    }

    /// Sum of free space over every reachable datastore.
    pub fn total_free_space(&self) -> u64 {
        self.datastores
            .values()
            .map(|ds| ds.free_space)
            .fold(0, u64::saturating_add)
    }
}

impl PartialEq for Cluster {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Cluster {}

impl Hash for Cluster {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

// Wire shape used by inventory snapshots: datastores as a plain list.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClusterSnapshot {
    name: String,
    free_memory: u64,
    #[serde(default)]
    datastores: Vec<Datastore>,
}

impl From<ClusterSnapshot> for Cluster {
    fn from(snapshot: ClusterSnapshot) -> Self {
        Cluster::new(snapshot.name, snapshot.free_memory, snapshot.datastores)
    }
}

impl From<Cluster> for ClusterSnapshot {
    fn from(cluster: Cluster) -> Self {
        ClusterSnapshot {
            name: cluster.name,
            free_memory: cluster.free_memory,
            datastores: cluster.datastores.into_values().collect(),
        }
    }
}
