//! Cluster and datastore selection for a single VM.

use std::sync::Arc;
use tracing::{debug, info};

use crate::errors::{CloudError, CloudResult};
use crate::resources::{Cluster, Datastore, DiskConfig};

/// Where one disk of the VM goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskPlacement {
    pub disk: DiskConfig,
    pub datastore: String,
}

/// The winning cluster and a datastore for every requested disk, in the
/// order the disks were requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPlacement {
    pub cluster_name: String,
    pub disks: Vec<DiskPlacement>,
}

impl ClusterPlacement {
    pub fn datastore_for(&self, disk: &DiskConfig) -> Option<&str> {
        self.disks
            .iter()
            .find(|p| &p.disk == disk)
            .map(|p| p.datastore.as_str())
    }

    pub fn ephemeral_datastore_name(&self) -> Option<&str> {
        self.disks
            .iter()
            .find(|p| p.disk.is_ephemeral())
            .map(|p| p.datastore.as_str())
    }
}

pub trait ClusterPicker: Send {
    /// Replaces the candidate set.
    fn update(&mut self, clusters: Vec<Arc<Cluster>>);

    fn best_cluster_placement(
        &self,
        req_memory: u64,
        disk_configurations: &[DiskConfig],
    ) -> CloudResult<ClusterPlacement>;
}

/// Picks by free capacity.
///
/// Memory is a hard gate. Each disk goes to the eligible datastore with the
/// most free space; disks are checked against the same snapshot and do not
/// consume capacity from each other. Among feasible clusters the one with the
/// most free memory wins, then the one with the most total datastore space,
/// then the earliest candidate.
///
/// `mem_headroom` and `disk_headroom` are held back from every cluster's free
/// memory and every datastore's free space before checking a fit.
#[derive(Debug, Clone, Default)]
pub struct CapacityPicker {
    mem_headroom: u64,
    disk_headroom: u64,
    clusters: Vec<Arc<Cluster>>,
}

impl CapacityPicker {
    pub fn new(mem_headroom: u64, disk_headroom: u64) -> Self {
        Self {
            mem_headroom,
            disk_headroom,
            clusters: Vec::new(),
        }
    }

    pub fn mem_headroom(&self) -> u64 {
        self.mem_headroom
    }

    pub fn disk_headroom(&self) -> u64 {
        self.disk_headroom
    }

    pub fn clusters(&self) -> &[Arc<Cluster>] {
        &self.clusters
    }

    fn fits(&self, datastore: &Datastore, disk: &DiskConfig) -> bool {
        datastore.free_space.saturating_sub(self.disk_headroom) >= disk.size()
    }

    fn pick_datastore<'a>(&self, cluster: &'a Cluster, disk: &DiskConfig) -> Option<&'a Datastore> {
        if let Some(existing) = disk.existing_datastore_name() {
            return cluster
                .datastore(existing)
                .filter(|ds| self.fits(ds, disk));
        }

        // First of equals wins, so ties land on the lowest name.
        cluster
            .accessible_datastores()
            .values()
            .filter(|ds| disk.accepts_datastore(&ds.name) && self.fits(ds, disk))
            .fold(None, |best: Option<&Datastore>, ds| match best {
                Some(b) if b.free_space >= ds.free_space => Some(b),
                _ => Some(ds),
            })
    }

    fn place_disks(&self, cluster: &Cluster, disks: &[DiskConfig]) -> Option<Vec<DiskPlacement>> {
        disks
            .iter()
            .map(|disk| match self.pick_datastore(cluster, disk) {
                Some(ds) => Some(DiskPlacement {
                    disk: disk.clone(),
                    datastore: ds.name.clone(),
                }),
                None => {
                    debug!(
                        cluster = cluster.name(),
                        disk_size = disk.size(),
                        existing_datastore = ?disk.existing_datastore_name(),
                        pattern = disk.target_datastore_pattern().as_str(),
                        "No datastore fits disk"
                    );
                    None
                }
            })
            .collect()
    }
}

impl ClusterPicker for CapacityPicker {
    fn update(&mut self, clusters: Vec<Arc<Cluster>>) {
        debug!(candidates = clusters.len(), "Updating candidate clusters");
        self.clusters = clusters;
    }

    fn best_cluster_placement(
        &self,
        req_memory: u64,
        disk_configurations: &[DiskConfig],
    ) -> CloudResult<ClusterPlacement> {
        let mut best: Option<(&Cluster, Vec<DiskPlacement>)> = None;

        for cluster in self.clusters.iter().map(Arc::as_ref) {
            if cluster.free_memory().saturating_sub(self.mem_headroom) < req_memory {
                debug!(
                    cluster = cluster.name(),
                    free_memory = cluster.free_memory(),
                    req_memory,
                    "Not enough free memory"
                );
                continue;
            }

            let Some(disks) = self.place_disks(cluster, disk_configurations) else {
                continue;
            };

            let better = match &best {
                None => true,
                Some((current, _)) => {
                    (cluster.free_memory(), cluster.total_free_space())
                        > (current.free_memory(), current.total_free_space())
                }
            };
            if better {
                best = Some((cluster, disks));
            }
        }

        let (cluster, disks) = best.ok_or_else(|| CloudError::NoPlacement {
            req_memory,
            disk_sizes: disk_configurations.iter().map(DiskConfig::size).collect(),
        })?;

        info!(
            cluster = cluster.name(),
            req_memory,
            disks = disks.len(),
            "Selected cluster for placement"
        );

        Ok(ClusterPlacement {
            cluster_name: cluster.name().to_string(),
            disks,
        })
    }
}
