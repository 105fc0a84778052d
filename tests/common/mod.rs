#![allow(dead_code)]

use cpi_placement::cluster::{ClusterConfig, ClusterProvider, Inventory, StaticInventory};
use cpi_placement::errors::{CloudError, CloudResult};
use cpi_placement::resources::{Cluster, Datastore, DiskConfig};
use cpi_placement::scheduler::{CapacityPicker, ClusterPicker, ClusterPlacement};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn cluster(name: &str, free_memory: u64, datastores: &[(&str, u64)]) -> Arc<Cluster> {
    Arc::new(Cluster::new(
        name,
        free_memory,
        datastores.iter().map(|(ds, free)| Datastore::new(*ds, *free)),
    ))
}

pub fn ephemeral(size: u64, pattern: &str) -> DiskConfig {
    DiskConfig::ephemeral(size, pattern).unwrap()
}

pub fn names(clusters: &[Arc<Cluster>]) -> Vec<String> {
    clusters.iter().map(|c| c.name().to_string()).collect()
}

/// Real picker that records what it was asked.
pub struct CountingPicker {
    inner: CapacityPicker,
    pub updates: Vec<Vec<String>>,
    pub placements: AtomicUsize,
}

impl CountingPicker {
    pub fn new() -> Self {
        Self {
            inner: CapacityPicker::new(0, 0),
            updates: Vec::new(),
            placements: AtomicUsize::new(0),
        }
    }

    pub fn shared() -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn placement_calls(&self) -> usize {
        self.placements.load(Ordering::SeqCst)
    }
}

impl ClusterPicker for CountingPicker {
    fn update(&mut self, clusters: Vec<Arc<Cluster>>) {
        self.updates.push(names(&clusters));
        self.inner.update(clusters);
    }

    fn best_cluster_placement(
        &self,
        req_memory: u64,
        disk_configurations: &[DiskConfig],
    ) -> CloudResult<ClusterPlacement> {
        self.placements.fetch_add(1, Ordering::SeqCst);
        self.inner.best_cluster_placement(req_memory, disk_configurations)
    }
}

/// Picker that always names `winner`, after failing `failures` times.
pub struct ScriptedPicker {
    winner: String,
    failures: AtomicUsize,
    pub updates: Vec<Vec<String>>,
    pub requested_memory: Mutex<Vec<u64>>,
    pub placements: AtomicUsize,
}

impl ScriptedPicker {
    pub fn new(winner: &str) -> Self {
        Self {
            winner: winner.to_string(),
            failures: AtomicUsize::new(0),
            updates: Vec::new(),
            requested_memory: Mutex::new(Vec::new()),
            placements: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(winner: &str, failures: usize) -> Self {
        let picker = Self::new(winner);
        picker.failures.store(failures, Ordering::SeqCst);
        picker
    }

    pub fn placement_calls(&self) -> usize {
        self.placements.load(Ordering::SeqCst)
    }
}

impl ClusterPicker for ScriptedPicker {
    fn update(&mut self, clusters: Vec<Arc<Cluster>>) {
        self.updates.push(names(&clusters));
    }

    fn best_cluster_placement(
        &self,
        req_memory: u64,
        disk_configurations: &[DiskConfig],
    ) -> CloudResult<ClusterPlacement> {
        self.placements.fetch_add(1, Ordering::SeqCst);
        self.requested_memory.lock().push(req_memory);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CloudError::NoPlacement {
                req_memory,
                disk_sizes: disk_configurations.iter().map(DiskConfig::size).collect(),
            });
        }
        Ok(ClusterPlacement {
            cluster_name: self.winner.clone(),
            disks: Vec::new(),
        })
    }
}

/// Provider answering from a fixed map and recording every lookup.
pub struct RecordingProvider {
    clusters: HashMap<String, Arc<Cluster>>,
    pub lookups: Mutex<Vec<(String, ClusterConfig)>>,
}

impl RecordingProvider {
    pub fn new(clusters: &[Arc<Cluster>]) -> Self {
        Self {
            clusters: clusters
                .iter()
                .map(|c| (c.name().to_string(), c.clone()))
                .collect(),
            lookups: Mutex::new(Vec::new()),
        }
    }

    pub fn looked_up(&self) -> Vec<String> {
        self.lookups.lock().iter().map(|(name, _)| name.clone()).collect()
    }
}

impl ClusterProvider for RecordingProvider {
    fn find(&self, name: &str, config: &ClusterConfig) -> CloudResult<Arc<Cluster>> {
        self.lookups.lock().push((name.to_string(), config.clone()));
        self.clusters
            .get(name)
            .cloned()
            .ok_or_else(|| CloudError::ClusterNotFound {
                name: name.to_string(),
            })
    }
}

/// Inventory that counts lookups, can be slow, and can fail its first lookups.
pub struct CountingInventory {
    inner: StaticInventory,
    delay: Duration,
    failures: AtomicUsize,
    pub lookups: AtomicUsize,
}

impl CountingInventory {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        Self {
            inner: StaticInventory::new(clusters),
            delay: Duration::ZERO,
            failures: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Inventory for CountingInventory {
    fn lookup_cluster(&self, name: &str, config: &ClusterConfig) -> CloudResult<Cluster> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(CloudError::ClusterNotFound {
                name: name.to_string(),
            });
        }
        self.inner.lookup_cluster(name, config)
    }
}
