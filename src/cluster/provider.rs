use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{ClusterConfig, Inventory};
use crate::errors::CloudResult;
use crate::resources::Cluster;

/// Resolves declared cluster names into capacity snapshots.
pub trait ClusterProvider: Send + Sync {
    fn find(&self, name: &str, config: &ClusterConfig) -> CloudResult<Arc<Cluster>>;
}

type Slot = Arc<Mutex<Option<Arc<Cluster>>>>;

/// Provider that asks the inventory at most once per cluster name.
///
/// The first successful lookup for a name wins for the lifetime of the
/// provider: later calls get the same `Arc` even when they pass a different
/// `ClusterConfig`. Concurrent first lookups of one name wait for the one in
/// flight. Failed lookups are not cached.
pub struct CachingClusterProvider<I: Inventory> {
    inventory: I,
    slots: Mutex<HashMap<String, Slot>>,
}

impl<I: Inventory> CachingClusterProvider<I> {
    pub fn new(inventory: I) -> Self {
        Self {
            inventory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    /// Names holding a cache entry, resolved or in flight.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    fn slot(&self, name: &str) -> Slot {
        let mut slots = self.slots.lock();
        slots.entry(name.to_string()).or_default().clone()
    }

    // Drops the entry of a failed lookup unless another caller is waiting on it.
    // New handles are only cloned under the map lock, so the count is stable here.
    fn forget(&self, name: &str, slot: &Slot) {
        let mut slots = self.slots.lock();
        let unshared = slots
            .get(name)
            .is_some_and(|entry| Arc::ptr_eq(entry, slot) && Arc::strong_count(slot) == 2);
        if unshared {
            slots.remove(name);
        }
    }
}

impl<I: Inventory> ClusterProvider for CachingClusterProvider<I> {
    fn find(&self, name: &str, config: &ClusterConfig) -> CloudResult<Arc<Cluster>> {
        let slot = self.slot(name);
        // Held across the lookup so racing callers for this name queue up here.
        let mut cached = slot.lock();
        if let Some(cluster) = cached.as_ref() {
            debug!(cluster = name, "Cluster served from cache");
            return Ok(cluster.clone());
        }

        debug!(cluster = name, "Resolving cluster from inventory");
        let cluster = match self.inventory.lookup_cluster(name, config) {
            Ok(cluster) => Arc::new(cluster),
            Err(err) => {
                drop(cached);
                self.forget(name, &slot);
                return Err(err);
            }
        };
        *cached = Some(cluster.clone());
        Ok(cluster)
    }
}
