use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::manifest::ManifestParams;
use crate::cluster::{ClusterConfig, ClusterProvider, DrsRule};
use crate::errors::{CloudError, CloudResult};
use crate::resources::{Cluster, DiskConfig};
use crate::scheduler::{ClusterPicker, DiskPlacement};
use crate::with_context;

pub type SharedPicker = Arc<Mutex<dyn ClusterPicker>>;
pub type SharedProvider = Arc<dyn ClusterProvider>;

/// Hypervisor config spec fields derived from the vm_type. Unset fields are
/// left out of the spec entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigSpecParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_cpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_hv_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_hot_add_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_hot_add_enabled: Option<bool>,
}

/// The resolved decision for one VM: its cluster and a datastore per disk.
#[derive(Debug, Clone)]
pub struct Placement {
    cluster: Arc<Cluster>,
    cluster_config: Option<ClusterConfig>,
    disks: Vec<DiskPlacement>,
}

impl Placement {
    pub fn cluster(&self) -> &Arc<Cluster> {
        &self.cluster
    }

    /// The vm_type declaration of the winning cluster, if clusters were declared.
    pub fn cluster_config(&self) -> Option<&ClusterConfig> {
        self.cluster_config.as_ref()
    }

    pub fn disk_placements(&self) -> &[DiskPlacement] {
        &self.disks
    }

    pub fn ephemeral_datastore_name(&self) -> Option<&str> {
        self.disks
            .iter()
            .find(|p| p.disk.is_ephemeral())
            .map(|p| p.datastore.as_str())
    }
}

/// Per-request view over the manifest. Placement is resolved lazily, at most
/// once, and shared by every accessor that needs it.
pub struct VmConfig {
    name: String,
    manifest: ManifestParams,
    cluster_picker: SharedPicker,
    cluster_provider: Option<SharedProvider>,
    placement: Mutex<Option<Arc<Placement>>>,
}

impl VmConfig {
    pub fn new(
        manifest: ManifestParams,
        cluster_picker: SharedPicker,
        cluster_provider: Option<SharedProvider>,
    ) -> Self {
        Self {
            name: format!("vm-{}", Uuid::new_v4()),
            manifest,
            cluster_picker,
            cluster_provider,
            placement: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stemcell_cid(&self) -> Option<&str> {
        self.manifest.stemcell.as_ref()?.cid.as_deref()
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.manifest.agent_id.as_deref()
    }

    pub fn agent_env(&self) -> &Map<String, Value> {
        &self.manifest.agent_env
    }

    pub fn networks_spec(&self) -> &Map<String, Value> {
        &self.manifest.networks_spec
    }

    pub fn ephemeral_disk_size(&self) -> Option<u64> {
        self.manifest.vm_type.disk
    }

    pub fn disk_configurations(&self) -> &[DiskConfig] {
        &self.manifest.disk_configurations
    }

    /// Underlying network name to the IPs requested on it. NICs without a
    /// network name in their cloud properties are skipped.
    pub fn vsphere_networks(&self) -> BTreeMap<String, Vec<String>> {
        let mut networks: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for spec in self.manifest.networks_spec.values() {
            let network_name = spec
                .get("cloud_properties")
                .and_then(|props| props.get("name"))
                .and_then(Value::as_str)
                .filter(|name| !name.is_empty());
            let Some(network_name) = network_name else {
                continue;
            };

            let ips = networks.entry(network_name.to_string()).or_default();
            if let Some(ip) = spec.get("ip").and_then(Value::as_str) {
                ips.push(ip.to_string());
            }
        }

        networks
    }

    pub fn config_spec_params(&self) -> ConfigSpecParams {
        let vm_type = &self.manifest.vm_type;
        let enabled = |flag: Option<bool>| flag.filter(|on| *on);

        ConfigSpecParams {
            num_cpus: vm_type.cpu,
            memory_mb: vm_type.ram,
            nested_hv_enabled: enabled(vm_type.nested_hardware_virtualization),
            cpu_hot_add_enabled: enabled(vm_type.cpu_hot_add_enabled),
            memory_hot_add_enabled: enabled(vm_type.memory_hot_add_enabled),
        }
    }

    pub fn cluster(&self) -> CloudResult<Arc<Cluster>> {
        Ok(self.placement()?.cluster.clone())
    }

    /// Datastore chosen for the ephemeral disk, `None` when no disk is ephemeral.
    pub fn ephemeral_datastore_name(&self) -> CloudResult<Option<String>> {
        Ok(self.placement()?.ephemeral_datastore_name().map(str::to_string))
    }

    pub fn drs_rule(&self) -> CloudResult<Option<DrsRule>> {
        let placement = self.placement()?;
        Ok(placement
            .cluster_config()
            .and_then(ClusterConfig::drs_rule)
            .cloned())
    }

    /// Checks the DRS rules declared for the winning cluster. Without declared
    /// clusters there is nothing to check and no placement is resolved.
    pub fn validate(&self) -> CloudResult<()> {
        if !self.manifest.vm_type.has_declared_clusters() {
            return Ok(());
        }

        match self.placement()?.cluster_config() {
            Some(config) => config.validate_drs_rules(),
            None => Ok(()),
        }
    }

    /// Resolves the placement on first use. Only a successful result is kept,
    /// so a failed attempt can be retried on the same instance.
    pub fn placement(&self) -> CloudResult<Arc<Placement>> {
        let mut cached = self.placement.lock();
        if let Some(placement) = cached.as_ref() {
            return Ok(placement.clone());
        }

        let placement = Arc::new(with_context!(
            self.resolve_placement(),
            "resolve placement",
            Some(&self.name)
        )?);
        *cached = Some(placement.clone());
        Ok(placement)
    }

    fn candidate_clusters(&self) -> CloudResult<Vec<Arc<Cluster>>> {
        let vm_type = &self.manifest.vm_type;
        if !vm_type.has_declared_clusters() {
            return Ok(self.manifest.global_clusters.clone());
        }

        let provider = self
            .cluster_provider
            .as_ref()
            .ok_or(CloudError::MissingClusterProvider)?;
        vm_type
            .declared_clusters()
            .map(|config| {
                debug!(vm = %self.name, cluster = config.name(), "Resolving declared cluster");
                provider.find(config.name(), config)
            })
            .collect()
    }

    fn resolve_placement(&self) -> CloudResult<Placement> {
        let candidates = self.candidate_clusters()?;
        if candidates.is_empty() {
            return Err(CloudError::NoValidClusters);
        }
        let req_memory = self.manifest.vm_type.ram.ok_or(CloudError::MissingRam)?;
        let disks = &self.manifest.disk_configurations;

        let placement = {
            let mut picker = self.cluster_picker.lock();
            picker.update(candidates.clone());
            picker.best_cluster_placement(req_memory, disks)?
        };

        let cluster = candidates
            .into_iter()
            .find(|c| c.name() == placement.cluster_name)
            .ok_or_else(|| CloudError::NoPlacement {
                req_memory,
                disk_sizes: disks.iter().map(DiskConfig::size).collect(),
            })?;
        let cluster_config = self
            .manifest
            .vm_type
            .declared_clusters()
            .find(|config| config.name() == placement.cluster_name)
            .cloned();

        info!(
            vm = %self.name,
            cluster = %placement.cluster_name,
            ephemeral_datastore = ?placement.ephemeral_datastore_name(),
            "Resolved VM placement"
        );

        Ok(Placement {
            cluster,
            cluster_config,
            disks: placement.disks,
        })
    }
}
