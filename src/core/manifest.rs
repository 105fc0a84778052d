use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::cluster::ClusterConfig;
use crate::errors::CloudResult;
use crate::resources::{Cluster, DiskConfig};

/// Everything the orchestrator hands over for one create_vm call.
///
/// Absent keys fall back to empty values. `global_clusters` never comes from
/// the manifest itself; callers fill it from the inventory.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ManifestParams {
    pub stemcell: Option<StemcellSpec>,
    pub agent_id: Option<String>,
    pub agent_env: Map<String, Value>,
    pub networks_spec: Map<String, Value>,
    pub vm_type: VmType,
    pub disk_configurations: Vec<DiskConfig>,
    #[serde(skip)]
    pub global_clusters: Vec<Arc<Cluster>>,
}

impl ManifestParams {
    pub fn from_value(value: Value) -> CloudResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(json: &str) -> CloudResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_global_clusters(mut self, clusters: Vec<Arc<Cluster>>) -> Self {
        self.global_clusters = clusters;
        self
    }

    pub fn with_disk_configurations(mut self, disks: Vec<DiskConfig>) -> Self {
        self.disk_configurations = disks;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StemcellSpec {
    pub cid: Option<String>,
}

/// vm_type cloud properties
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct VmType {
    pub ram: Option<u64>,
    pub disk: Option<u64>,
    pub cpu: Option<u32>,
    pub nested_hardware_virtualization: Option<bool>,
    pub cpu_hot_add_enabled: Option<bool>,
    pub memory_hot_add_enabled: Option<bool>,
    pub datacenters: Vec<DatacenterSpec>,
}

impl VmType {
    /// Clusters declared under every datacenter, in declaration order.
    pub fn declared_clusters(&self) -> impl Iterator<Item = &ClusterConfig> {
        self.datacenters.iter().flat_map(|dc| dc.clusters.iter())
    }

    pub fn has_declared_clusters(&self) -> bool {
        self.declared_clusters().next().is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatacenterSpec {
    pub name: Option<String>,
    #[serde(deserialize_with = "deserialize_cluster_declarations")]
    pub clusters: Vec<ClusterConfig>,
}

// Each declaration is written as a single-key mapping `{cluster_name: properties}`.
fn deserialize_cluster_declarations<'de, D>(deserializer: D) -> Result<Vec<ClusterConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    let declarations = Option::<Vec<Map<String, Value>>>::deserialize(deserializer)?;

    declarations
        .unwrap_or_default()
        .into_iter()
        .map(|declaration| {
            if declaration.len() != 1 {
                return Err(D::Error::custom(format!(
                    "cluster declaration must name exactly one cluster, found {}",
                    declaration.len()
                )));
            }
            let (name, properties) = declaration
                .into_iter()
                .next()
                .ok_or_else(|| D::Error::custom("empty cluster declaration"))?;
            let properties = match properties {
                Value::Object(map) => map,
                Value::Null => Map::new(),
                other => {
                    return Err(D::Error::custom(format!(
                        "properties of cluster '{}' must be a mapping, got {}",
                        name, other
                    )))
                }
            };
            ClusterConfig::new(name, properties).map_err(D::Error::custom)
        })
        .collect()
}
