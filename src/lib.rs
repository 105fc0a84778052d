pub mod cli;
pub mod cluster;
pub mod config;
pub mod core;
pub mod errors;
pub mod resources;
pub mod scheduler;

// Re-exports
pub use crate::cluster::{
    CachingClusterProvider, ClusterConfig, ClusterProvider, DrsRule, StaticInventory,
};
pub use crate::core::{ManifestParams, VmConfig};
pub use crate::errors::{CloudError, CloudResult};
pub use crate::resources::{Cluster, Datastore, DiskConfig};
pub use crate::scheduler::{CapacityPicker, ClusterPicker, ClusterPlacement};
