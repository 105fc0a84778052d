pub mod cluster_config;
pub mod inventory;
pub mod provider;

pub use cluster_config::{ClusterConfig, DrsRule, SEPARATE_VMS};
pub use inventory::{Inventory, StaticInventory};
pub use provider::{CachingClusterProvider, ClusterProvider};
