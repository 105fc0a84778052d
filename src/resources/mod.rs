pub mod cluster;
pub mod datastore;
pub mod disk;

pub use cluster::Cluster;
pub use datastore::Datastore;
pub use disk::DiskConfig;
