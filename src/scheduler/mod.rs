pub mod picker;

pub use picker::{CapacityPicker, ClusterPicker, ClusterPlacement, DiskPlacement};
