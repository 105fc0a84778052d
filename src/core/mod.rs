pub mod manifest;
pub mod vm;

pub use manifest::{DatacenterSpec, ManifestParams, StemcellSpec, VmType};
pub use vm::{ConfigSpecParams, Placement, SharedPicker, SharedProvider, VmConfig};
