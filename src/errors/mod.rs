use thiserror::Error;

/// Errors surfaced by the placement engine.
///
/// The `Display` text of the configuration variants is matched by the
/// orchestrator adapter, so it must stay stable.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("No valid clusters were provided")]
    NoValidClusters,

    #[error("Must specify vm_types.cloud_properties.ram")]
    MissingRam,

    #[error("vSphere CPI supports only one DRS rule per resource pool")]
    TooManyDrsRules {
        cluster: String,
        count: usize,
    },

    #[error("vSphere CPI only supports DRS rule of 'separate_vms' type")]
    UnsupportedDrsRuleType {
        cluster: String,
        rule_type: String,
    },

    #[error("No valid placement found for requested memory: {req_memory} and disks: {disk_sizes:?}")]
    NoPlacement {
        req_memory: u64,
        disk_sizes: Vec<u64>,
    },

    #[error("Cluster not found: {name}")]
    ClusterNotFound {
        name: String,
    },

    #[error("Invalid target datastore pattern '{pattern}': {source}")]
    InvalidDatastorePattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Disk size must be greater than zero (cid: {cid:?})")]
    InvalidDiskSize {
        cid: Option<String>,
    },

    #[error("Clusters are declared in vm_type but no cluster provider is configured")]
    MissingClusterProvider,

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),
}

impl CloudError {
    /// User-fixable input problems. Lookup failures belong to the inventory
    /// client and are reported as they are.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, CloudError::ClusterNotFound { .. })
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::InvalidManifest(err.to_string())
    }
}

// Error context for tracking failed operations
#[derive(Debug)]
pub struct ErrorContext {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub source_location: &'static str,
    pub operation: String,
    pub vm_name: Option<String>,
}

pub type CloudResult<T> = Result<T, CloudError>;

/// Logs the error of a failed operation together with its context and hands
/// the result back untouched.
#[macro_export]
macro_rules! with_context {
    ($result:expr, $operation:expr) => {
        $crate::with_context!($result, $operation, None::<String>)
    };
    ($result:expr, $operation:expr, $vm_name:expr) => {
        $result.map_err(|e| {
            let context = $crate::errors::ErrorContext {
                timestamp: chrono::Utc::now(),
                source_location: std::file!(),
                operation: $operation.to_string(),
                vm_name: $vm_name.map(|n| n.to_string()),
            };
            tracing::error!(
                error = %e,
                context = ?context,
                "Operation failed"
            );
            e
        })
    };
}
