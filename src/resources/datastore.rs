use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a storage pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Datastore {
    pub name: String,
    pub free_space: u64, // MB
}

impl Datastore {
    pub fn new(name: impl Into<String>, free_space: u64) -> Self {
        Self {
            name: name.into(),
            free_space,
        }
    }
}
