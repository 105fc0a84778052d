use regex::Regex;
use serde::Deserialize;

use crate::errors::{CloudError, CloudResult};

pub const MATCH_ALL_PATTERN: &str = ".*";

/// A request to place one disk of the VM.
///
/// The target pattern is compiled once here so a bad pattern is reported
/// before any placement work starts.
#[derive(Debug, Clone)]
pub struct DiskConfig {
    cid: Option<String>,
    size: u64, // MB
    ephemeral: bool,
    existing_datastore_name: Option<String>,
    target_datastore_pattern: Regex,
}

impl DiskConfig {
    /// The VM's ephemeral disk, eligible for any datastore matching `pattern`.
    pub fn ephemeral(size: u64, pattern: &str) -> CloudResult<Self> {
        Self::build(None, size, true, None, pattern)
    }

    /// A persistent disk that has not been placed yet.
    pub fn persistent(cid: impl Into<String>, size: u64, pattern: &str) -> CloudResult<Self> {
        Self::build(Some(cid.into()), size, false, None, pattern)
    }

    /// A persistent disk that already lives on `datastore_name`. Any target
    /// pattern is irrelevant for it.
    pub fn existing(
        cid: impl Into<String>,
        size: u64,
        datastore_name: impl Into<String>,
    ) -> CloudResult<Self> {
        Self::build(
            Some(cid.into()),
            size,
            false,
            Some(datastore_name.into()),
            MATCH_ALL_PATTERN,
        )
    }

    fn build(
        cid: Option<String>,
        size: u64,
        ephemeral: bool,
        existing_datastore_name: Option<String>,
        pattern: &str,
    ) -> CloudResult<Self> {
        if size == 0 {
            return Err(CloudError::InvalidDiskSize { cid });
        }
        let target_datastore_pattern =
            Regex::new(pattern).map_err(|source| CloudError::InvalidDatastorePattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            cid,
            size,
            ephemeral,
            existing_datastore_name,
            target_datastore_pattern,
        })
    }

    pub fn cid(&self) -> Option<&str> {
        self.cid.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub fn existing_datastore_name(&self) -> Option<&str> {
        self.existing_datastore_name.as_deref()
    }

    pub fn target_datastore_pattern(&self) -> &Regex {
        &self.target_datastore_pattern
    }

    /// Whether `datastore_name` is eligible by name for this disk.
    pub fn accepts_datastore(&self, datastore_name: &str) -> bool {
        match &self.existing_datastore_name {
            Some(existing) => existing == datastore_name,
            None => self.target_datastore_pattern.is_match(datastore_name),
        }
    }
}

impl PartialEq for DiskConfig {
    fn eq(&self, other: &Self) -> bool {
        self.cid == other.cid
            && self.size == other.size
            && self.ephemeral == other.ephemeral
            && self.existing_datastore_name == other.existing_datastore_name
            && self.target_datastore_pattern.as_str() == other.target_datastore_pattern.as_str()
    }
}

impl Eq for DiskConfig {}

// Manifest shape of a disk request
#[derive(Debug, Deserialize)]
struct DiskConfigSpec {
    cid: Option<String>,
    size: u64,
    #[serde(default)]
    ephemeral: bool,
    existing_datastore_name: Option<String>,
    target_datastore_pattern: Option<String>,
}

impl TryFrom<DiskConfigSpec> for DiskConfig {
    type Error = CloudError;

    fn try_from(spec: DiskConfigSpec) -> CloudResult<Self> {
        let pattern = spec
            .target_datastore_pattern
            .as_deref()
            .unwrap_or(MATCH_ALL_PATTERN);
        DiskConfig::build(
            spec.cid,
            spec.size,
            spec.ephemeral,
            spec.existing_datastore_name,
            pattern,
        )
    }
}

impl<'de> Deserialize<'de> for DiskConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let spec = DiskConfigSpec::deserialize(deserializer)?;
        DiskConfig::try_from(spec).map_err(serde::de::Error::custom)
    }
}
