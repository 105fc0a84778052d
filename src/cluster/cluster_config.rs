use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CloudError, CloudResult};

/// The only DRS rule type the CPI knows how to apply.
pub const SEPARATE_VMS: &str = "separate_vms";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrsRule {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: String,
}

impl DrsRule {
    pub fn new(name: impl Into<String>, rule_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rule_type: rule_type.into(),
        }
    }
}

/// Cloud properties declared for one cluster inside a vm_type.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    name: String,
    properties: Map<String, Value>,
    drs_rules: Vec<DrsRule>,
}

impl ClusterConfig {
    pub fn new(name: impl Into<String>, properties: Map<String, Value>) -> CloudResult<Self> {
        let name = name.into();
        let drs_rules = match properties.get("drs_rules") {
            None | Some(Value::Null) => Vec::new(),
            Some(rules) => serde_json::from_value(rules.clone()).map_err(|e| {
                CloudError::InvalidManifest(format!("drs_rules of cluster '{}': {}", name, e))
            })?,
        };

        Ok(Self {
            name,
            properties,
            drs_rules,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn resource_pool(&self) -> Option<&str> {
        self.properties.get("resource_pool").and_then(Value::as_str)
    }

    pub fn drs_rules(&self) -> &[DrsRule] {
        &self.drs_rules
    }

    /// First declared rule. Once `validate_drs_rules` passes it is the only one.
    pub fn drs_rule(&self) -> Option<&DrsRule> {
        self.drs_rules.first()
    }

    pub fn validate_drs_rules(&self) -> CloudResult<()> {
        match self.drs_rules.as_slice() {
            [] => Ok(()),
            [rule] if rule.rule_type == SEPARATE_VMS => Ok(()),
            [rule] => Err(CloudError::UnsupportedDrsRuleType {
                cluster: self.name.clone(),
                rule_type: rule.rule_type.clone(),
            }),
            rules => Err(CloudError::TooManyDrsRules {
                cluster: self.name.clone(),
                count: rules.len(),
            }),
        }
    }
}
