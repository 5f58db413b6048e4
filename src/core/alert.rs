use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::RiskLevel;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Instance {
    pub fn new(uri: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            method: method.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(rename = "pluginid")]
    pub rule_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "riskcode", default)]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(
        default,
        deserialize_with = "crate::core::de::count",
        serialize_with = "crate::core::de::count_as_string"
    )]
    pub count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Alert {
    pub fn new(
        rule_id: impl Into<String>,
        name: impl Into<String>,
        risk_level: RiskLevel,
        instances: Vec<Instance>,
    ) -> Self {
        let count = instances.len() as u64;
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            risk_level,
            instances,
            count,
            extra: Map::new(),
        }
    }

    /// Restores `count == instances.len()` when instances are present and
    /// fills `name` from ZAP's legacy `alert` field.
    pub fn normalize(&mut self) {
        if !self.instances.is_empty() {
            self.count = self.instances.len() as u64;
        }
        if self.name.trim().is_empty() {
            if let Some(Value::String(legacy)) = self.extra.get("alert") {
                self.name = legacy.clone();
            }
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.rule_id
        } else {
            &self.name
        }
    }
}
