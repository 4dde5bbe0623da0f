use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Category, RiskLevel};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: Category,
    pub resource: String,
    pub risk: RiskLevel,
    #[serde(rename = "type")]
    pub finding_type: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub detail: BTreeMap<String, String>,
}

impl Finding {
    pub fn new(
        category: Category,
        resource: impl Into<String>,
        risk: RiskLevel,
        finding_type: impl Into<String>,
    ) -> Self {
        Self {
            category,
            resource: resource.into(),
            risk,
            finding_type: finding_type.into(),
            detail: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}
