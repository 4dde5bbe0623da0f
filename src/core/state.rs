use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Category, Finding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Idle,
    Scanning,
    Completed,
    Error,
}

impl ScanStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Idle => "idle",
            ScanStatus::Scanning => "scanning",
            ScanStatus::Completed => "completed",
            ScanStatus::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryResult {
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CategoryResult {
    pub fn ok(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            findings: Vec::new(),
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanState {
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<String>,
    pub categories: BTreeMap<Category, CategoryResult>,
    pub total_issues: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            status: ScanStatus::Idle,
            last_scan: None,
            categories: BTreeMap::new(),
            total_issues: 0,
            last_error: None,
        }
    }

    pub fn recompute_total(&mut self) {
        self.total_issues = self
            .categories
            .values()
            .map(|r| r.findings.len() as u64)
            .sum();
    }

    pub fn summary(&self) -> ScanSummary {
        let mut counts = BTreeMap::new();
        let mut failed = Vec::new();
        for category in Category::ALL {
            let result = self.categories.get(&category);
            counts.insert(
                category,
                result.map(|r| r.findings.len() as u64).unwrap_or(0),
            );
            if result.is_some_and(|r| r.error.is_some()) {
                failed.push(category);
            }
        }
        ScanSummary {
            status: self.status,
            last_scan: self.last_scan.clone(),
            total_issues: self.total_issues,
            counts,
            failed,
        }
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub status: ScanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<String>,
    pub total_issues: u64,
    pub counts: BTreeMap<Category, u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    pub summary: ScanSummary,
    pub categories: BTreeMap<Category, CategoryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
