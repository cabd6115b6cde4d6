//! Per-package records written to the batch output file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{AutomationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageResult {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangelogRecord {
    pub content: String,
    pub has_breaking_change: bool,
    pub breaking_change_items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub package_name: String,
    pub path: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub package_folder: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readme_md: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub typespec_project: Vec<String>,
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_view_artifact: Option<String>,
    pub language: String,
    pub result: PackageResult,
    pub changelog: ChangelogRecord,
}

impl PackageRecord {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            path: Vec::new(),
            package_folder: String::new(),
            readme_md: Vec::new(),
            typespec_project: Vec::new(),
            artifacts: Vec::new(),
            api_view_artifact: None,
            language: "Java".into(),
            result: PackageResult::Failed,
            changelog: ChangelogRecord::default(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.result == PackageResult::Succeeded
    }
}

pub fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub packages: Vec<PackageRecord>,
}

impl Report {
    /// Non-zero only when the run covered exactly one package and it failed.
    pub fn exit_code(&self) -> i32 {
        match self.packages.as_slice() {
            [only] if !only.succeeded() => 1,
            _ => 0,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AutomationError::io(parent, e))?;
        }
        fs::write(path, json).map_err(|e| AutomationError::io(path, e))?;
        info!(
            path = %path.display(),
            packages = self.packages.len(),
            "[REPORT] Output written"
        );
        Ok(())
    }
}
