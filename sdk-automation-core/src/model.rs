use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// `group:artifact` pair identifying a library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
}

impl Coordinate {
    pub fn new(group: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
        }
    }

    /// Parses `group:artifact`. Anything else yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let (group, artifact) = text.split_once(':')?;
        if group.is_empty() || artifact.is_empty() || artifact.contains(':') {
            return None;
        }
        Some(Self::new(group, artifact))
    }

    /// Group with dots turned into path separators, as laid out in a Maven registry.
    pub fn group_path(&self) -> String {
        self.group.replace('.', "/")
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.artifact)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    ManagementStandard,
    ManagementPremium,
    DataPlane,
}

impl ModuleKind {
    pub fn is_management(self) -> bool {
        matches!(
            self,
            ModuleKind::ManagementStandard | ModuleKind::ManagementPremium
        )
    }
}

/// A generated library inside the monorepo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub service: String,
    pub coordinate: Coordinate,
    pub namespace: String,
    pub kind: ModuleKind,
}

impl Module {
    pub fn artifact(&self) -> &str {
        &self.coordinate.artifact
    }

    /// `sdk/<service>`, relative to the sdk root.
    pub fn service_dir(&self) -> PathBuf {
        Path::new("sdk").join(&self.service)
    }

    /// `sdk/<service>/<artifact>`, relative to the sdk root.
    pub fn relative_path(&self) -> PathBuf {
        self.service_dir().join(&self.coordinate.artifact)
    }

    pub fn path_in(&self, sdk_root: &Path) -> PathBuf {
        sdk_root.join(self.relative_path())
    }

    /// Namespace as a relative directory (`com/azure/...`).
    pub fn package_path(&self) -> PathBuf {
        self.namespace.split('.').collect()
    }

    pub fn is_premium(&self) -> bool {
        self.kind == ModuleKind::ManagementPremium
    }
}
