//! Configuration values threaded through the pipeline.
//!
//! [`AutomationConfig`] is the repository-wide configuration (naming rules,
//! tool commands, registry). [`RunOptions`] carries what the caller asked for
//! on the command line or in a batch record. [`GenerationConfig`] is the
//! immutable per-package combination of both; it is built fresh for every
//! spec pointer so no package can leak its suffix or namespace into the next.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AutomationError, Result};
use crate::model::{Coordinate, Module, ModuleKind};
use crate::registry::MAVEN_CENTRAL;
use crate::version::DEFAULT_NEW_VERSION;

const RAW_GITHUB_CONTENT: &str = "https://raw.githubusercontent.com";

const DEFAULT_PREMIUM_MODULES: &[&str] = &[
    "azure-resourcemanager-appplatform",
    "azure-resourcemanager-appservice",
    "azure-resourcemanager-authorization",
    "azure-resourcemanager-cdn",
    "azure-resourcemanager-compute",
    "azure-resourcemanager-containerinstance",
    "azure-resourcemanager-containerregistry",
    "azure-resourcemanager-containerservice",
    "azure-resourcemanager-cosmos",
    "azure-resourcemanager-dns",
    "azure-resourcemanager-eventhubs",
    "azure-resourcemanager-keyvault",
    "azure-resourcemanager-monitor",
    "azure-resourcemanager-msi",
    "azure-resourcemanager-network",
    "azure-resourcemanager-privatedns",
    "azure-resourcemanager-redis",
    "azure-resourcemanager-resources",
    "azure-resourcemanager-search",
    "azure-resourcemanager-servicebus",
    "azure-resourcemanager-sql",
    "azure-resourcemanager-storage",
    "azure-resourcemanager-trafficmanager",
];

/// External programs the pipeline composes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub git: String,
    pub autorest: String,
    pub autorest_core_version: String,
    pub autorest_java: String,
    pub tsp_client: String,
    pub build_tool: String,
    /// Breaking-change detector; `-DOLD_JAR=`/`-DNEW_JAR=` properties are appended.
    pub changelog_program: String,
    pub changelog_args: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".into(),
            autorest: "autorest".into(),
            autorest_core_version: "3.10.2".into(),
            autorest_java: "@autorest/java@4.1.42".into(),
            tsp_client: "tsp-client".into(),
            build_tool: "mvn".into(),
            changelog_program: "mvn".into(),
            changelog_args: vec![
                "--no-transfer-progress".into(),
                "clean".into(),
                "compile".into(),
                "exec:java".into(),
                "-q".into(),
                "-f".into(),
                "eng/automation/changelog/pom.xml".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub sdk_root: PathBuf,
    pub management_group: String,
    pub management_artifact_prefix: String,
    pub management_namespace_prefix: String,
    pub data_plane_group: String,
    pub data_plane_namespace_prefix: String,
    pub registry_url: String,
    /// Raw file root for specs pinned on GitHub; a directory also works.
    pub raw_content_root: String,
    pub premium_modules: Vec<String>,
    pub umbrella_service: String,
    pub umbrella_module: String,
    pub default_resources_tag: String,
    pub default_version: String,
    pub services_config: PathBuf,
    pub version_file: PathBuf,
    pub external_dependencies_file: PathBuf,
    pub tools: ToolsConfig,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            sdk_root: PathBuf::from("."),
            management_group: "com.azure.resourcemanager".into(),
            management_artifact_prefix: "azure-resourcemanager".into(),
            management_namespace_prefix: "com.azure.resourcemanager".into(),
            data_plane_group: "com.azure".into(),
            data_plane_namespace_prefix: "com".into(),
            registry_url: MAVEN_CENTRAL.into(),
            raw_content_root: RAW_GITHUB_CONTENT.into(),
            premium_modules: DEFAULT_PREMIUM_MODULES.iter().map(|s| s.to_string()).collect(),
            umbrella_service: "resourcemanager".into(),
            umbrella_module: "azure-resourcemanager".into(),
            default_resources_tag: "package-resources-2022-09".into(),
            default_version: DEFAULT_NEW_VERSION.into(),
            services_config: PathBuf::from("eng/automation/api-specs.yaml"),
            version_file: PathBuf::from("eng/versioning/version_client.txt"),
            external_dependencies_file: PathBuf::from("eng/versioning/external_dependencies.txt"),
            tools: ToolsConfig::default(),
        }
    }
}

impl AutomationConfig {
    pub fn trace_loaded(&self) {
        info!(
            sdk_root = %self.sdk_root.display(),
            registry_url = %self.registry_url,
            premium_count = self.premium_modules.len(),
            "Loaded AutomationConfig"
        );
        debug!(?self, "AutomationConfig loaded (full debug)");
    }

    pub fn version_file_path(&self) -> PathBuf {
        self.sdk_root.join(&self.version_file)
    }

    pub fn external_dependencies_path(&self) -> PathBuf {
        self.sdk_root.join(&self.external_dependencies_file)
    }

    pub fn is_premium(&self, artifact: &str) -> bool {
        self.premium_modules.iter().any(|m| m == artifact)
    }

    /// `sdk/<umbrella-service>/<umbrella-module>`, relative to the sdk root.
    pub fn umbrella_relative_path(&self) -> PathBuf {
        Path::new("sdk")
            .join(&self.umbrella_service)
            .join(&self.umbrella_module)
    }

    /// Loads the services override file; absent file means no overrides.
    pub fn load_services(&self) -> Result<ServicesConfig> {
        ServicesConfig::load(self.sdk_root.join(&self.services_config))
    }
}

/// Per-spec overrides, keyed by the spec slug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceOverride {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ServicesConfig {
    entries: BTreeMap<String, ServiceOverride>,
}

impl ServicesConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Services config absent, no overrides");
                return Ok(Self::default());
            }
            Err(e) => return Err(AutomationError::io(path, e)),
        };
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: Option<BTreeMap<String, ServiceOverride>> = serde_yaml::from_str(content)?;
        Ok(Self {
            entries: entries.unwrap_or_default(),
        })
    }

    pub fn get(&self, spec_slug: &str) -> Option<&ServiceOverride> {
        self.entries.get(spec_slug)
    }
}

/// Strips everything outside `[a-z0-9_]` after lower-casing.
pub fn normalize_slug(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// What the caller asked for, before any per-spec resolution.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub preview: bool,
    pub version: Option<String>,
    pub service: Option<String>,
    pub suffix: Option<String>,
    pub tag: Option<String>,
    pub spec_root: Option<String>,
    pub autorest: Option<String>,
    pub use_plugin: Option<String>,
    pub autorest_options: Option<String>,
}

/// Immutable per-package configuration.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub automation: AutomationConfig,
    pub options: RunOptions,
    pub service: String,
    pub suffix: Option<String>,
}

impl GenerationConfig {
    /// Resolves the service slug and suffix for one spec: explicit options
    /// win over the services config, which wins over the spec slug itself.
    pub fn resolve(
        automation: &AutomationConfig,
        options: &RunOptions,
        services: &ServicesConfig,
        spec_slug: &str,
    ) -> Self {
        let spec_slug = normalize_slug(spec_slug);
        let overrides = services.get(&spec_slug).cloned().unwrap_or_default();
        let service = options
            .service
            .clone()
            .or(overrides.service)
            .map(|s| normalize_slug(&s))
            .unwrap_or(spec_slug);
        let suffix = options
            .suffix
            .clone()
            .or(overrides.suffix)
            .filter(|s| !s.is_empty());
        debug!(service = %service, suffix = ?suffix, "Resolved generation config");
        Self {
            automation: automation.clone(),
            options: options.clone(),
            service,
            suffix,
        }
    }

    pub fn sdk_root(&self) -> &Path {
        &self.automation.sdk_root
    }

    /// `<prefix>-<service>[-<suffix>]`
    pub fn management_artifact(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!(
                "{}-{}-{suffix}",
                self.automation.management_artifact_prefix, self.service
            ),
            None => format!("{}-{}", self.automation.management_artifact_prefix, self.service),
        }
    }

    /// `<prefix-namespace>.<service>[.<suffix>]`
    pub fn management_namespace(&self) -> String {
        match &self.suffix {
            Some(suffix) => format!(
                "{}.{}.{suffix}",
                self.automation.management_namespace_prefix, self.service
            ),
            None => format!("{}.{}", self.automation.management_namespace_prefix, self.service),
        }
    }

    pub fn management_module(&self) -> Module {
        let artifact = self.management_artifact();
        let kind = if self.automation.is_premium(&artifact) {
            ModuleKind::ManagementPremium
        } else {
            ModuleKind::ManagementStandard
        };
        Module {
            service: self.service.clone(),
            coordinate: Coordinate::new(&self.automation.management_group, artifact),
            namespace: self.management_namespace(),
            kind,
        }
    }

    /// Module for a package directory named by a tspconfig (`azure-…`).
    pub fn module_for_package(&self, service: &str, artifact: &str, data_plane: bool) -> Module {
        if data_plane {
            let namespace = std::iter::once(self.automation.data_plane_namespace_prefix.as_str())
                .chain(artifact.split('-'))
                .collect::<Vec<_>>()
                .join(".");
            Module {
                service: service.to_string(),
                coordinate: Coordinate::new(&self.automation.data_plane_group, artifact),
                namespace,
                kind: ModuleKind::DataPlane,
            }
        } else {
            let tail = artifact
                .strip_prefix(&format!("{}-", self.automation.management_artifact_prefix))
                .unwrap_or(artifact);
            let kind = if self.automation.is_premium(artifact) {
                ModuleKind::ManagementPremium
            } else {
                ModuleKind::ManagementStandard
            };
            Module {
                service: service.to_string(),
                coordinate: Coordinate::new(&self.automation.management_group, artifact),
                namespace: format!(
                    "{}.{}",
                    self.automation.management_namespace_prefix,
                    tail.replace('-', ".")
                ),
                kind,
            }
        }
    }
}
