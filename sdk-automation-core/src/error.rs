//! Error kinds shared by every stage of the generation pipeline.
//!
//! Each per-module failure is caught at the orchestrator boundary and turned
//! into a `failed` package record; only [`AutomationError::InvalidParameters`]
//! aborts a whole batch.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AutomationError>;

#[derive(Debug, Error)]
pub enum AutomationError {
    /// Spec pointer shape or tspconfig options are not acceptable.
    #[error("Invalid spec: {reason}")]
    BadSpec { reason: String },

    #[error("Code generator failed for {target}: {detail}")]
    GeneratorFailed { target: String, detail: String },

    #[error(
        "Build failed for {coordinate}. This may be caused by existing customization code \
         that is incompatible with the regenerated code: {detail}"
    )]
    BuildFailed { coordinate: String, detail: String },

    #[error("{coordinate}:{version} not found in registry ({status})")]
    RegistryNotFound {
        coordinate: String,
        version: String,
        status: u16,
    },

    #[error("Built artifact missing at {}", path.display())]
    ArtifactMissing { path: PathBuf },

    /// A build or CI file does not have the structure the integrator edits.
    #[error("Unexpected layout in {}: {reason}", path.display())]
    ManifestLayout { path: PathBuf, reason: String },

    #[error("Changelog {} has fewer than two version sections", path.display())]
    ChangelogUnparseable { path: PathBuf },

    #[error("Malformed version '{value}': {reason}")]
    VersionMalformed { value: String, reason: String },

    /// Self-serve parameter validation failure; aborts the batch.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Failed to run '{program}': {detail}")]
    Subprocess { program: String, detail: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AutomationError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AutomationError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn manifest_layout(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AutomationError::ManifestLayout {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn bad_spec(reason: impl Into<String>) -> Self {
        AutomationError::BadSpec {
            reason: reason.into(),
        }
    }
}
