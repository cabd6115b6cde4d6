/// `load_config` module: reads the YAML automation config and applies
/// environment overrides on top of it.
///
/// This is the only place where user-supplied YAML is parsed into
/// [`AutomationConfig`]. Every field is optional in the file; anything
/// missing keeps its default.
///
/// # Environment
/// - `SDK_AUTOMATION_REGISTRY_URL` replaces `registry_url`.
/// - `SDK_AUTOMATION_SDK_ROOT` replaces `sdk_root`.
///
/// # Errors
/// Failures surface as `anyhow::Error` with the offending path in context.
use anyhow::{Context, Result};
use sdk_automation_core::config::AutomationConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const REGISTRY_URL_ENV: &str = "SDK_AUTOMATION_REGISTRY_URL";
pub const SDK_ROOT_ENV: &str = "SDK_AUTOMATION_SDK_ROOT";

/// Loads the config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AutomationConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref)
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to read config file"))
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;

    let mut config: AutomationConfig = if content.trim().is_empty() {
        AutomationConfig::default()
    } else {
        serde_yaml::from_str(&content)
            .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML"))
            .with_context(|| format!("Failed to parse config YAML {}", path_ref.display()))?
    };
    info!(config_path = ?path_ref, "Parsed config YAML successfully");

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Defaults plus environment overrides, for runs without `--config-file`.
pub fn default_config() -> AutomationConfig {
    let mut config = AutomationConfig::default();
    apply_env_overrides(&mut config);
    config
}

pub fn apply_env_overrides(config: &mut AutomationConfig) {
    if let Some(url) = non_empty_env(REGISTRY_URL_ENV) {
        info!(registry_url = %url, "Registry URL overridden from environment");
        config.registry_url = url;
    }
    if let Some(root) = non_empty_env(SDK_ROOT_ENV) {
        info!(sdk_root = %root, "SDK root overridden from environment");
        config.sdk_root = PathBuf::from(root);
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
