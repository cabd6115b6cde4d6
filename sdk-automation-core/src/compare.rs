//! # compare: diff a fresh build against a published release
//!
//! The previous binary is fetched from the registry into a temporary file,
//! handed to the breaking-change detector next to the newly built jar, and
//! the detector's JSON verdict is returned. In changelog mode the fragment
//! is also spliced into the module's `CHANGELOG.md`.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::build::BuildArtifacts;
use crate::changelog;
use crate::config::ToolsConfig;
use crate::contract::{CommandRunner, Invocation, Registry};
use crate::error::{AutomationError, Result};
use crate::model::Module;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Only report whether the API broke.
    BreakingChange,
    /// Also splice the generated changelog into the module's CHANGELOG.md.
    Changelog,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Comparison {
    pub breaking: bool,
    pub changelog: String,
    pub breaking_change_items: Vec<String>,
}

/// Pulls the detector's JSON object out of stdout, ignoring any build noise
/// around it.
pub fn parse_detector_output(stdout: &str) -> Result<Comparison> {
    let start = stdout.find('{');
    let end = stdout.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(serde_json::from_str(&stdout[start..=end])?),
        _ => Err(AutomationError::Subprocess {
            program: "breaking-change detector".into(),
            detail: "no JSON report in output".into(),
        }),
    }
}

pub struct CompareEngine<'a, R: CommandRunner + ?Sized, G: Registry + ?Sized> {
    runner: &'a R,
    registry: &'a G,
    tools: &'a ToolsConfig,
    sdk_root: &'a Path,
}

impl<'a, R: CommandRunner + ?Sized, G: Registry + ?Sized> CompareEngine<'a, R, G> {
    pub fn new(runner: &'a R, registry: &'a G, tools: &'a ToolsConfig, sdk_root: &'a Path) -> Self {
        Self {
            runner,
            registry,
            tools,
            sdk_root,
        }
    }

    /// Compares the module's build of `current` against `previous`.
    ///
    /// No previous release, or one equal to `current`, means there is nothing
    /// to compare and an empty [`Comparison`] is returned.
    pub async fn compare(
        &self,
        module: &Module,
        previous: Option<&str>,
        current: &str,
        mode: CompareMode,
    ) -> Result<Comparison> {
        let Some(previous) = previous.filter(|p| *p != current) else {
            debug!(module = %module.coordinate, "[COMPARE] No previous release to compare against");
            return Ok(Comparison::default());
        };

        let old_binary = self.registry.fetch_binary(&module.coordinate, previous).await?;
        let module_dir = module.path_in(self.sdk_root);
        let new_binary = BuildArtifacts::locate(&module_dir, module.artifact(), current).jar;
        if !new_binary.exists() {
            return Err(AutomationError::ArtifactMissing { path: new_binary });
        }

        let invocation = Invocation::new(&self.tools.changelog_program, self.sdk_root)
            .args(self.tools.changelog_args.iter().cloned())
            .arg(format!("-DOLD_JAR={}", old_binary.path().display()))
            .arg(format!("-DNEW_JAR={}", new_binary.display()))
            .capture();
        info!(
            module = %module.coordinate,
            previous = %previous,
            current = %current,
            ?mode,
            "[COMPARE] Running breaking-change detector"
        );
        let outcome = self.runner.run(&invocation)?;
        if !outcome.success() {
            return Err(AutomationError::Subprocess {
                program: invocation.display(),
                detail: format!("exit code {:?}", outcome.code),
            });
        }
        let comparison = parse_detector_output(&outcome.stdout)?;
        // Temp binary is removed here or on any early return above.
        drop(old_binary);

        if mode == CompareMode::Changelog {
            let path = module_dir.join("CHANGELOG.md");
            match changelog::splice_file(&path, &comparison.changelog) {
                Ok(()) => {}
                Err(AutomationError::ChangelogUnparseable { .. }) => {}
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "[COMPARE] Changelog splice failed");
                }
            }
        }
        Ok(comparison)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_json_is_extracted_from_noise() {
        let stdout = "[INFO] Scanning...\n{\"breaking\":true,\"changelog\":\"### Breaking Changes\\n- x\",\"breakingChangeItems\":[\"Removed x\"]}\n[INFO] done\n";
        let comparison = parse_detector_output(stdout).unwrap();
        assert!(comparison.breaking);
        assert_eq!(comparison.breaking_change_items, vec!["Removed x".to_string()]);

        let minimal = parse_detector_output("{\"changelog\":\"\"}").unwrap();
        assert!(!minimal.breaking);
        assert!(parse_detector_output("no report").is_err());
    }
}
