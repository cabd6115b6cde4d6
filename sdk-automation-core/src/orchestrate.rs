//! # orchestrate: top-level flow
//!
//! For every spec pointer: resolve a per-package [`GenerationConfig`], run
//! the generation driver, version and build the module, compare it against
//! earlier releases, apply the premium steps and record the outcome. Any
//! error scoped to one module turns into a `failed` record and processing
//! moves on; only invalid self-serve parameters abort a batch.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::build;
use crate::changelog;
use crate::compare::{CompareEngine, CompareMode, Comparison};
use crate::config::{AutomationConfig, GenerationConfig, RunOptions, ServicesConfig};
use crate::contract::{CommandRunner, Registry};
use crate::error::{AutomationError, Result};
use crate::generate::{self, GenerationDriver};
use crate::integrate;
use crate::model::Module;
use crate::premium;
use crate::report::{display_path, ChangelogRecord, PackageRecord, PackageResult, Report};
use crate::spec::{self, RemoteRef, SpecPointer};
use crate::version::{self, VersionLedger, VersionPolicy};

/// The batch record handed over by the pipeline that triggers generation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchInput {
    #[serde(default)]
    pub spec_folder: PathBuf,
    #[serde(default)]
    pub head_sha: Option<String>,
    #[serde(default)]
    pub repo_https_url: Option<String>,
    #[serde(default)]
    pub related_readme_md_files: Vec<String>,
    #[serde(default)]
    pub related_type_spec_project_folder: Vec<String>,
    #[serde(default)]
    pub run_mode: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    #[serde(default)]
    pub sdk_release_type: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl BatchInput {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| AutomationError::io(path, e))?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Only an explicit `stable` release type turns preview off.
    pub fn preview(&self) -> bool {
        present(&self.sdk_release_type) != Some("stable")
    }

    pub fn validate(&self) -> Result<()> {
        validate_release_parameters(
            present(&self.run_mode),
            present(&self.api_version),
            present(&self.sdk_release_type),
        )
    }

    fn remote_for(&self, folder: &str) -> Option<RemoteRef> {
        let commit = present(&self.head_sha)?;
        let repo = spec::github_repo_slug(present(&self.repo_https_url)?)?;
        Some(RemoteRef {
            repo,
            commit: commit.to_string(),
            path: folder.trim_matches('/').to_string(),
        })
    }
}

/// Self-serve runs (`release`/`local`) must carry `apiVersion` and
/// `sdkReleaseType` together, and a preview API cannot ship as stable.
pub fn validate_release_parameters(
    run_mode: Option<&str>,
    api_version: Option<&str>,
    release_type: Option<&str>,
) -> Result<()> {
    if !matches!(run_mode, Some("release") | Some("local")) {
        return Ok(());
    }
    match (api_version, release_type) {
        (None, None) => Ok(()),
        (Some(_), None) | (None, Some(_)) => Err(AutomationError::InvalidParameters(
            "apiVersion and sdkReleaseType must be provided together".into(),
        )),
        (Some(api_version), Some(release_type)) => {
            if release_type != "stable" && release_type != "beta" {
                return Err(AutomationError::InvalidParameters(format!(
                    "sdkReleaseType must be 'stable' or 'beta', got '{release_type}'"
                )));
            }
            if release_type == "stable" && api_version.ends_with("-preview") {
                return Err(AutomationError::InvalidParameters(format!(
                    "apiVersion '{api_version}' is a preview version and cannot be released as stable"
                )));
            }
            Ok(())
        }
    }
}

pub struct Orchestrator<'a, R: CommandRunner + ?Sized, G: Registry + ?Sized> {
    automation: &'a AutomationConfig,
    runner: &'a R,
    registry: &'a G,
}

impl<'a, R: CommandRunner + ?Sized, G: Registry + ?Sized> Orchestrator<'a, R, G> {
    pub fn new(automation: &'a AutomationConfig, runner: &'a R, registry: &'a G) -> Self {
        Self {
            automation,
            runner,
            registry,
        }
    }

    /// Processes one pointer given on the command line.
    pub async fn run_single(&self, pointer: &str, options: &RunOptions) -> Result<Report> {
        let services = self.automation.load_services()?;
        let classified = SpecPointer::classify(pointer);
        let record = self.process(pointer, classified, options, &services).await;
        Ok(Report {
            packages: vec![record],
        })
    }

    /// Processes a batch record: TypeSpec projects first, legacy readmes only
    /// when no TypeSpec project produced a package.
    pub async fn run_batch(&self, input: &BatchInput, base: &RunOptions) -> Result<Report> {
        input.validate()?;
        let services = self.automation.load_services()?;
        let options = RunOptions {
            preview: input.preview(),
            spec_root: Some(input.spec_folder.to_string_lossy().to_string()),
            ..base.clone()
        };
        info!(
            spec_folder = %input.spec_folder.display(),
            projects = input.related_type_spec_project_folder.len(),
            readmes = input.related_readme_md_files.len(),
            preview = options.preview,
            "[ORCHESTRATE] Starting batch"
        );

        let mut packages = Vec::new();
        for folder in &input.related_type_spec_project_folder {
            let local = input.spec_folder.join(folder);
            let classified = SpecPointer::classify(&local.to_string_lossy()).map(|mut pointer| {
                if let SpecPointer::Modern(project) = &mut pointer {
                    project.remote = input.remote_for(folder);
                }
                pointer
            });
            packages.push(self.process(folder, classified, &options, &services).await);
        }

        if packages.is_empty() {
            for readme in &input.related_readme_md_files {
                let classified = SpecPointer::classify(readme);
                packages.push(self.process(readme, classified, &options, &services).await);
            }
        }

        let report = Report { packages };
        info!(
            packages = report.packages.len(),
            failed = report.packages.iter().filter(|p| !p.succeeded()).count(),
            "[ORCHESTRATE] Batch complete"
        );
        Ok(report)
    }

    async fn process(
        &self,
        source: &str,
        classified: Result<SpecPointer>,
        options: &RunOptions,
        services: &ServicesConfig,
    ) -> PackageRecord {
        let mut record = PackageRecord::new(source);
        let outcome = match classified {
            Ok(pointer) => {
                match &pointer {
                    SpecPointer::Legacy(_) => record.readme_md.push(source.to_string()),
                    SpecPointer::Modern(_) => record.typespec_project.push(source.to_string()),
                }
                self.try_process(&pointer, options, services, &mut record).await
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                record.result = PackageResult::Succeeded;
                info!(package = %record.package_name, "[ORCHESTRATE] Package succeeded");
            }
            Err(e) => {
                record.result = PackageResult::Failed;
                error!(package = %record.package_name, source = %source, error = %e, "[ORCHESTRATE][ERROR] Package failed");
            }
        }
        record
    }

    async fn try_process(
        &self,
        pointer: &SpecPointer,
        options: &RunOptions,
        services: &ServicesConfig,
        record: &mut PackageRecord,
    ) -> Result<()> {
        let config = GenerationConfig::resolve(self.automation, options, services, pointer.spec_slug());
        if let SpecPointer::Legacy(_) = pointer {
            record.package_name = config.management_artifact();
        }

        let generated = GenerationDriver::new(self.runner, &config).generate(pointer).await?;
        let module = &generated.module;
        self.describe_module(record, module);

        let mut ledger = VersionLedger::load(self.automation.version_file_path())?;
        let policy = VersionPolicy {
            preview: options.preview,
            explicit_version: options.version.clone(),
            default_version: self.automation.default_version.clone(),
        };
        let update = ledger.compute_and_write(&module.coordinate, &policy)?;
        generate::refresh_versions(&config, &ledger)?;

        let artifacts = build::build_module(self.runner, &config, module, &update.current)?;
        record.artifacts = artifacts
            .existing()
            .iter()
            .map(|p| self.relative(p))
            .collect();
        record.api_view_artifact = artifacts
            .sources_jar
            .exists()
            .then(|| self.relative(&artifacts.sources_jar));

        let engine = CompareEngine::new(
            self.runner,
            self.registry,
            &self.automation.tools,
            config.sdk_root(),
        );
        let previous_ga =
            match version::previous_ga(self.registry, &module.coordinate, &update.previous_stable).await {
                Ok(previous) => previous,
                Err(e) => {
                    warn!(module = %module.coordinate, error = %e, "[VERSION] Could not resolve previous GA");
                    None
                }
            };
        let breaking = self
            .compare_tolerant(&engine, module, previous_ga.as_deref(), &update.current, CompareMode::BreakingChange)
            .await?;
        let previous_release = version::previous_release(&update.previous_stable, &update.current);
        let changes = self
            .compare_tolerant(&engine, module, Some(&previous_release), &update.current, CompareMode::Changelog)
            .await?;

        let changelog_path = module.path_in(config.sdk_root()).join("CHANGELOG.md");
        if changelog_path.exists() {
            changelog::set_latest_version_in_file(&changelog_path, &update.current)?;
        }

        if module.is_premium() {
            premium::apply(self.automation, &mut ledger, module, &update.current)?;
        }

        let content = if changes.changelog.is_empty() {
            breaking.changelog
        } else {
            changes.changelog
        };
        record.changelog = ChangelogRecord {
            content,
            has_breaking_change: breaking.breaking,
            breaking_change_items: breaking.breaking_change_items,
        };
        Ok(())
    }

    /// Registry misses and detector hiccups only cost the comparison; a
    /// missing build output fails the module.
    async fn compare_tolerant(
        &self,
        engine: &CompareEngine<'_, R, G>,
        module: &Module,
        previous: Option<&str>,
        current: &str,
        mode: CompareMode,
    ) -> Result<Comparison> {
        match engine.compare(module, previous, current, mode).await {
            Ok(comparison) => Ok(comparison),
            Err(e @ AutomationError::ArtifactMissing { .. }) | Err(e @ AutomationError::Io { .. }) => Err(e),
            Err(e) => {
                warn!(module = %module.coordinate, ?mode, error = %e, "[COMPARE] Comparison skipped");
                Ok(Comparison::default())
            }
        }
    }

    fn relative(&self, path: &Path) -> String {
        display_path(path.strip_prefix(&self.automation.sdk_root).unwrap_or(path))
    }

    fn describe_module(&self, record: &mut PackageRecord, module: &Module) {
        let version_dir = self
            .automation
            .version_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        record.package_name = module.artifact().to_string();
        record.package_folder = display_path(&module.relative_path());
        record.path = std::iter::once(module.relative_path())
            .chain(integrate::integration_targets(module))
            .chain(std::iter::once(version_dir))
            .map(|p| display_path(&p))
            .collect();
    }
}
