//! # generate: drive the code generator for one spec pointer
//!
//! Legacy readmes go through the autorest-style generator, modern TypeSpec
//! projects through the sync-and-generate wrapper. Either way the driver
//! purges previously generated code first so deleted operations disappear,
//! works out which module the run produced, and integrates it into the
//! monorepo when it is new. Customization code outside the generated folders
//! is never touched.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::contract::{CommandRunner, Invocation};
use crate::error::{AutomationError, Result};
use crate::git::{Git, StatusEntry};
use crate::integrate;
use crate::markers::{self, VersionLookup};
use crate::model::Module;
use crate::spec::{self, LegacyReadme, ModernProject, Plane, SpecPointer, TspProjectOptions};
use crate::version::VersionLedger;

const TSP_LOCATION_FILE: &str = "tsp-location.yaml";
const LICENSE_HEADER: &str = "MICROSOFT_MIT_SMALL";

/// What the driver produced for one spec pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedModule {
    pub module: Module,
    pub newly_created: bool,
}

/// Deletes the generated parts of a module: `src/main` and the `generated`
/// folders under test and samples.
pub fn purge_generated(module_dir: &Path, module: &Module) -> Result<()> {
    let package = module.package_path();
    let targets = [
        module_dir.join("src").join("main"),
        module_dir.join("src").join("test").join("java").join(&package).join("generated"),
        module_dir.join("src").join("samples").join("java").join(&package).join("generated"),
    ];
    for target in targets.iter().filter(|t| t.exists()) {
        fs::remove_dir_all(target).map_err(|e| AutomationError::io(target, e))?;
        debug!(path = %target.display(), "[GENERATE] Purged generated folder");
    }
    Ok(())
}

fn is_new_module(module_dir: &Path) -> bool {
    !module_dir.join("src").exists()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Composes the legacy generator invocation.
pub fn legacy_invocation(
    config: &GenerationConfig,
    module: &Module,
    readme_location: &str,
    tag: Option<&str>,
) -> Invocation {
    let tools = &config.automation.tools;
    let sdk_root = absolute(config.sdk_root());
    let program = config
        .options
        .autorest
        .clone()
        .unwrap_or_else(|| tools.autorest.clone());
    let plugin = config
        .options
        .use_plugin
        .clone()
        .unwrap_or_else(|| tools.autorest_java.clone());

    let mut invocation = Invocation::new(program, sdk_root.clone())
        .arg(format!("--version={}", tools.autorest_core_version))
        .arg(format!("--use={plugin}"))
        .arg("--java")
        .arg(format!(
            "--java.azure-libraries-for-java-folder={}",
            sdk_root.display()
        ))
        .arg(format!(
            "--java.output-folder={}",
            module.path_in(&sdk_root).display()
        ))
        .arg(format!("--java.namespace={}", module.namespace))
        .arg(format!("--java.license-header={LICENSE_HEADER}"))
        .args(["--generate-samples", "--generate-tests"]);

    invocation = if module.kind.is_management() {
        invocation.args(["--fluent=lite", "--azure-arm"])
    } else {
        invocation.arg("--data-plane")
    };
    if let Some(extra) = config.options.autorest_options.as_deref() {
        invocation = invocation.args(extra.split_whitespace());
    }
    invocation = invocation.arg(readme_location);
    if let Some(tag) = tag {
        invocation = invocation.arg(format!("--tag={tag}"));
    }
    invocation
}

/// Composes the sync-and-generate invocation for a TypeSpec project.
pub fn modern_invocation(
    config: &GenerationConfig,
    project: &ModernProject,
    new_data_plane: Option<&Module>,
) -> Invocation {
    let sdk_root = absolute(config.sdk_root());
    let mut invocation = Invocation::new(&config.automation.tools.tsp_client, sdk_root)
        .args(["init", "--update-if-exists"]);

    invocation = match (&project.remote, &project.local_dir) {
        (Some(remote), _) => invocation
            .arg("--tsp-config")
            .arg(remote.tspconfig_url())
            .arg("--commit")
            .arg(&remote.commit)
            .arg("--repo")
            .arg(&remote.repo),
        (None, Some(dir)) => {
            let dir = absolute(dir);
            invocation
                .arg("--tsp-config")
                .arg(dir.join(spec::TSPCONFIG_FILE).display().to_string())
                .arg("--local-spec-repo")
                .arg(dir.display().to_string())
        }
        (None, None) => invocation.arg("--tsp-config").arg(&project.project),
    };

    if let Some(module) = new_data_plane {
        invocation = invocation
            .arg("--emitter-options")
            .arg(format!("namespace={}", module.namespace));
    }
    invocation
}

pub struct GenerationDriver<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    config: &'a GenerationConfig,
}

impl<'a, R: CommandRunner + ?Sized> GenerationDriver<'a, R> {
    pub fn new(runner: &'a R, config: &'a GenerationConfig) -> Self {
        Self { runner, config }
    }

    fn git(&self) -> Git<'a, R> {
        Git::new(
            self.runner,
            &self.config.automation.tools.git,
            self.config.sdk_root(),
        )
    }

    fn initial_version(&self) -> &str {
        self.config
            .options
            .version
            .as_deref()
            .unwrap_or(&self.config.automation.default_version)
    }

    pub async fn generate(&self, pointer: &SpecPointer) -> Result<GeneratedModule> {
        let generated = match pointer {
            SpecPointer::Legacy(readme) => self.generate_legacy(readme).await?,
            SpecPointer::Modern(project) => self.generate_modern(project).await?,
        };
        if generated.newly_created {
            integrate::integrate(self.config.sdk_root(), &generated.module, self.initial_version())?;
        }
        info!(
            module = %generated.module.coordinate,
            newly_created = generated.newly_created,
            "[GENERATE] Generation complete"
        );
        Ok(generated)
    }

    async fn generate_legacy(&self, readme: &LegacyReadme) -> Result<GeneratedModule> {
        let module = self.config.management_module();
        let module_dir = module.path_in(self.config.sdk_root());
        let newly_created = is_new_module(&module_dir);
        purge_generated(&module_dir, &module)?;

        let location = spec::readme_location(self.config.options.spec_root.as_deref(), &readme.readme);
        let tag = spec::resolve_tag(
            &readme.spec_slug,
            self.config.options.tag.as_deref(),
            &location,
            &self.config.automation.default_resources_tag,
        )
        .await;

        let invocation = legacy_invocation(self.config, &module, &location, tag.as_deref());
        info!(command = %invocation.display(), "[GENERATE] Running legacy generator");
        let outcome = self.runner.run(&invocation)?;
        if !outcome.success() {
            return Err(AutomationError::GeneratorFailed {
                target: readme.readme.clone(),
                detail: format!("generator exited with {:?}", outcome.code),
            });
        }
        Ok(GeneratedModule {
            module,
            newly_created,
        })
    }

    async fn generate_modern(&self, project: &ModernProject) -> Result<GeneratedModule> {
        let options = match (&project.local_dir, &project.remote) {
            (Some(dir), _) => Some(spec::read_tspconfig(dir)?),
            (None, Some(remote)) => Some(
                spec::read_remote_tspconfig(&self.config.automation.raw_content_root, remote).await?,
            ),
            (None, None) => None,
        };
        let expected = options.as_ref().map(|o| self.module_from_options(o, project.plane));
        let sdk_root = self.config.sdk_root();

        let expected_new = expected
            .as_ref()
            .map(|m| is_new_module(&m.path_in(sdk_root)));
        if let Some(module) = &expected {
            purge_generated(&module.path_in(sdk_root), module)?;
        }

        let new_data_plane = expected
            .as_ref()
            .filter(|m| m.kind == crate::model::ModuleKind::DataPlane && expected_new == Some(true));
        let invocation = modern_invocation(self.config, project, new_data_plane);
        info!(command = %invocation.display(), "[GENERATE] Running TypeSpec generator");

        let mut outcome = self.runner.run(&invocation)?;
        if !outcome.success() {
            if let Some(module) = expected.as_ref().filter(|m| self.has_swagger_dir(m)) {
                warn!(module = %module.coordinate, "[GENERATE] Generation failed on a swagger-based module, retrying from a clean folder");
                self.wipe_module(module)?;
                outcome = self.runner.run(&invocation)?;
            }
        }
        if !outcome.success() {
            return Err(AutomationError::GeneratorFailed {
                target: project.project.clone(),
                detail: format!("generator exited with {:?}", outcome.code),
            });
        }

        let git = self.git();
        git.add_all()?;
        let status = git.status()?;
        let detected = self.detect_module(&status, project.plane);

        let (module, newly_created) = match (detected, expected) {
            (Some((module, added)), Some(expected)) if module == expected => {
                (module, expected_new.unwrap_or(added))
            }
            (Some((module, added)), _) => (module, added),
            (None, Some(expected)) => (expected, expected_new.unwrap_or(false)),
            (None, None) => {
                return Err(AutomationError::GeneratorFailed {
                    target: project.project.clone(),
                    detail: format!("no {TSP_LOCATION_FILE} found in the working tree"),
                })
            }
        };
        Ok(GeneratedModule {
            module,
            newly_created,
        })
    }

    fn module_from_options(&self, options: &TspProjectOptions, plane: Plane) -> Module {
        self.config
            .module_for_package(options.service(), &options.package_dir, plane == Plane::DataPlane)
    }

    fn has_swagger_dir(&self, module: &Module) -> bool {
        module.path_in(self.config.sdk_root()).join("swagger").is_dir()
    }

    /// Discards everything in the module folder before a retry.
    fn wipe_module(&self, module: &Module) -> Result<()> {
        let module_dir = module.path_in(self.config.sdk_root());
        Git::new(self.runner, &self.config.automation.tools.git, &module_dir).reset_worktree()?;
        if module_dir.exists() {
            fs::remove_dir_all(&module_dir).map_err(|e| AutomationError::io(&module_dir, e))?;
        }
        Ok(())
    }

    /// Finds `sdk/<service>/<module>/tsp-location.yaml` in the working tree
    /// status, preferring newly added ones.
    fn detect_module(&self, status: &[StatusEntry], plane: Plane) -> Option<(Module, bool)> {
        let mut candidates: Vec<(&StatusEntry, String, String)> = status
            .iter()
            .filter_map(|entry| {
                let segments: Vec<&str> = entry.path.split('/').collect();
                match segments.as_slice() {
                    ["sdk", service, artifact, file] if *file == TSP_LOCATION_FILE => {
                        Some((entry, service.to_string(), artifact.to_string()))
                    }
                    _ => None,
                }
            })
            .collect();
        candidates.sort_by_key(|(entry, _, _)| !entry.is_added());
        let (entry, service, artifact) = candidates.into_iter().next()?;
        debug!(service = %service, artifact = %artifact, code = %entry.code, "[GENERATE] Module detected from working tree");
        let module = self
            .config
            .module_for_package(&service, &artifact, plane == Plane::DataPlane);
        Some((module, entry.is_added()))
    }
}

/// Rewrites version markers across the sdk root from the current ledger.
pub fn refresh_versions(config: &GenerationConfig, ledger: &VersionLedger) -> Result<usize> {
    let lookup = VersionLookup::from_ledger(ledger)
        .with_external_file(&config.automation.external_dependencies_path())?;
    markers::refresh_markers(config.sdk_root(), &lookup)
}
