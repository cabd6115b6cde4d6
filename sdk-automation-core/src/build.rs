//! Builds one module (and what it depends on) with tests, docs, signing and
//! coverage skipped, then locates the produced binaries.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::GenerationConfig;
use crate::contract::{CommandRunner, Invocation};
use crate::error::{AutomationError, Result};
use crate::model::Module;

const SKIP_FLAGS: &[&str] = &[
    "-Dmaven.javadoc.skip",
    "-Dgpg.skip",
    "-Dmaven.test.skip",
    "-Djacoco.skip",
    "-Drevapi.skip",
    "-Dcheckstyle.skip",
    "-Dspotbugs.skip",
];

/// Paths the build is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifacts {
    pub pom: PathBuf,
    pub jar: PathBuf,
    pub sources_jar: PathBuf,
}

impl BuildArtifacts {
    pub fn locate(module_dir: &Path, artifact: &str, version: &str) -> Self {
        let target = module_dir.join("target");
        Self {
            pom: module_dir.join("pom.xml"),
            jar: target.join(format!("{artifact}-{version}.jar")),
            sources_jar: target.join(format!("{artifact}-{version}-sources.jar")),
        }
    }

    /// Files that exist on disk, pom first.
    pub fn existing(&self) -> Vec<PathBuf> {
        [&self.pom, &self.jar, &self.sources_jar]
            .into_iter()
            .filter(|p| p.exists())
            .cloned()
            .collect()
    }
}

pub fn build_invocation(config: &GenerationConfig, module: &Module) -> Invocation {
    Invocation::new(&config.automation.tools.build_tool, config.sdk_root())
        .args(["--no-transfer-progress", "clean", "verify"])
        .args(SKIP_FLAGS.iter().copied())
        .arg("-pl")
        .arg(module.coordinate.to_string())
        .arg("-am")
}

/// Runs the build; a failing build is a [`AutomationError::BuildFailed`].
pub fn build_module<R: CommandRunner + ?Sized>(
    runner: &R,
    config: &GenerationConfig,
    module: &Module,
    version: &str,
) -> Result<BuildArtifacts> {
    let invocation = build_invocation(config, module);
    info!(command = %invocation.display(), "[BUILD] Building module");
    let outcome = runner.run(&invocation)?;
    if !outcome.success() {
        warn!(module = %module.coordinate, code = ?outcome.code, "[BUILD][ERROR] Build failed");
        return Err(AutomationError::BuildFailed {
            coordinate: module.coordinate.to_string(),
            detail: format!("build exited with {:?}", outcome.code),
        });
    }
    Ok(BuildArtifacts::locate(
        &module.path_in(config.sdk_root()),
        module.artifact(),
        version,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AutomationConfig, RunOptions, ServicesConfig};
    use crate::contract::{CommandOutcome, MockCommandRunner};

    fn config(root: &Path) -> GenerationConfig {
        let automation = AutomationConfig {
            sdk_root: root.to_path_buf(),
            ..AutomationConfig::default()
        };
        GenerationConfig::resolve(&automation, &RunOptions::default(), &ServicesConfig::default(), "foo")
    }

    #[test]
    fn build_targets_one_module_with_skips() {
        let config = config(Path::new("/sdk"));
        let invocation = build_invocation(&config, &config.management_module());
        assert_eq!(invocation.program, "mvn");
        assert_eq!(invocation.cwd, Path::new("/sdk"));
        assert!(invocation.has_arg("-Dmaven.test.skip"));
        assert!(invocation.has_arg("com.azure.resourcemanager:azure-resourcemanager-foo"));
        assert_eq!(invocation.args.last().unwrap(), "-am");
    }

    #[test]
    fn failing_build_mentions_customizations() {
        let config = config(Path::new("/sdk"));
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|_| Ok(CommandOutcome::failed(1)));
        let err = build_module(&runner, &config, &config.management_module(), "1.0.0")
            .unwrap_err();
        assert!(err.to_string().contains("customization"));
    }

    #[test]
    fn artifacts_are_located_under_target() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = BuildArtifacts::locate(dir.path(), "azure-foo", "1.0.0");
        assert_eq!(artifacts.jar, dir.path().join("target/azure-foo-1.0.0.jar"));
        assert!(artifacts.existing().is_empty());
        std::fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        assert_eq!(artifacts.existing(), vec![dir.path().join("pom.xml")]);
    }
}
