//! Registers a newly generated module with the repository build graph:
//! service-level aggregate POM, service CI manifest, root POM and the
//! module's changelog seed.
//!
//! Every step is a no-op when its entry already exists, so running the
//! integrator twice leaves the tree byte-for-byte unchanged.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info, warn};

use crate::changelog;
use crate::error::{AutomationError, Result};
use crate::model::{Module, ModuleKind};

pub const CI_HEADER: &str =
    "# NOTE: Please refer to https://aka.ms/azsdk/engsys/ci-yaml before editing this file.\n\n";

static MODULES_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<modules>(.*?)</modules>").expect("static regex"));
static PROFILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<profile>.*?</profile>").expect("static regex"));
static PROFILE_DEFAULT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<id>\s*default\s*</id>").expect("static regex"));
static MODULE_ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<module>\s*([^<]+?)\s*</module>").expect("static regex"));

/// What [`integrate`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrationReport {
    pub service_pom_changed: bool,
    pub ci_changed: bool,
    pub root_pom_changed: bool,
    pub changelog_seeded: bool,
}

pub fn service_pom_template(service: &str, artifact: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.azure</groupId>
  <artifactId>azure-{service}-service</artifactId>
  <packaging>pom</packaging>
  <version>1.0.0</version><!-- Need not change for every release-->
  <modules>
    <module>{artifact}</module>
  </modules>
</project>
"#
    )
}

fn root_pom_template() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0"
         xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
         xsi:schemaLocation="http://maven.apache.org/POM/4.0.0 http://maven.apache.org/xsd/maven-4.0.0.xsd">
  <modelVersion>4.0.0</modelVersion>
  <groupId>com.azure</groupId>
  <artifactId>azure-sdk-all</artifactId>
  <packaging>pom</packaging>
  <version>1.0.0</version>
  <modules>
  </modules>
</project>
"#
    .to_string()
}

/// Byte range of the `<modules>` inner text to edit: the single list, or the
/// one inside the profile whose id is `default` when there are several. With
/// several lists and no default profile the first list is used.
fn target_modules_range(content: &str) -> Option<(usize, usize)> {
    let blocks: Vec<_> = MODULES_BLOCK_RE.captures_iter(content).collect();
    let first = blocks.first()?.get(1).map(|m| (m.start(), m.end()));
    if blocks.len() == 1 {
        return first;
    }
    let in_default_profile = PROFILE_RE
        .find_iter(content)
        .find(|p| PROFILE_DEFAULT_ID_RE.is_match(p.as_str()))
        .and_then(|profile| {
            let caps = MODULES_BLOCK_RE.captures(profile.as_str())?;
            let inner = caps.get(1)?;
            Some((profile.start() + inner.start(), profile.start() + inner.end()))
        });
    if in_default_profile.is_none() {
        warn!(lists = blocks.len(), "[INTEGRATE] Several module lists and no default profile, using the first");
    }
    in_default_profile.or(first)
}

fn line_indent(content: &str, at: usize) -> &str {
    let line_start = content[..at].rfind('\n').map_or(0, |i| i + 1);
    let line = &content[line_start..at];
    let indent_len = line.len() - line.trim_start().len();
    &line[..indent_len]
}

/// Adds `module` to the aggregate POM's module list, sorted and
/// de-duplicated. Returns `None` when the module is already listed.
pub fn add_module(content: &str, module: &str) -> Option<String> {
    let Some((start, end)) = target_modules_range(content) else {
        let close = content.rfind("</project>")?;
        let indent = "  ";
        return Some(format!(
            "{}{indent}<modules>\n{indent}{indent}<module>{module}</module>\n{indent}</modules>\n{}",
            &content[..close],
            &content[close..]
        ));
    };
    let inner = &content[start..end];
    let mut modules: Vec<String> = MODULE_ENTRY_RE
        .captures_iter(inner)
        .map(|c| c[1].to_string())
        .collect();
    if modules.iter().any(|m| m == module) {
        return None;
    }
    modules.push(module.to_string());
    modules.sort();
    modules.dedup();

    let close_indent = line_indent(content, start - "<modules>".len()).to_string();
    let entry_indent = inner
        .find("<module>")
        .map(|i| line_indent(content, start + i).to_string())
        .unwrap_or_else(|| format!("{close_indent}  "));

    let mut body = String::from("\n");
    for m in &modules {
        body.push_str(&format!("{entry_indent}<module>{m}</module>\n"));
    }
    body.push_str(&close_indent);

    Some(format!("{}{}{}", &content[..start], body, &content[end..]))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| AutomationError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| AutomationError::io(path, e))
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| AutomationError::io(path, e))
}

fn update_aggregate_pom(path: &Path, module: &str, template: impl FnOnce() -> String) -> Result<bool> {
    if !path.exists() {
        let created = template();
        let content = add_module(&created, module).unwrap_or(created);
        write_file(path, &content)?;
        info!(path = %path.display(), module = %module, "[INTEGRATE] Created aggregate POM");
        return Ok(true);
    }
    let content = read_file(path)?;
    match add_module(&content, module) {
        Some(updated) => {
            write_file(path, &updated)?;
            info!(path = %path.display(), module = %module, "[INTEGRATE] Module added to aggregate POM");
            Ok(true)
        }
        None => {
            debug!(path = %path.display(), module = %module, "[INTEGRATE] Module already listed");
            Ok(false)
        }
    }
}

/// Hyphen-free artifact name used for CI parameters.
pub fn safe_name(artifact: &str) -> String {
    artifact.replace('-', "")
}

fn ci_skeleton(service: &str, artifact: &str) -> Result<Value> {
    let yaml = format!(
        r#"trigger:
  branches:
    include:
      - main
      - hotfix/*
      - release/*
  paths:
    include:
      - sdk/{service}/ci.yml
      - sdk/{service}/{artifact}/
    exclude:
      - sdk/{service}/pom.xml
      - sdk/{service}/{artifact}/pom.xml

pr:
  branches:
    include:
      - main
      - feature/*
      - hotfix/*
      - release/*
  paths:
    include:
      - sdk/{service}/ci.yml
      - sdk/{service}/{artifact}/
    exclude:
      - sdk/{service}/pom.xml
      - sdk/{service}/{artifact}/pom.xml

parameters: []

extends:
  template: ../../eng/pipelines/templates/stages/archetype-sdk-client.yml
  parameters:
    ServiceDirectory: {service}
    Artifacts: []
"#
    );
    Ok(serde_yaml::from_str(&yaml)?)
}

fn is_data_ci(doc: &Value) -> bool {
    doc.get("extends")
        .and_then(|e| e.get("parameters"))
        .and_then(|p| p.get("SDKType"))
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("data"))
}

fn artifacts_mut<'d>(doc: &'d mut Value, path: &Path) -> Result<&'d mut Vec<Value>> {
    doc.get_mut("extends")
        .and_then(|e| e.get_mut("parameters"))
        .and_then(|p| p.get_mut("Artifacts"))
        .and_then(Value::as_sequence_mut)
        .ok_or_else(|| AutomationError::manifest_layout(path, "no extends.parameters.Artifacts list"))
}

/// Appends the module to the CI artifact list. `toggles` adds the
/// `releaseInBatch` parameter wiring. Returns false when already listed.
fn add_ci_artifact(doc: &mut Value, path: &Path, module: &Module, toggles: bool) -> Result<bool> {
    if !doc.is_mapping() {
        return Err(AutomationError::manifest_layout(path, "root is not a mapping"));
    }
    let artifact = module.artifact();
    let safe = safe_name(artifact);
    let artifacts = artifacts_mut(doc, path)?;
    if artifacts
        .iter()
        .any(|a| a.get("name").and_then(Value::as_str) == Some(artifact))
    {
        return Ok(false);
    }
    let toggles = toggles || artifacts.iter().any(|a| a.get("releaseInBatch").is_some());

    let mut entry = Mapping::new();
    entry.insert("name".into(), artifact.into());
    entry.insert("groupId".into(), module.coordinate.group.as_str().into());
    entry.insert("safeName".into(), safe.as_str().into());
    if toggles {
        entry.insert(
            "releaseInBatch".into(),
            format!("${{{{ parameters.release_{safe} }}}}").into(),
        );
    }
    artifacts.push(Value::Mapping(entry));

    if toggles {
        let mut parameter = Mapping::new();
        parameter.insert("name".into(), format!("release_{safe}").into());
        parameter.insert("displayName".into(), artifact.into());
        parameter.insert("type".into(), "boolean".into());
        parameter.insert("default".into(), (module.kind == ModuleKind::DataPlane).into());

        let Value::Mapping(root) = doc else {
            return Err(AutomationError::manifest_layout(path, "root is not a mapping"));
        };
        let parameters = root
            .entry("parameters".into())
            .or_insert_with(|| Value::Sequence(Vec::new()));
        if let Value::Sequence(list) = parameters {
            list.push(Value::Mapping(parameter));
        }
    }
    Ok(true)
}

fn render_ci(doc: &Value) -> Result<String> {
    Ok(format!("{CI_HEADER}{}", serde_yaml::to_string(doc)?))
}

fn update_ci(service_dir: &Path, module: &Module) -> Result<bool> {
    let ci_path = service_dir.join("ci.yml");
    let existing = if ci_path.exists() {
        let doc: Value = serde_yaml::from_str(&read_file(&ci_path)?)?;
        if is_data_ci(&doc) {
            let renamed = service_dir.join("ci.data.yml");
            fs::rename(&ci_path, &renamed).map_err(|e| AutomationError::io(&ci_path, e))?;
            info!(path = %renamed.display(), "[INTEGRATE] Moved data-plane CI manifest aside");
            None
        } else {
            Some(doc)
        }
    } else {
        None
    };

    let (mut doc, created) = match existing {
        Some(doc) => (doc, false),
        None => (ci_skeleton(&module.service, module.artifact())?, true),
    };
    let added = add_ci_artifact(&mut doc, &ci_path, module, created)?;
    if added || created {
        write_file(&ci_path, &render_ci(&doc)?)?;
        info!(path = %ci_path.display(), created, "[INTEGRATE] CI manifest updated");
    }
    Ok(added || created)
}

/// Runs all integration steps for a newly created module.
pub fn integrate(sdk_root: &Path, module: &Module, initial_version: &str) -> Result<IntegrationReport> {
    info!(
        service = %module.service,
        module = %module.artifact(),
        "[INTEGRATE] Integrating new module"
    );
    let service_dir = sdk_root.join(module.service_dir());
    let artifact = module.artifact().to_string();

    let service_pom_changed = update_aggregate_pom(&service_dir.join("pom.xml"), &artifact, || {
        service_pom_template(&module.service, &artifact)
    })?;
    let ci_changed = update_ci(&service_dir, module)?;
    let service_entry = format!("sdk/{}", module.service);
    let root_pom_changed =
        update_aggregate_pom(&sdk_root.join("pom.xml"), &service_entry, root_pom_template)?;
    let changelog_seeded = changelog::seed_initial_release(
        &module.path_in(sdk_root).join("CHANGELOG.md"),
        &artifact,
        initial_version,
    )?;

    Ok(IntegrationReport {
        service_pom_changed,
        ci_changed,
        root_pom_changed,
        changelog_seeded,
    })
}

/// Files the integrator owns for a module, relative to the sdk root.
pub fn integration_targets(module: &Module) -> Vec<PathBuf> {
    vec![
        module.service_dir().join("ci.yml"),
        module.service_dir().join("pom.xml"),
        PathBuf::from("pom.xml"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Coordinate;

    fn module(service: &str, kind: ModuleKind) -> Module {
        let artifact = format!("azure-resourcemanager-{service}");
        Module {
            service: service.into(),
            coordinate: Coordinate::new("com.azure.resourcemanager", &artifact),
            namespace: format!("com.azure.resourcemanager.{service}"),
            kind,
        }
    }

    #[test]
    fn add_module_sorts_and_dedups() {
        let pom = "<project>\n  <modules>\n    <module>zeta</module>\n    <module>alpha</module>\n    <module>alpha</module>\n  </modules>\n</project>\n";
        let updated = add_module(pom, "beta").unwrap();
        assert_eq!(
            updated,
            "<project>\n  <modules>\n    <module>alpha</module>\n    <module>beta</module>\n    <module>zeta</module>\n  </modules>\n</project>\n"
        );
        assert!(add_module(&updated, "beta").is_none());
    }

    #[test]
    fn add_module_targets_default_profile() {
        let pom = "<project>\n  <profiles>\n    <profile>\n      <id>other</id>\n      <modules>\n        <module>x</module>\n      </modules>\n    </profile>\n    <profile>\n      <id>default</id>\n      <modules>\n        <module>c</module>\n      </modules>\n    </profile>\n  </profiles>\n</project>\n";
        let updated = add_module(pom, "a").unwrap();
        assert!(updated.contains(
            "<id>default</id>\n      <modules>\n        <module>a</module>\n        <module>c</module>\n      </modules>"
        ));
        assert!(updated.contains("<id>other</id>\n      <modules>\n        <module>x</module>\n      </modules>"));
    }

    #[test]
    fn add_module_without_default_profile_uses_first_list() {
        let pom = "<project>\n  <modules>\n    <module>b</module>\n  </modules>\n  <profiles>\n    <profile>\n      <id>other</id>\n      <modules>\n        <module>x</module>\n      </modules>\n    </profile>\n  </profiles>\n</project>\n";
        let updated = add_module(pom, "a").unwrap();
        assert!(updated.starts_with(
            "<project>\n  <modules>\n    <module>a</module>\n    <module>b</module>\n  </modules>"
        ));
        assert_eq!(updated.matches("<modules>").count(), 2);
        assert!(add_module(&updated, "a").is_none());
    }

    #[test]
    fn add_module_to_empty_list_and_missing_list() {
        let root = root_pom_template();
        let updated = add_module(&root, "sdk/foo").unwrap();
        assert!(updated.contains("  <modules>\n    <module>sdk/foo</module>\n  </modules>\n"));

        let bare = "<project>\n</project>\n";
        let updated = add_module(bare, "m").unwrap();
        assert_eq!(
            updated,
            "<project>\n  <modules>\n    <module>m</module>\n  </modules>\n</project>\n"
        );
    }

    #[test]
    fn integrate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let foo = module("foo", ModuleKind::ManagementStandard);
        fs::create_dir_all(foo.path_in(root)).unwrap();

        let first = integrate(root, &foo, "1.0.0-beta.1").unwrap();
        assert!(first.service_pom_changed && first.ci_changed && first.root_pom_changed);
        assert!(first.changelog_seeded);

        let snapshot = |p: &str| fs::read_to_string(root.join(p)).unwrap();
        let before = (
            snapshot("sdk/foo/pom.xml"),
            snapshot("sdk/foo/ci.yml"),
            snapshot("pom.xml"),
            snapshot("sdk/foo/azure-resourcemanager-foo/CHANGELOG.md"),
        );
        let second = integrate(root, &foo, "1.0.0-beta.1").unwrap();
        assert_eq!(second, IntegrationReport::default());
        let after = (
            snapshot("sdk/foo/pom.xml"),
            snapshot("sdk/foo/ci.yml"),
            snapshot("pom.xml"),
            snapshot("sdk/foo/azure-resourcemanager-foo/CHANGELOG.md"),
        );
        assert_eq!(before, after);

        assert!(before.0.contains("<module>azure-resourcemanager-foo</module>"));
        assert!(before.2.contains("<module>sdk/foo</module>"));
        assert!(before.1.starts_with(CI_HEADER));

        let ci: Value = serde_yaml::from_str(&before.1).unwrap();
        let artifacts = ci["extends"]["parameters"]["Artifacts"].as_sequence().unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0]["safeName"].as_str(), Some("azureresourcemanagerfoo"));
        assert_eq!(
            artifacts[0]["releaseInBatch"].as_str(),
            Some("${{ parameters.release_azureresourcemanagerfoo }}")
        );
        assert_eq!(ci["parameters"][0]["default"].as_bool(), Some(false));
    }

    #[test]
    fn data_plane_ci_is_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let service_dir = root.join("sdk/foo");
        fs::create_dir_all(&service_dir).unwrap();
        let data_ci = "extends:\n  template: x.yml\n  parameters:\n    SDKType: data\n    Artifacts:\n      - name: azure-foo\n        groupId: com.azure\n        safeName: azurefoo\n";
        fs::write(service_dir.join("ci.yml"), data_ci).unwrap();

        let foo = module("foo", ModuleKind::ManagementStandard);
        assert!(update_ci(&service_dir, &foo).unwrap());
        assert_eq!(fs::read_to_string(service_dir.join("ci.data.yml")).unwrap(), data_ci);
        let ci = fs::read_to_string(service_dir.join("ci.yml")).unwrap();
        assert!(ci.contains("azure-resourcemanager-foo"));
        assert!(!ci.contains("azurefoo\n"));
    }

    #[test]
    fn existing_ci_without_toggles_gets_plain_entry() {
        let dir = tempfile::tempdir().unwrap();
        let service_dir = dir.path().join("sdk/foo");
        fs::create_dir_all(&service_dir).unwrap();
        fs::write(
            service_dir.join("ci.yml"),
            "extends:\n  template: x.yml\n  parameters:\n    Artifacts:\n      - name: azure-resourcemanager-foo-a\n        groupId: com.azure.resourcemanager\n        safeName: azureresourcemanagerfooa\n",
        )
        .unwrap();

        let foo = module("foo", ModuleKind::ManagementStandard);
        assert!(update_ci(&service_dir, &foo).unwrap());
        let ci: Value =
            serde_yaml::from_str(&fs::read_to_string(service_dir.join("ci.yml")).unwrap()).unwrap();
        let artifacts = ci["extends"]["parameters"]["Artifacts"].as_sequence().unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts[1].get("releaseInBatch").is_none());
        assert!(ci.get("parameters").is_none());
    }

    #[test]
    fn unexpected_ci_layout_names_the_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let service_dir = dir.path().join("sdk/foo");
        fs::create_dir_all(&service_dir).unwrap();
        let ci_path = service_dir.join("ci.yml");
        fs::write(&ci_path, "trigger:\n  branches: [main]\n").unwrap();

        let foo = module("foo", ModuleKind::ManagementStandard);
        let err = update_ci(&service_dir, &foo).unwrap_err();
        match err {
            AutomationError::ManifestLayout { path, .. } => assert_eq!(path, ci_path),
            other => panic!("unexpected error: {other}"),
        }

        fs::write(&ci_path, "- just\n- a list\n").unwrap();
        assert!(matches!(
            update_ci(&service_dir, &foo).unwrap_err(),
            AutomationError::ManifestLayout { .. }
        ));
    }
}
