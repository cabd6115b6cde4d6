//! Spec pointers: what the generator is asked to generate from.
//!
//! A pointer is either a legacy REST-description readme
//! (`specification/<service>/resource-manager/…/readme.md`) or a modern
//! TypeSpec project directory (local, or pinned on GitHub by commit).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use tracing::{debug, info, warn};

use crate::error::{AutomationError, Result};

pub const TSPCONFIG_FILE: &str = "tspconfig.yaml";
const JAVA_EMITTER: &str = "@azure-tools/typespec-java";
const DISTINGUISHED_TAG_SERVICE: &str = "resources";

static LEGACY_README_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)specification/([^/]+)/resource-manager(?:/[^/]+)*/readme\.md$")
        .expect("static regex")
});
static REMOTE_TSPCONFIG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://github\.com/([^/]+/[^/]+)/blob/([0-9a-f]{40})/(.+)/tspconfig\.yaml$")
        .expect("static regex")
});
static SERVICE_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sdk/\w+$").expect("static regex"));
static PACKAGE_DIR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^azure(-\w+)+$").expect("static regex"));
static RESOURCES_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tag: (package-resources-\S+)").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    DataPlane,
    Management,
}

/// A TypeSpec project pinned in a remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// `owner/repo`
    pub repo: String,
    pub commit: String,
    /// Project directory inside the repository.
    pub path: String,
}

impl RemoteRef {
    pub fn tspconfig_url(&self) -> String {
        format!(
            "https://github.com/{}/blob/{}/{}/{TSPCONFIG_FILE}",
            self.repo, self.commit, self.path
        )
    }

    /// Location of the raw tspconfig under a raw-content root
    /// (`<root>/<repo>/<commit>/<path>/tspconfig.yaml`).
    pub fn raw_tspconfig_location(&self, raw_root: &str) -> String {
        format!(
            "{}/{}/{}/{}/{TSPCONFIG_FILE}",
            raw_root.trim_end_matches('/'),
            self.repo,
            self.commit,
            self.path
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyReadme {
    /// The readme as given, relative to the spec root or absolute URL.
    pub readme: String,
    pub spec_slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModernProject {
    /// Project path as given (used in reports).
    pub project: String,
    pub local_dir: Option<PathBuf>,
    pub remote: Option<RemoteRef>,
    pub spec_slug: String,
    pub provider_path: Option<String>,
    pub plane: Plane,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecPointer {
    Legacy(LegacyReadme),
    Modern(ModernProject),
}

impl SpecPointer {
    pub fn spec_slug(&self) -> &str {
        match self {
            SpecPointer::Legacy(l) => &l.spec_slug,
            SpecPointer::Modern(m) => &m.spec_slug,
        }
    }

    /// Classifies a pointer given as a path or URL.
    pub fn classify(pointer: &str) -> Result<Self> {
        let normalised = pointer.replace('\\', "/");
        let trimmed = normalised.trim_end_matches('/');

        if let Some(caps) = LEGACY_README_RE.captures(trimmed) {
            return Ok(SpecPointer::Legacy(LegacyReadme {
                readme: pointer.to_string(),
                spec_slug: caps[1].to_string(),
            }));
        }

        if let Some(caps) = REMOTE_TSPCONFIG_RE.captures(trimmed) {
            let remote = RemoteRef {
                repo: caps[1].to_string(),
                commit: caps[2].to_string(),
                path: caps[3].to_string(),
            };
            let mut project = Self::classify_project(&remote.path, None)?;
            project.project = pointer.to_string();
            project.remote = Some(remote);
            return Ok(SpecPointer::Modern(project));
        }

        let project_path = trimmed
            .strip_suffix(&format!("/{TSPCONFIG_FILE}"))
            .unwrap_or(trimmed);
        let local_dir = Some(PathBuf::from(project_path));
        let mut project = Self::classify_project(project_path, local_dir)?;
        project.project = pointer.to_string();
        Ok(SpecPointer::Modern(project))
    }

    fn classify_project(path: &str, local_dir: Option<PathBuf>) -> Result<ModernProject> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let spec_index = segments
            .iter()
            .position(|s| *s == "specification")
            .ok_or_else(|| {
                AutomationError::bad_spec(format!("'{path}' is not under a specification/ folder"))
            })?;
        let spec_slug = segments
            .get(spec_index + 1)
            .ok_or_else(|| AutomationError::bad_spec(format!("'{path}' names no service")))?
            .to_string();

        let tail = &segments[spec_index + 1..];
        let (plane, marker) = if let Some(i) = tail.iter().position(|s| *s == "data-plane") {
            (Plane::DataPlane, i)
        } else if let Some(i) = tail.iter().position(|s| *s == "resource-manager") {
            (Plane::Management, i)
        } else {
            return Err(AutomationError::bad_spec(format!(
                "'{path}' has neither a data-plane nor a resource-manager segment"
            )));
        };
        let provider = tail[marker + 1..].join("/");

        Ok(ModernProject {
            project: path.to_string(),
            local_dir,
            remote: None,
            spec_slug,
            provider_path: (!provider.is_empty()).then_some(provider),
            plane,
        })
    }
}

/// Options the Java emitter reads from `tspconfig.yaml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TspProjectOptions {
    /// `sdk/<service>`
    pub service_dir: String,
    /// `azure-…`
    pub package_dir: String,
}

impl TspProjectOptions {
    pub fn service(&self) -> &str {
        self.service_dir.trim_start_matches("sdk/")
    }
}

/// Reads and validates `tspconfig.yaml` in a project directory.
pub fn read_tspconfig(project_dir: &Path) -> Result<TspProjectOptions> {
    let path = project_dir.join(TSPCONFIG_FILE);
    let content = fs::read_to_string(&path).map_err(|e| {
        warn!(path = %path.display(), error = ?e, "[SPEC] tspconfig not readable");
        AutomationError::bad_spec(format!("cannot read {}: {e}", path.display()))
    })?;
    parse_tspconfig(&content)
}

pub fn parse_tspconfig(content: &str) -> Result<TspProjectOptions> {
    let doc: Value = serde_yaml::from_str(content)
        .map_err(|e| AutomationError::bad_spec(format!("tspconfig is not valid YAML: {e}")))?;

    let service_dir = doc
        .get("parameters")
        .and_then(|p| p.get("service-dir"))
        .and_then(|s| s.get("default"))
        .and_then(Value::as_str)
        .ok_or_else(|| AutomationError::bad_spec("tspconfig has no parameters.service-dir.default"))?;
    if !SERVICE_DIR_RE.is_match(service_dir) {
        return Err(AutomationError::bad_spec(format!(
            "service-dir '{service_dir}' does not match sdk/<name>"
        )));
    }

    let package_dir = doc
        .get("options")
        .and_then(|o| o.get(JAVA_EMITTER))
        .and_then(|j| j.get("package-dir"))
        .and_then(Value::as_str)
        .ok_or_else(|| AutomationError::bad_spec("tspconfig has no Java package-dir option"))?;
    if !PACKAGE_DIR_RE.is_match(package_dir) {
        return Err(AutomationError::bad_spec(format!(
            "package-dir '{package_dir}' does not match azure(-<name>)+"
        )));
    }

    Ok(TspProjectOptions {
        service_dir: service_dir.to_string(),
        package_dir: package_dir.to_string(),
    })
}

/// Fetches and validates the tspconfig of a project pinned in a remote
/// repository.
pub async fn read_remote_tspconfig(raw_root: &str, remote: &RemoteRef) -> Result<TspProjectOptions> {
    let location = remote.raw_tspconfig_location(raw_root);
    debug!(location = %location, "[SPEC] Fetching remote tspconfig");
    let content = read_text(&location).await.map_err(|e| {
        warn!(location = %location, error = %e, "[SPEC] Remote tspconfig not readable");
        e
    })?;
    parse_tspconfig(&content)
}

/// Joins a readme path onto the spec root, which may be a URL or a directory.
pub fn readme_location(spec_root: Option<&str>, readme: &str) -> String {
    if readme.starts_with("http://") || readme.starts_with("https://") {
        return readme.to_string();
    }
    match spec_root {
        Some(root) if !root.is_empty() => {
            format!("{}/{}", root.trim_end_matches('/'), readme.trim_start_matches('/'))
        }
        _ => readme.to_string(),
    }
}

/// Reads a text document over HTTPS or from disk.
pub async fn read_text(location: &str) -> Result<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = reqwest::get(location).await?.error_for_status()?;
        Ok(response.text().await?)
    } else {
        fs::read_to_string(location).map_err(|e| AutomationError::io(location, e))
    }
}

/// Picks the tag to pass to the generator: an explicit tag wins; for the
/// `resources` spec the readme is searched for a `package-resources-*` tag,
/// falling back to `default_tag`. Other specs use the readme's own default.
pub async fn resolve_tag(
    spec_slug: &str,
    explicit: Option<&str>,
    readme_location: &str,
    default_tag: &str,
) -> Option<String> {
    if let Some(tag) = explicit {
        return Some(tag.to_string());
    }
    if spec_slug != DISTINGUISHED_TAG_SERVICE {
        return None;
    }
    let detected = match read_text(readme_location).await {
        Ok(body) => detect_resources_tag(&body),
        Err(e) => {
            warn!(error = %e, readme = %readme_location, "[SPEC] Could not read readme for tag detection");
            None
        }
    };
    match detected {
        Some(tag) => {
            info!(tag = %tag, "[SPEC] Detected resources tag");
            Some(tag)
        }
        None => {
            debug!(tag = %default_tag, "[SPEC] Falling back to default resources tag");
            Some(default_tag.to_string())
        }
    }
}

pub fn detect_resources_tag(readme_body: &str) -> Option<String> {
    RESOURCES_TAG_RE
        .captures(readme_body)
        .map(|caps| caps[1].to_string())
}

/// `owner/repo` from `https://github.com/owner/repo[.git]`.
pub fn github_repo_slug(repo_url: &str) -> Option<String> {
    let rest = repo_url.trim_end_matches('/').strip_prefix("https://github.com/")?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Some(format!("{owner}/{repo}"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_readme_is_recognised() {
        let pointer =
            SpecPointer::classify("specification/foo/resource-manager/readme.md").unwrap();
        assert_eq!(
            pointer,
            SpecPointer::Legacy(LegacyReadme {
                readme: "specification/foo/resource-manager/readme.md".into(),
                spec_slug: "foo".into(),
            })
        );
        let nested = SpecPointer::classify(
            "https://raw.githubusercontent.com/x/y/main/specification/bar/resource-manager/Microsoft.Bar/readme.md",
        )
        .unwrap();
        assert_eq!(nested.spec_slug(), "bar");
    }

    #[test]
    fn modern_projects_split_by_plane() {
        let SpecPointer::Modern(mgmt) =
            SpecPointer::classify("specification/foo/resource-manager/Microsoft.Foo/Foo/").unwrap()
        else {
            panic!("expected modern pointer");
        };
        assert_eq!(mgmt.plane, Plane::Management);
        assert_eq!(mgmt.provider_path.as_deref(), Some("Microsoft.Foo/Foo"));
        assert_eq!(
            mgmt.local_dir.as_deref(),
            Some(Path::new("specification/foo/resource-manager/Microsoft.Foo/Foo"))
        );

        let SpecPointer::Modern(data) =
            SpecPointer::classify("specification/foo/data-plane/Foo/tspconfig.yaml").unwrap()
        else {
            panic!("expected modern pointer");
        };
        assert_eq!(data.plane, Plane::DataPlane);
        assert_eq!(data.local_dir.as_deref(), Some(Path::new("specification/foo/data-plane/Foo")));
    }

    #[test]
    fn remote_project_carries_commit() {
        let url = "https://github.com/Azure/azure-rest-api-specs/blob/0123456789abcdef0123456789abcdef01234567/specification/foo/resource-manager/Microsoft.Foo/Foo/tspconfig.yaml";
        let SpecPointer::Modern(project) = SpecPointer::classify(url).unwrap() else {
            panic!("expected modern pointer");
        };
        let remote = project.remote.clone().unwrap();
        assert_eq!(remote.repo, "Azure/azure-rest-api-specs");
        assert_eq!(remote.commit, "0123456789abcdef0123456789abcdef01234567");
        assert_eq!(remote.tspconfig_url(), url);
        assert!(project.local_dir.is_none());
        assert_eq!(project.spec_slug, "foo");
    }

    #[test]
    fn unknown_shapes_are_bad_specs() {
        for pointer in ["specification/foo/readme.md", "random/path", "specification/foo/Foo.Management"] {
            let err = SpecPointer::classify(pointer).unwrap_err();
            assert!(matches!(err, AutomationError::BadSpec { .. }), "{pointer}");
        }
    }

    #[test]
    fn tspconfig_options_are_validated() {
        let good = "parameters:\n  service-dir:\n    default: \"sdk/foo\"\noptions:\n  \"@azure-tools/typespec-java\":\n    package-dir: \"azure-resourcemanager-foo\"\n";
        let options = parse_tspconfig(good).unwrap();
        assert_eq!(options.service(), "foo");
        assert_eq!(options.package_dir, "azure-resourcemanager-foo");

        let bad_service = good.replace("sdk/foo", "not-sdk/foo");
        assert!(matches!(
            parse_tspconfig(&bad_service).unwrap_err(),
            AutomationError::BadSpec { .. }
        ));
        let bad_package = good.replace("azure-resourcemanager-foo", "foo-lib");
        assert!(parse_tspconfig(&bad_package).is_err());
        assert!(parse_tspconfig("parameters: {}\n").is_err());
    }

    #[test]
    fn resources_tag_detection() {
        assert_eq!(
            detect_resources_tag("``` yaml\nopenapi-type: arm\ntag: package-resources-2024-03\n```"),
            Some("package-resources-2024-03".into())
        );
        assert_eq!(detect_resources_tag("tag: package-2024-03"), None);
    }

    #[tokio::test]
    async fn resources_tag_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let readme = dir.path().join("readme.md");
        fs::write(&readme, "# Resources\n\ntag: package-policy-2023-04\n").unwrap();
        let location = readme.to_string_lossy().to_string();

        let tag = resolve_tag("resources", None, &location, "package-resources-2022-09").await;
        assert_eq!(tag.as_deref(), Some("package-resources-2022-09"));
        assert_eq!(resolve_tag("foo", None, &location, "x").await, None);
        assert_eq!(
            resolve_tag("foo", Some("package-1"), &location, "x").await.as_deref(),
            Some("package-1")
        );
    }

    #[tokio::test]
    async fn remote_tspconfig_is_read_from_raw_root() {
        let dir = tempfile::tempdir().unwrap();
        let remote = RemoteRef {
            repo: "Azure/azure-rest-api-specs".into(),
            commit: "0123456789abcdef0123456789abcdef01234567".into(),
            path: "specification/foo/resource-manager/Microsoft.Foo/Foo".into(),
        };
        let raw_root = dir.path().to_string_lossy().to_string();
        assert_eq!(
            remote.raw_tspconfig_location("https://raw.githubusercontent.com/"),
            "https://raw.githubusercontent.com/Azure/azure-rest-api-specs/0123456789abcdef0123456789abcdef01234567/specification/foo/resource-manager/Microsoft.Foo/Foo/tspconfig.yaml"
        );
        assert!(read_remote_tspconfig(&raw_root, &remote).await.is_err());

        let location = remote.raw_tspconfig_location(&raw_root);
        fs::create_dir_all(Path::new(&location).parent().unwrap()).unwrap();
        fs::write(
            &location,
            "parameters:\n  service-dir:\n    default: sdk/foo\noptions:\n  \"@azure-tools/typespec-java\":\n    package-dir: azure-resourcemanager-foo\n",
        )
        .unwrap();
        let options = read_remote_tspconfig(&raw_root, &remote).await.unwrap();
        assert_eq!(options.service(), "foo");
        assert_eq!(options.package_dir, "azure-resourcemanager-foo");
    }

    #[test]
    fn locations_and_repo_slugs() {
        assert_eq!(
            readme_location(Some("https://host/specs/"), "specification/foo/resource-manager/readme.md"),
            "https://host/specs/specification/foo/resource-manager/readme.md"
        );
        assert_eq!(readme_location(None, "a/readme.md"), "a/readme.md");
        assert_eq!(
            github_repo_slug("https://github.com/Azure/azure-rest-api-specs.git").as_deref(),
            Some("Azure/azure-rest-api-specs")
        );
        assert!(github_repo_slug("https://example.com/a/b").is_none());
    }
}
