//! Refreshes `{x-version-update;…}` and `{x-include-update;…}` markers from
//! the version ledger.
//!
//! Markers are XML (or markdown) comments next to the element they govern.
//! The rewrite is purely textual so POM formatting is never disturbed.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::error::{AutomationError, Result};
use crate::version::{EntryKind, VersionLedger};

static VERSION_UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{x-version-update;([^;{}]+);(current|dependency|external_dependency)\}")
        .expect("static regex")
});
static INCLUDE_UPDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{x-include-update;([^;{}]+);(current|dependency|external_dependency)\}")
        .expect("static regex")
});
static BLOCK_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{x-version-update-start;([^;{}]+);(current|dependency|external_dependency)\}")
        .expect("static regex")
});
static BLOCK_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{x-version-update-end\}").expect("static regex"));
static VERSION_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<version>[^<]*</version>").expect("static regex"));
static INCLUDE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<include>[^<]*</include>").expect("static regex"));

const SKIPPED_DIRS: &[&str] = &["target", ".git", "node_modules"];

/// Resolves marker keys (`[beta_|unreleased_]group:artifact`) to versions.
#[derive(Debug, Clone, Default)]
pub struct VersionLookup {
    client: HashMap<String, (String, String)>,
    external: HashMap<String, String>,
}

impl VersionLookup {
    pub fn from_ledger(ledger: &VersionLedger) -> Self {
        let client = ledger
            .entries()
            .into_iter()
            .map(|e| {
                let prefix = match e.kind {
                    EntryKind::Regular => "",
                    EntryKind::Beta => "beta_",
                    EntryKind::Unreleased => "unreleased_",
                };
                (
                    format!("{prefix}{}", e.coordinate),
                    (e.dependency_version, e.current_version),
                )
            })
            .collect();
        Self {
            client,
            external: HashMap::new(),
        }
    }

    /// Loads `group:artifact;version` lines from the external dependency file.
    /// A missing file contributes nothing.
    pub fn with_external_file(mut self, path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(self),
            Err(e) => return Err(AutomationError::io(path, e)),
        };
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((coordinate, version)) = line.split_once(';') {
                self.external
                    .insert(coordinate.trim().to_string(), version.trim().to_string());
            }
        }
        Ok(self)
    }

    pub fn resolve(&self, key: &str, kind: &str) -> Option<&str> {
        match kind {
            "current" => self.client.get(key).map(|(_, current)| current.as_str()),
            "dependency" => self.client.get(key).map(|(dependency, _)| dependency.as_str()),
            "external_dependency" => self.external.get(key).map(String::as_str),
            _ => None,
        }
    }
}

fn replace_version_tag(line: &str, version: &str) -> String {
    VERSION_TAG_RE
        .replace(line, format!("<version>{version}</version>").as_str())
        .into_owned()
}

fn rewrite_line(line: &str, lookup: &VersionLookup, block: Option<(&str, &str)>) -> String {
    if let Some(caps) = VERSION_UPDATE_RE.captures(line) {
        if let Some(version) = lookup.resolve(&caps[1], &caps[2]) {
            return replace_version_tag(line, version);
        }
        debug!(marker = %&caps[0], "Unknown coordinate in version marker");
        return line.to_string();
    }
    if let Some(caps) = INCLUDE_UPDATE_RE.captures(line) {
        if let Some(version) = lookup.resolve(&caps[1], &caps[2]) {
            let coordinate = caps[1].trim_start_matches("unreleased_").trim_start_matches("beta_");
            return INCLUDE_TAG_RE
                .replace(line, |_: &Captures| format!("<include>{coordinate}:[{version}]</include>"))
                .into_owned();
        }
        return line.to_string();
    }
    if let Some((key, kind)) = block {
        if let Some(version) = lookup.resolve(key, kind) {
            return replace_version_tag(line, version);
        }
    }
    line.to_string()
}

/// Rewrites all markers in `content`. Returns `None` when nothing changed.
pub fn update_content(content: &str, lookup: &VersionLookup) -> Option<String> {
    let mut out = String::with_capacity(content.len());
    let mut block: Option<(String, String)> = None;

    for line in content.split_inclusive('\n') {
        if let Some(caps) = BLOCK_START_RE.captures(line) {
            block = Some((caps[1].to_string(), caps[2].to_string()));
            out.push_str(line);
            continue;
        }
        if BLOCK_END_RE.is_match(line) {
            block = None;
            out.push_str(line);
            continue;
        }
        let active = block.as_ref().map(|(k, v)| (k.as_str(), v.as_str()));
        out.push_str(&rewrite_line(line, lookup, active));
    }

    (out != content).then_some(out)
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn is_marker_file(path: &Path) -> bool {
    matches!(
        path.file_name().and_then(|n| n.to_str()),
        Some("pom.xml") | Some("README.md")
    )
}

/// Walks `root` and rewrites markers in every POM and README. Returns the
/// number of files changed.
pub fn refresh_markers(root: &Path, lookup: &VersionLookup) -> Result<usize> {
    let mut changed = 0;
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || !is_marker_file(path) {
            continue;
        }
        let content = fs::read_to_string(path).map_err(|e| AutomationError::io(path, e))?;
        if let Some(updated) = update_content(&content, lookup) {
            fs::write(path, updated).map_err(|e| AutomationError::io(path, e))?;
            debug!(path = %path.display(), "Version markers refreshed");
            changed += 1;
        }
    }
    info!(root = %root.display(), changed, "[VERSION] Marker refresh complete");
    Ok(changed)
}
