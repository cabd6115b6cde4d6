//! Per-module `CHANGELOG.md` handling: version headers, the splice of a new
//! changelog fragment, and the initial-release seed for new modules.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::error::{AutomationError, Result};

pub const INITIAL_RELEASE_MARKER: &str = "Initial release";

static VERSION_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^## (\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?) \(([^()\n]+)\)[ \t]*$")
        .expect("static regex")
});

/// A `## <version> (<date>)` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionHeader {
    pub version: String,
    pub date: String,
    /// Byte offset of the line start.
    pub start: usize,
    /// Byte offset just past the header text (before its newline).
    pub end: usize,
}

pub fn version_headers(content: &str) -> Vec<VersionHeader> {
    VERSION_HEADER_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(VersionHeader {
                version: caps[1].to_string(),
                date: caps[2].to_string(),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Replaces the body of the newest section with `fragment`.
///
/// The newest header line is kept verbatim; everything up to the second
/// header is dropped and replaced by a blank line, the trimmed fragment and
/// another blank line. Returns `None` when the content has fewer than two
/// version headers.
pub fn splice_content(content: &str, fragment: &str) -> Option<String> {
    let headers = version_headers(content);
    let (first, second) = match headers.as_slice() {
        [first, second, ..] => (first, second),
        _ => return None,
    };
    let mut out = String::with_capacity(content.len() + fragment.len());
    out.push_str(&content[..first.end]);
    out.push_str("\n\n");
    out.push_str(fragment.trim());
    out.push_str("\n\n");
    out.push_str(&content[second.start..]);
    Some(out)
}

/// Splices `fragment` into the changelog file. A changelog without two
/// version sections is left unchanged and reported as
/// [`AutomationError::ChangelogUnparseable`].
pub fn splice_file(path: &Path, fragment: &str) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|e| AutomationError::io(path, e))?;
    match splice_content(&content, fragment) {
        Some(updated) => {
            fs::write(path, updated).map_err(|e| AutomationError::io(path, e))?;
            info!(path = %path.display(), "[CHANGELOG] Spliced new changelog fragment");
            Ok(())
        }
        None => {
            warn!(path = %path.display(), "[CHANGELOG] Fewer than two version headers, splice skipped");
            Err(AutomationError::ChangelogUnparseable {
                path: path.to_path_buf(),
            })
        }
    }
}

/// Swaps the version of the newest header, keeping its date placeholder.
pub fn set_latest_version(content: &str, version: &str) -> Option<String> {
    let first = version_headers(content).into_iter().next()?;
    if first.version == version {
        return Some(content.to_string());
    }
    Some(format!(
        "{}## {version} ({}){}",
        &content[..first.start],
        first.date,
        &content[first.end..]
    ))
}

pub fn set_latest_version_in_file(path: &Path, version: &str) -> Result<bool> {
    let content = fs::read_to_string(path).map_err(|e| AutomationError::io(path, e))?;
    match set_latest_version(&content, version) {
        Some(updated) if updated != content => {
            fs::write(path, updated).map_err(|e| AutomationError::io(path, e))?;
            info!(path = %path.display(), version = %version, "[CHANGELOG] Latest header version updated");
            Ok(true)
        }
        Some(_) => Ok(false),
        None => {
            warn!(path = %path.display(), "[CHANGELOG] No version header to update");
            Ok(false)
        }
    }
}

pub fn initial_release_paragraph(artifact: &str) -> String {
    format!("### Features Added\n\n- {INITIAL_RELEASE_MARKER} for the {artifact} Java SDK.\n")
}

/// A changelog is populated once it records a release: the initial-release
/// paragraph, more than one section, or a section with a real date.
fn is_populated(content: &str) -> bool {
    if content.contains(INITIAL_RELEASE_MARKER) {
        return true;
    }
    let headers = version_headers(content);
    headers.len() > 1 || headers.iter().any(|h| h.date != "Unreleased")
}

/// Makes sure a new module's changelog ends with the initial-release
/// paragraph. Populated changelogs are never touched. Returns true when the
/// file was written.
pub fn seed_initial_release(path: &Path, artifact: &str, version: &str) -> Result<bool> {
    let paragraph = initial_release_paragraph(artifact);
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let created = format!("# Release History\n\n## {version} (Unreleased)\n\n{paragraph}");
            fs::write(path, created).map_err(|e| AutomationError::io(path, e))?;
            info!(path = %path.display(), "[CHANGELOG] Created changelog with initial release");
            return Ok(true);
        }
        Err(e) => return Err(AutomationError::io(path, e)),
    };
    if is_populated(&content) {
        return Ok(false);
    }

    let mut updated = content.trim_end().to_string();
    updated.push_str("\n\n");
    updated.push_str(&paragraph);
    fs::write(path, updated).map_err(|e| AutomationError::io(path, e))?;
    info!(path = %path.display(), "[CHANGELOG] Appended initial release paragraph");
    Ok(true)
}
