//! Version ledger: the central `version_client.txt` file.
//!
//! Line format is `group:artifact;dependency_version;current_version`. Lines
//! whose coordinate carries a `beta_` or `unreleased_` prefix hold a single
//! dependency version. Comment lines start with `#`.
//!
//! The ledger keeps the raw lines and only rewrites the line it touches, so a
//! load followed by a save without changes reproduces the file byte for byte
//! (line endings are normalised to `\n`).

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::contract::Registry;
use crate::error::{AutomationError, Result};
use crate::model::Coordinate;

pub const DEFAULT_NEW_VERSION: &str = "1.0.0-beta.1";
pub const UNRELEASED_SECTION_HEADER: &str = "# Unreleased dependencies:";

const BETA_PREFIX: &str = "beta_";
const UNRELEASED_PREFIX: &str = "unreleased_";

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\.(\d+)\.(\d+)(?:-([0-9A-Za-z.-]+))?(?:\+([0-9A-Za-z.-]+))?$")
        .expect("static regex")
});

/// Parsed `major.minor.patch[-pre][+build]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl SemVer {
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = |reason: &str| AutomationError::VersionMalformed {
            value: text.to_string(),
            reason: reason.to_string(),
        };
        let caps = VERSION_RE
            .captures(text)
            .ok_or_else(|| malformed("not major.minor.patch[-pre][+build]"))?;
        let number = |i: usize| {
            caps[i]
                .parse::<u64>()
                .map_err(|_| malformed("numeric component out of range"))
        };
        Ok(Self {
            major: number(1)?,
            minor: number(2)?,
            patch: number(3)?,
            pre: caps.get(4).map(|m| m.as_str().to_string()),
            build: caps.get(5).map(|m| m.as_str().to_string()),
        })
    }

    pub fn is_ga(&self) -> bool {
        self.pre.is_none()
    }

    /// Numeric comparison of major, minor and patch; a GA sorts after any
    /// pre-release of the same triple. Pre-release tags are compared
    /// component-wise only when they have the same number of components.
    pub fn compare(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_pre_release(a, b),
            })
    }
}

fn compare_pre_release(a: &str, b: &str) -> Ordering {
    let left: Vec<&str> = a.split('.').collect();
    let right: Vec<&str> = b.split('.').collect();
    if left.len() != right.len() {
        return left.len().cmp(&right.len());
    }
    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => l.cmp(r),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

pub fn is_beta(version: &str) -> bool {
    version.contains("-beta.")
}

pub fn is_valid_version(version: &str) -> bool {
    VERSION_RE.is_match(version)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Regular,
    Beta,
    Unreleased,
}

impl EntryKind {
    fn prefix(self) -> &'static str {
        match self {
            EntryKind::Regular => "",
            EntryKind::Beta => BETA_PREFIX,
            EntryKind::Unreleased => UNRELEASED_PREFIX,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub coordinate: Coordinate,
    pub kind: EntryKind,
    /// The version other modules should depend on.
    pub dependency_version: String,
    /// The version the module publishes next. Same as the dependency version
    /// for `beta_`/`unreleased_` entries.
    pub current_version: String,
}

impl VersionEntry {
    fn render(&self) -> String {
        match self.kind {
            EntryKind::Regular => format!(
                "{};{};{}",
                self.coordinate, self.dependency_version, self.current_version
            ),
            kind => format!("{}{};{}", kind.prefix(), self.coordinate, self.dependency_version),
        }
    }
}

/// Inputs to [`VersionLedger::compute_and_write`].
#[derive(Debug, Clone)]
pub struct VersionPolicy {
    pub preview: bool,
    pub explicit_version: Option<String>,
    /// Used for a brand-new module and as the fallback for a malformed line.
    pub default_version: String,
}

impl VersionPolicy {
    pub fn new(preview: bool, explicit_version: Option<String>) -> Self {
        Self {
            preview,
            explicit_version,
            default_version: DEFAULT_NEW_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionUpdate {
    pub previous_stable: String,
    pub current: String,
}

enum LineContent {
    Entry(VersionEntry),
    Malformed { coordinate: Coordinate, kind: EntryKind },
    Other,
}

fn split_kind(coordinate_field: &str) -> (EntryKind, &str) {
    if let Some(rest) = coordinate_field.strip_prefix(BETA_PREFIX) {
        (EntryKind::Beta, rest)
    } else if let Some(rest) = coordinate_field.strip_prefix(UNRELEASED_PREFIX) {
        (EntryKind::Unreleased, rest)
    } else {
        (EntryKind::Regular, coordinate_field)
    }
}

fn parse_line(line: &str) -> LineContent {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return LineContent::Other;
    }
    let fields: Vec<&str> = trimmed.split(';').map(str::trim).collect();
    let (kind, coordinate_text) = split_kind(fields[0]);
    let Some(coordinate) = Coordinate::parse(coordinate_text) else {
        return LineContent::Other;
    };
    let expected = match kind {
        EntryKind::Regular => 3,
        _ => 2,
    };
    if fields.len() != expected || fields[1..].iter().any(|f| f.is_empty()) {
        return LineContent::Malformed { coordinate, kind };
    }
    let dependency_version = fields[1].to_string();
    let current_version = fields[expected - 1].to_string();
    LineContent::Entry(VersionEntry {
        coordinate,
        kind,
        dependency_version,
        current_version,
    })
}

/// In-memory copy of the version file.
#[derive(Debug, Clone)]
pub struct VersionLedger {
    path: PathBuf,
    lines: Vec<String>,
    trailing_newline: bool,
}

impl VersionLedger {
    /// Loads the ledger; a missing file yields an empty ledger that is created
    /// on the first save.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "[VERSION] Version file absent, starting empty");
                String::new()
            }
            Err(e) => return Err(AutomationError::io(&path, e)),
        };
        Ok(Self::from_content(path, &content))
    }

    pub fn from_content(path: impl Into<PathBuf>, content: &str) -> Self {
        let normalised = content.replace("\r\n", "\n");
        let trailing_newline = normalised.ends_with('\n');
        let body = normalised.strip_suffix('\n').unwrap_or(&normalised);
        let lines = if body.is_empty() && !trailing_newline {
            Vec::new()
        } else {
            body.split('\n').map(str::to_string).collect()
        };
        Self {
            path: path.into(),
            lines,
            trailing_newline,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| AutomationError::io(parent, e))?;
        }
        fs::write(&self.path, self.render()).map_err(|e| AutomationError::io(&self.path, e))?;
        debug!(path = %self.path.display(), "[VERSION] Version file written");
        Ok(())
    }

    fn find(&self, coordinate: &Coordinate, kind: EntryKind) -> Option<(usize, LineContent)> {
        self.lines
            .iter()
            .enumerate()
            .find_map(|(i, line)| match parse_line(line) {
                LineContent::Entry(entry)
                    if entry.kind == kind && &entry.coordinate == coordinate =>
                {
                    Some((i, LineContent::Entry(entry)))
                }
                LineContent::Malformed {
                    coordinate: c,
                    kind: k,
                } if k == kind && &c == coordinate => Some((
                    i,
                    LineContent::Malformed {
                        coordinate: c,
                        kind: k,
                    },
                )),
                _ => None,
            })
    }

    /// Returns the regular entry for the coordinate, if any. A malformed line
    /// is reported as absent; see [`Self::read_or_default`].
    pub fn read(&self, coordinate: &Coordinate) -> Option<VersionEntry> {
        self.read_kind(coordinate, EntryKind::Regular)
    }

    pub fn read_kind(&self, coordinate: &Coordinate, kind: EntryKind) -> Option<VersionEntry> {
        match self.find(coordinate, kind) {
            Some((_, LineContent::Entry(entry))) => Some(entry),
            _ => None,
        }
    }

    /// Like [`Self::read`], but a malformed line falls back to `default` for
    /// both versions instead of being treated as missing.
    pub fn read_or_default(&self, coordinate: &Coordinate, default: &str) -> Option<VersionEntry> {
        match self.find(coordinate, EntryKind::Regular)? {
            (_, LineContent::Entry(entry)) => Some(entry),
            (index, _) => {
                warn!(
                    coordinate = %coordinate,
                    line = %self.lines[index],
                    default = %default,
                    "[VERSION] Malformed version line, falling back to default version"
                );
                Some(VersionEntry {
                    coordinate: coordinate.clone(),
                    kind: EntryKind::Regular,
                    dependency_version: default.to_string(),
                    current_version: default.to_string(),
                })
            }
        }
    }

    /// Every well-formed entry, in file order.
    pub fn entries(&self) -> Vec<VersionEntry> {
        self.lines
            .iter()
            .filter_map(|line| match parse_line(line) {
                LineContent::Entry(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }

    /// Replaces the entry line in place, or appends it when absent.
    pub fn set_entry(&mut self, entry: &VersionEntry) {
        let rendered = entry.render();
        match self.find(&entry.coordinate, entry.kind) {
            Some((index, _)) => self.lines[index] = rendered,
            None => {
                if self.lines.is_empty() {
                    self.trailing_newline = true;
                }
                self.lines.push(rendered);
            }
        }
    }

    /// Computes the next version for the coordinate, stores it and writes the
    /// file. Returns the stable (dependency) version and the new current one.
    pub fn compute_and_write(
        &mut self,
        coordinate: &Coordinate,
        policy: &VersionPolicy,
    ) -> Result<VersionUpdate> {
        let existing = self.read_or_default(coordinate, &policy.default_version);

        let (previous_stable, current) = match (&policy.explicit_version, existing) {
            (Some(explicit), existing) => {
                let stable = existing
                    .map(|e| e.dependency_version)
                    .unwrap_or_else(|| explicit.clone());
                (stable, explicit.clone())
            }
            (None, None) => (
                policy.default_version.clone(),
                policy.default_version.clone(),
            ),
            (None, Some(entry)) => {
                let current = if !policy.preview && is_beta(&entry.current_version) {
                    strip_beta(&entry.current_version)
                } else {
                    entry.current_version
                };
                (entry.dependency_version, current)
            }
        };

        if !is_valid_version(&current) {
            return Err(AutomationError::VersionMalformed {
                value: current,
                reason: "current version is not a valid semver".into(),
            });
        }

        self.set_entry(&VersionEntry {
            coordinate: coordinate.clone(),
            kind: EntryKind::Regular,
            dependency_version: previous_stable.clone(),
            current_version: current.clone(),
        });
        self.save()?;

        info!(
            coordinate = %coordinate,
            stable = %previous_stable,
            current = %current,
            "[VERSION] Version entry written"
        );
        Ok(VersionUpdate {
            previous_stable,
            current,
        })
    }

    /// Makes the unreleased section hold `unreleased_<coordinate>;<version>`.
    /// An existing entry at another version is rewritten in place. Returns
    /// false when the entry was already up to date.
    pub fn ensure_unreleased(&mut self, coordinate: &Coordinate, version: &str) -> bool {
        let line = VersionEntry {
            coordinate: coordinate.clone(),
            kind: EntryKind::Unreleased,
            dependency_version: version.to_string(),
            current_version: version.to_string(),
        }
        .render();

        if let Some((index, existing)) = self.find(coordinate, EntryKind::Unreleased) {
            if matches!(&existing, LineContent::Entry(entry) if entry.dependency_version == version) {
                return false;
            }
            debug!(
                coordinate = %coordinate,
                previous = %self.lines[index],
                version = %version,
                "[VERSION] Unreleased entry moved to new version"
            );
            self.lines[index] = line;
            return true;
        }

        let header = self
            .lines
            .iter()
            .position(|l| l.trim_start().starts_with(UNRELEASED_SECTION_HEADER));
        match header {
            Some(header) => {
                let index = self.unreleased_insert_index(header);
                self.lines.insert(index, line);
            }
            None => {
                if self.lines.last().is_some_and(|l| !l.trim().is_empty()) {
                    self.lines.push(String::new());
                }
                self.lines.push(UNRELEASED_SECTION_HEADER.to_string());
                self.lines.push(line);
                self.trailing_newline = true;
            }
        }
        true
    }

    /// After the last `unreleased_` entry of the section, or at the first
    /// blank line following the section's header comments.
    fn unreleased_insert_index(&self, header: usize) -> usize {
        let mut last_entry = None;
        let mut index = header + 1;
        while index < self.lines.len() {
            let line = self.lines[index].trim();
            if line.is_empty() || (line.starts_with('#') && last_entry.is_some()) {
                break;
            }
            if line.starts_with(UNRELEASED_PREFIX) {
                last_entry = Some(index);
            }
            index += 1;
        }
        last_entry.map_or(index, |i| i + 1)
    }
}

fn strip_beta(version: &str) -> String {
    match version.find("-beta.") {
        Some(pos) => version[..pos].to_string(),
        None => version.to_string(),
    }
}

/// Latest GA release strictly older than `dependency_version`.
///
/// A GA dependency version is its own answer. A first-beta line
/// (`1.0.0-beta.*`) has no GA predecessor and the registry is not consulted.
pub async fn previous_ga<R>(
    registry: &R,
    coordinate: &Coordinate,
    dependency_version: &str,
) -> Result<Option<String>>
where
    R: Registry + ?Sized,
{
    let target = SemVer::parse(dependency_version)?;
    if target.is_ga() {
        return Ok(Some(dependency_version.to_string()));
    }
    if dependency_version.starts_with("1.0.0-beta.") {
        return Ok(None);
    }

    let published = registry.list_versions(coordinate).await?;
    let best = published
        .iter()
        .filter(|v| !is_beta(v))
        .filter_map(|v| SemVer::parse(v).ok().map(|parsed| (v, parsed)))
        .filter(|(_, parsed)| parsed.is_ga() && parsed.compare(&target) == Ordering::Less)
        .max_by(|(_, a), (_, b)| a.compare(b))
        .map(|(v, _)| v.clone());

    debug!(
        coordinate = %coordinate,
        dependency_version = %dependency_version,
        previous_ga = ?best,
        "[VERSION] Resolved previous GA"
    );
    Ok(best)
}

/// The release the next build should be compared against for the changelog.
///
/// For `X.Y.Z-beta.N` with `N > 1` after a GA stable version, that is
/// `X.Y.Z-beta.(N-1)`; otherwise it is the stable version itself.
pub fn previous_release(previous_stable: &str, current: &str) -> String {
    if !is_beta(previous_stable) {
        if let Some((base, number)) = current.rsplit_once("-beta.") {
            if let Ok(n) = number.parse::<u64>() {
                if n > 1 {
                    return format!("{base}-beta.{}", n - 1);
                }
            }
        }
    }
    previous_stable.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockRegistry;

    fn coord(artifact: &str) -> Coordinate {
        Coordinate::new("com.azure.resourcemanager", artifact)
    }

    const SAMPLE: &str = "\
# Format;
# groupId:artifactId;dependency-version;current-version

com.azure:azure-core;1.45.0;1.46.0-beta.1
com.azure.resourcemanager:azure-resourcemanager-bar;1.2.0;1.3.0-beta.2
com.azure.resourcemanager:azure-resourcemanager-ga;2.0.0;2.1.0

# Unreleased dependencies: Copy the entry from above, prepend \"unreleased_\" and remove the current
# version. Unreleased dependencies are only valid for dependency versions.
unreleased_com.azure:azure-core;1.46.0-beta.1

# Released Beta dependencies: Copy the entry from above, prepend \"beta_\", remove the current
beta_com.azure:azure-core;1.46.0-beta.1
";

    #[test]
    fn semver_compare_is_numeric() {
        let parse = |s| SemVer::parse(s).unwrap();
        assert_eq!(parse("1.10.0").compare(&parse("1.9.0")), Ordering::Greater);
        assert_eq!(parse("1.2.0").compare(&parse("1.2.0-beta.3")), Ordering::Greater);
        assert_eq!(
            parse("1.2.0-beta.10").compare(&parse("1.2.0-beta.9")),
            Ordering::Greater
        );
        assert!(SemVer::parse("1.2").is_err());
        assert!(SemVer::parse("1.2.0-").is_err());
        assert!(is_valid_version("1.0.0+build.5"));
    }

    #[test]
    fn round_trip_is_byte_identical() {
        let ledger = VersionLedger::from_content("version_client.txt", SAMPLE);
        assert_eq!(ledger.render(), SAMPLE);

        let crlf = SAMPLE.replace('\n', "\r\n");
        let ledger = VersionLedger::from_content("version_client.txt", &crlf);
        assert_eq!(ledger.render(), SAMPLE);
    }

    #[test]
    fn reads_regular_and_variant_entries() {
        let ledger = VersionLedger::from_content("v.txt", SAMPLE);
        let bar = ledger.read(&coord("azure-resourcemanager-bar")).unwrap();
        assert_eq!(bar.dependency_version, "1.2.0");
        assert_eq!(bar.current_version, "1.3.0-beta.2");

        let core = Coordinate::new("com.azure", "azure-core");
        let unreleased = ledger.read_kind(&core, EntryKind::Unreleased).unwrap();
        assert_eq!(unreleased.dependency_version, "1.46.0-beta.1");
        assert!(ledger.read_kind(&core, EntryKind::Beta).is_some());
        assert!(ledger.read(&coord("azure-resourcemanager-missing")).is_none());
    }

    #[test]
    fn beta_to_ga_strips_suffix_and_keeps_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version_client.txt");
        fs::write(&path, SAMPLE).unwrap();

        let mut ledger = VersionLedger::load(&path).unwrap();
        let update = ledger
            .compute_and_write(&coord("azure-resourcemanager-bar"), &VersionPolicy::new(false, None))
            .unwrap();
        assert_eq!(update.previous_stable, "1.2.0");
        assert_eq!(update.current, "1.3.0");

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("com.azure.resourcemanager:azure-resourcemanager-bar;1.2.0;1.3.0\n"));
        assert_eq!(written, SAMPLE.replace(";1.3.0-beta.2", ";1.3.0"));
    }

    #[test]
    fn preview_and_ga_entries_are_retained() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version_client.txt");
        fs::write(&path, SAMPLE).unwrap();
        let mut ledger = VersionLedger::load(&path).unwrap();

        let update = ledger
            .compute_and_write(&coord("azure-resourcemanager-bar"), &VersionPolicy::new(true, None))
            .unwrap();
        assert_eq!(update.current, "1.3.0-beta.2");

        let update = ledger
            .compute_and_write(&coord("azure-resourcemanager-ga"), &VersionPolicy::new(false, None))
            .unwrap();
        assert_eq!(update.current, "2.1.0");
        assert_eq!(fs::read_to_string(&path).unwrap(), SAMPLE);
    }

    #[test]
    fn new_module_gets_default_beta() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eng/versioning/version_client.txt");
        let mut ledger = VersionLedger::load(&path).unwrap();
        let update = ledger
            .compute_and_write(&coord("azure-resourcemanager-foo"), &VersionPolicy::new(true, None))
            .unwrap();
        assert_eq!(update.previous_stable, "1.0.0-beta.1");
        assert_eq!(update.current, "1.0.0-beta.1");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "com.azure.resourcemanager:azure-resourcemanager-foo;1.0.0-beta.1;1.0.0-beta.1\n"
        );
    }

    #[test]
    fn explicit_version_is_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version_client.txt");
        let mut ledger = VersionLedger::load(&path).unwrap();

        let update = ledger
            .compute_and_write(
                &coord("azure-resourcemanager-foo"),
                &VersionPolicy::new(false, Some("1.0.0".into())),
            )
            .unwrap();
        assert_eq!(update.previous_stable, "1.0.0");
        assert_eq!(update.current, "1.0.0");

        let err = ledger
            .compute_and_write(
                &coord("azure-resourcemanager-foo"),
                &VersionPolicy::new(false, Some("1.0".into())),
            )
            .unwrap_err();
        assert!(matches!(err, AutomationError::VersionMalformed { .. }));
    }

    #[test]
    fn malformed_line_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("version_client.txt");
        fs::write(&path, "com.azure.resourcemanager:azure-resourcemanager-foo;1.0.0\n").unwrap();

        let mut ledger = VersionLedger::load(&path).unwrap();
        assert!(ledger.read(&coord("azure-resourcemanager-foo")).is_none());
        let update = ledger
            .compute_and_write(&coord("azure-resourcemanager-foo"), &VersionPolicy::new(true, None))
            .unwrap();
        assert_eq!(update.current, DEFAULT_NEW_VERSION);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "com.azure.resourcemanager:azure-resourcemanager-foo;1.0.0-beta.1;1.0.0-beta.1\n"
        );
    }

    #[test]
    fn unreleased_entry_lands_after_last_unreleased_line() {
        let mut ledger = VersionLedger::from_content("v.txt", SAMPLE);
        let compute = coord("azure-resourcemanager-compute");
        assert!(ledger.ensure_unreleased(&compute, "2.36.0-beta.1"));
        assert!(!ledger.ensure_unreleased(&compute, "2.36.0-beta.1"));

        let rendered = ledger.render();
        assert!(rendered.contains(
            "unreleased_com.azure:azure-core;1.46.0-beta.1\n\
             unreleased_com.azure.resourcemanager:azure-resourcemanager-compute;2.36.0-beta.1\n\n"
        ));
    }

    #[test]
    fn stale_unreleased_entry_is_rewritten_in_place() {
        let mut ledger = VersionLedger::from_content("v.txt", SAMPLE);
        let core = Coordinate::new("com.azure", "azure-core");
        assert!(ledger.ensure_unreleased(&core, "1.46.0"));
        assert!(!ledger.ensure_unreleased(&core, "1.46.0"));

        let entry = ledger.read_kind(&core, EntryKind::Unreleased).unwrap();
        assert_eq!(entry.dependency_version, "1.46.0");
        assert_eq!(
            ledger.render(),
            SAMPLE.replace(
                "unreleased_com.azure:azure-core;1.46.0-beta.1",
                "unreleased_com.azure:azure-core;1.46.0"
            )
        );
    }

    #[test]
    fn unreleased_entry_in_empty_section_and_missing_section() {
        let content = "a:b;1.0.0;1.0.0\n\n# Unreleased dependencies: note\n# more notes\n\n# Released Beta\n";
        let mut ledger = VersionLedger::from_content("v.txt", content);
        ledger.ensure_unreleased(&Coordinate::new("a", "c"), "2.0.0");
        assert_eq!(
            ledger.render(),
            "a:b;1.0.0;1.0.0\n\n# Unreleased dependencies: note\n# more notes\nunreleased_a:c;2.0.0\n\n# Released Beta\n"
        );

        let mut ledger = VersionLedger::from_content("v.txt", "a:b;1.0.0;1.0.0\n");
        ledger.ensure_unreleased(&Coordinate::new("a", "c"), "2.0.0");
        assert_eq!(
            ledger.render(),
            "a:b;1.0.0;1.0.0\n\n# Unreleased dependencies:\nunreleased_a:c;2.0.0\n"
        );
    }

    #[test]
    fn previous_release_steps_back_one_beta() {
        assert_eq!(previous_release("1.2.0", "1.3.0-beta.3"), "1.3.0-beta.2");
        assert_eq!(previous_release("1.2.0", "1.3.0-beta.1"), "1.2.0");
        assert_eq!(previous_release("1.3.0-beta.1", "1.3.0-beta.2"), "1.3.0-beta.1");
        assert_eq!(previous_release("1.2.0", "1.3.0"), "1.2.0");
    }

    #[tokio::test]
    async fn previous_ga_filters_registry_listing() {
        let mut registry = MockRegistry::new();
        registry.expect_list_versions().times(1).returning(|_| {
            Ok(vec![
                "1.0.0".to_string(),
                "1.1.0".to_string(),
                "1.2.0-beta.1".to_string(),
                "1.2.0-beta.2".to_string(),
            ])
        });
        let c = coord("azure-resourcemanager-bar");

        let ga = previous_ga(&registry, &c, "1.2.0-beta.3").await.unwrap();
        assert_eq!(ga.as_deref(), Some("1.1.0"));

        // First beta line and GA versions never hit the registry.
        assert_eq!(previous_ga(&registry, &c, "1.0.0-beta.5").await.unwrap(), None);
        assert_eq!(
            previous_ga(&registry, &c, "1.1.0").await.unwrap().as_deref(),
            Some("1.1.0")
        );
    }
}
