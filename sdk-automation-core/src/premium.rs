//! Extra steps for hand-curated ("premium") management libraries: their
//! generated samples live in the umbrella library, and the umbrella builds
//! against the unreleased version of each premium library.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::AutomationConfig;
use crate::error::{AutomationError, Result};
use crate::model::Module;
use crate::version::VersionLedger;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PremiumReport {
    pub samples_moved: bool,
    pub ledger_updated: bool,
    pub umbrella_rewired: bool,
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            AutomationError::io(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let destination = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| AutomationError::io(&destination, e))?;
        } else {
            fs::copy(entry.path(), &destination).map_err(|e| AutomationError::io(&destination, e))?;
        }
    }
    Ok(())
}

/// Moves `<module>/src/samples/java/<pkg>/generated` into the umbrella
/// module's samples, replacing what was there, and removes the source.
pub fn relocate_samples(sdk_root: &Path, umbrella: &Path, module: &Module) -> Result<bool> {
    let relative: PathBuf = Path::new("src")
        .join("samples")
        .join("java")
        .join(module.package_path())
        .join("generated");
    let source = module.path_in(sdk_root).join(&relative);
    if !source.is_dir() {
        debug!(path = %source.display(), "[PREMIUM] No generated samples to move");
        return Ok(false);
    }
    let destination = sdk_root.join(umbrella).join(&relative);
    if destination.exists() {
        fs::remove_dir_all(&destination).map_err(|e| AutomationError::io(&destination, e))?;
    }
    copy_tree(&source, &destination)?;
    fs::remove_dir_all(&source).map_err(|e| AutomationError::io(&source, e))?;
    info!(
        from = %source.display(),
        to = %destination.display(),
        "[PREMIUM] Samples relocated to umbrella module"
    );
    Ok(true)
}

/// Points the umbrella POM's dependency on `module` at its unreleased
/// version `version`. A dependency already switched to `unreleased_` only
/// has its version text refreshed. Returns `None` when no matching marker is
/// present or the content is already up to date.
pub fn rewire_umbrella(content: &str, module: &Module, version: &str) -> Option<String> {
    let pattern = format!(
        r"<version>[^<]*</version>(\s*)<!-- \{{x-version-update;(?:unreleased_)?{};dependency\}} -->",
        regex::escape(&module.coordinate.to_string())
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(content)?;
    let whole = caps.get(0)?;
    let replacement = format!(
        "<version>{version}</version>{}<!-- {{x-version-update;unreleased_{};dependency}} -->",
        &caps[1], module.coordinate
    );
    if whole.as_str() == replacement {
        return None;
    }
    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..whole.start()]);
    out.push_str(&replacement);
    out.push_str(&content[whole.end()..]);
    Some(out)
}

/// Runs the premium steps for a module that has just been built at `current`.
pub fn apply(
    automation: &AutomationConfig,
    ledger: &mut VersionLedger,
    module: &Module,
    current: &str,
) -> Result<PremiumReport> {
    let sdk_root = automation.sdk_root.as_path();
    let umbrella = automation.umbrella_relative_path();

    let samples_moved = relocate_samples(sdk_root, &umbrella, module)?;

    let ledger_updated = ledger.ensure_unreleased(&module.coordinate, current);
    if ledger_updated {
        ledger.save()?;
        info!(module = %module.coordinate, version = %current, "[PREMIUM] Unreleased entry set");
    }

    let pom = sdk_root.join(&umbrella).join("pom.xml");
    let umbrella_rewired = match fs::read_to_string(&pom) {
        Ok(content) => match rewire_umbrella(&content, module, current) {
            Some(updated) => {
                fs::write(&pom, updated).map_err(|e| AutomationError::io(&pom, e))?;
                info!(path = %pom.display(), version = %current, "[PREMIUM] Umbrella dependency points at unreleased version");
                true
            }
            None => false,
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %pom.display(), "[PREMIUM] Umbrella POM absent");
            false
        }
        Err(e) => return Err(AutomationError::io(&pom, e)),
    };

    Ok(PremiumReport {
        samples_moved,
        ledger_updated,
        umbrella_rewired,
    })
}
