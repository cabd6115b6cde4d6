//! The handful of git operations the generation driver needs, composed as
//! [`Invocation`]s so they run through the same [`CommandRunner`] seam as
//! every other tool.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::contract::{CommandRunner, Invocation};
use crate::error::{AutomationError, Result};

/// One `git status --porcelain` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter index/worktree code, e.g. `A ` or `??`.
    pub code: String,
    pub path: String,
}

impl StatusEntry {
    pub fn is_added(&self) -> bool {
        self.code.starts_with('A') || self.code == "??"
    }
}

pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let (code, path) = line.split_at(2);
            let path = path.trim();
            // Renames are reported as "old -> new".
            let path = path.rsplit(" -> ").next().unwrap_or(path);
            StatusEntry {
                code: code.to_string(),
                path: path.trim_matches('"').to_string(),
            }
        })
        .collect()
}

pub struct Git<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    program: &'a str,
    cwd: PathBuf,
}

impl<'a, R: CommandRunner + ?Sized> Git<'a, R> {
    pub fn new(runner: &'a R, program: &'a str, cwd: &Path) -> Self {
        Self {
            runner,
            program,
            cwd: cwd.to_path_buf(),
        }
    }

    fn invocation(&self) -> Invocation {
        Invocation::new(self.program, self.cwd.clone())
    }

    fn run_checked(&self, invocation: Invocation) -> Result<String> {
        let outcome = self.runner.run(&invocation)?;
        if !outcome.success() {
            warn!(command = %invocation.display(), code = ?outcome.code, "[GIT] Command failed");
            return Err(AutomationError::Subprocess {
                program: invocation.display(),
                detail: format!("exit code {:?}", outcome.code),
            });
        }
        Ok(outcome.stdout)
    }

    pub fn add_all(&self) -> Result<()> {
        self.run_checked(self.invocation().args(["add", "."]))
            .map(|_| ())
    }

    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        let stdout = self.run_checked(self.invocation().args(["status", "--porcelain"]).capture())?;
        let entries = parse_porcelain(&stdout);
        debug!(count = entries.len(), "[GIT] Working tree status read");
        Ok(entries)
    }

    /// Discards tracked modifications and untracked files under `cwd`.
    pub fn reset_worktree(&self) -> Result<()> {
        self.run_checked(self.invocation().args(["checkout", "--", "."]))?;
        self.run_checked(self.invocation().args(["clean", "-qf", "."]))?;
        Ok(())
    }
}
