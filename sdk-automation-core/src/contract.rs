#![allow(unused)]

//! # contract: seams to the external collaborators
//!
//! The core never talks to the generator, the build tool, the breaking-change
//! detector, git or the package registry directly. It goes through two traits:
//!
//! - [`CommandRunner`] runs a blocking subprocess and reports its exit status
//!   (and stdout, when the caller needs to parse it).
//! - [`Registry`] reads previously published binaries and version listings.
//!
//! ## Mocking & Testing
//! Both traits are annotated for `mockall`, so integration tests can drive the
//! whole orchestrator without any external tool installed.

use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;
use tempfile::NamedTempFile;

use crate::error::Result;
use crate::model::Coordinate;

/// A fully composed subprocess call. Arguments are passed verbatim, never
/// through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// When false, stdout/stderr are inherited so output streams to the caller.
    pub capture_stdout: bool,
}

impl Invocation {
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            capture_stdout: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture_stdout = true;
        self
    }

    /// Command line as it would be typed, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Empty unless the invocation asked for capture.
    pub stdout: String,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            stdout: String::new(),
        }
    }

    pub fn ok_with_stdout(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external processes. Implemented by [`crate::process::SystemRunner`]
/// and by test mocks.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
pub trait CommandRunner: Send + Sync {
    /// Runs the invocation to completion. A non-zero exit is reported through
    /// [`CommandOutcome::code`]; only a failure to launch is an `Err`.
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome>;
}

/// Read-only view of a Maven-compatible package registry.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    /// Downloads `<artifact>-<version>.jar` into a temporary file that is
    /// removed when the returned handle is dropped.
    async fn fetch_binary(&self, coordinate: &Coordinate, version: &str) -> Result<NamedTempFile>;

    /// Lists the GA versions published for the coordinate.
    async fn list_versions(&self, coordinate: &Coordinate) -> Result<Vec<String>>;
}
