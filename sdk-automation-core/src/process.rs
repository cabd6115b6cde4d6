use std::process::{Command, Stdio};

use crate::contract::{CommandOutcome, CommandRunner, Invocation};
use crate::error::{AutomationError, Result};

/// Runs invocations as real child processes and blocks until they exit.
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutcome> {
        tracing::info!(
            command = %invocation.display(),
            cwd = %invocation.cwd.display(),
            "Launching subprocess"
        );

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).current_dir(&invocation.cwd);

        let launch_error = |e: std::io::Error| {
            tracing::error!(
                error = ?e,
                program = %invocation.program,
                "Failed to launch subprocess"
            );
            AutomationError::Subprocess {
                program: invocation.program.clone(),
                detail: e.to_string(),
            }
        };

        let outcome = if invocation.capture_stdout {
            let output = command
                .stderr(Stdio::inherit())
                .output()
                .map_err(launch_error)?;
            CommandOutcome {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            }
        } else {
            let status = command.status().map_err(launch_error)?;
            CommandOutcome {
                code: status.code(),
                stdout: String::new(),
            }
        };

        if outcome.success() {
            tracing::debug!(program = %invocation.program, "Subprocess exited successfully");
        } else {
            tracing::warn!(
                program = %invocation.program,
                code = ?outcome.code,
                "Subprocess exited with non-zero code"
            );
        }
        Ok(outcome)
    }
}
