//! Shell command execution.
//!
//! The fixture never spawns processes directly; it goes through a
//! [`CommandRunner`] so tests can substitute a recording double.

use std::process::Command;

use tracing::debug;

use crate::errors::{FixtureError, Result};

/// Outcome of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub command: String,
    /// Exit status; `-1` when the process was killed by a signal.
    pub status: i32,
    /// Captured stdout followed by stderr, trailing whitespace trimmed.
    pub output: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs shell commands on behalf of the fixture.
pub trait CommandRunner {
    /// Run `command`. With `ignore_status` a non-zero exit is returned as a
    /// normal result, otherwise it becomes [`FixtureError::CommandFailed`].
    fn run(&self, command: &str, ignore_status: bool) -> Result<CommandResult>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, command: &str, ignore_status: bool) -> Result<CommandResult> {
        (**self).run(command, ignore_status)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(&self, command: &str, ignore_status: bool) -> Result<CommandResult> {
        (**self).run(command, ignore_status)
    }
}

/// Runs commands through `sh -c` in the current working directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, ignore_status: bool) -> Result<CommandResult> {
        debug!("running command: {}", command);
        let out = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .map_err(|source| FixtureError::CommandSpawn {
                command: command.to_string(),
                source,
            })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));
        let result = CommandResult {
            command: command.to_string(),
            status: out.status.code().unwrap_or(-1),
            output: output.trim_end().to_string(),
        };
        check_status(result, ignore_status)
    }
}

pub(crate) fn check_status(result: CommandResult, ignore_status: bool) -> Result<CommandResult> {
    if result.success() || ignore_status {
        Ok(result)
    } else {
        Err(FixtureError::CommandFailed {
            command: result.command,
            status: result.status,
            output: result.output,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_stderr() {
        let r = ShellRunner
            .run("echo out; echo err 1>&2", false)
            .expect("command runs");
        assert!(r.success());
        assert_eq!(r.output, "out\nerr");
    }

    #[test]
    fn non_zero_status_is_error_unless_ignored() {
        let err = ShellRunner.run("exit 3", false).unwrap_err();
        assert!(matches!(err, FixtureError::CommandFailed { status: 3, .. }));

        let r = ShellRunner.run("exit 3", true).expect("ignored status");
        assert_eq!(r.status, 3);
        assert!(!r.success());
    }

    #[test]
    fn boxed_runner_delegates() {
        let runner: Box<dyn CommandRunner> = Box::new(ShellRunner);
        assert!(runner.run("true", false).expect("true runs").success());
    }
}
