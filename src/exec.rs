//! External command execution
//!
//! Every install, sync and toolchain step goes through `CommandRunner`,
//! which lets the sequencer run against a fake runner in tests.

use crate::error::{SetupError, SetupResult};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// A command to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory (inherits when unset)
    pub cwd: Option<PathBuf>,
    /// Capture stdout instead of streaming it
    pub capture_stdout: bool,
    /// Capture stderr instead of streaming it
    pub capture_stderr: bool,
}

impl CommandSpec {
    /// Create a command with arguments
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            capture_stdout: false,
            capture_stderr: false,
        }
    }

    /// Run in `dir`
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Capture both output streams
    pub fn captured(mut self) -> Self {
        self.capture_stdout = true;
        self.capture_stderr = true;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured stdout (empty when streamed)
    pub stdout: String,
    /// Captured stderr (empty when streamed)
    pub stderr: String,
}

/// Abstract command runner
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion. Non-zero exit is an error.
    async fn execute(&self, command: &CommandSpec) -> SetupResult<CommandOutput>;
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn execute(&self, spec: &CommandSpec) -> SetupResult<CommandOutput> {
        info!("Running: {}", spec);

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(ref cwd) = spec.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(if spec.capture_stdout {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        cmd.stderr(if spec.capture_stderr {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });

        let output = cmd
            .output()
            .await
            .map_err(|e| SetupError::command_spawn(spec.to_string(), e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        match output.status.code() {
            Some(0) => {
                debug!("{} exited successfully", spec.program);
                Ok(CommandOutput { stdout, stderr })
            }
            Some(code) => Err(SetupError::CommandFailed {
                command: spec.to_string(),
                code,
            }),
            None => Err(SetupError::ProcessSignaled(spec.to_string())),
        }
    }
}
