//! Command execution module.
//!
//! Handles spawning shell processes and capturing output. Every external
//! command a workflow runs goes through the [`CommandRunner`] trait, so
//! tests can substitute a scripted runner for the real shell.

use std::collections::HashMap;
use std::path::Path;
use std::process::{Command as ProcessCommand, Stdio};
use std::time::{Duration, Instant};

use crate::core::error::Result;

/// Result of executing a command.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Whether the command exited with status zero
    pub success: bool,

    /// Exit code, if the process exited normally
    pub code: Option<i32>,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,

    /// Time taken to execute
    pub duration: Duration,
}

impl ExecutionResult {
    /// Stdout followed by stderr, in capture order.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Abstraction over shell execution.
///
/// The runner captures all output; nothing is streamed to the terminal.
/// Implementations report spawn failures through the error channel and
/// nonzero exits through [`ExecutionResult::success`].
pub trait CommandRunner {
    /// Run `command` through the platform shell in `dir`, with `env`
    /// layered over the ambient environment.
    fn run(&self, command: &str, dir: &Path, env: &HashMap<String, String>)
        -> Result<ExecutionResult>;
}

/// Command runner backed by the real platform shell.
#[derive(Debug, Default)]
pub struct ShellRunner;

impl ShellRunner {
    /// Create a new shell runner.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &str,
        dir: &Path,
        env: &HashMap<String, String>,
    ) -> Result<ExecutionResult> {
        let start = Instant::now();

        let (shell, shell_arg) = get_shell();

        let mut cmd = ProcessCommand::new(shell);
        cmd.arg(shell_arg);
        cmd.arg(command);
        cmd.current_dir(dir);

        for (key, value) in env {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());

        let output = cmd.output()?;

        let duration = start.elapsed();

        Ok(ExecutionResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration,
        })
    }
}

/// Get the shell and argument for the current platform.
fn get_shell() -> (&'static str, &'static str) {
    if cfg!(target_os = "windows") {
        ("cmd", "/C")
    } else {
        ("sh", "-c")
    }
}
