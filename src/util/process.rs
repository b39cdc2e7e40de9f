//! External command seam.
//!
//! Every hard operation here is delegated to an existing tool (`virsh`,
//! `virt-install`, `ansible-vault`, `ansible-playbook`, `ssh`), so the one
//! trait the whole pipeline shares is "run a command". Stages take
//! `&dyn CommandRunner`, which keeps them testable with a scripted runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::errors::{ForgeError, ForgeResult};

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convenience constructor for scripted runners in tests.
    pub fn ok(stdout: &str) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Convenience constructor for a failing command.
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Runs external commands on behalf of the pipeline stages.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion with captured stdout/stderr.
    async fn run(&self, program: &str, args: &[&str]) -> ForgeResult<CommandOutput>;

    /// Run to completion with inherited stdio, for long operations whose
    /// output the operator must see (installer, convergence engine).
    /// Returns the exit code, `None` on signal death.
    async fn run_streamed(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> ForgeResult<Option<i32>>;
}

/// Production runner backed by `tokio::process`.
pub struct HostRunner;

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, program: &str, args: &[&str]) -> ForgeResult<CommandOutput> {
        tracing::debug!(program, ?args, "running command");
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ForgeError::Launch(format!("{program}: {e}")))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_streamed(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> ForgeResult<Option<i32>> {
        tracing::debug!(program, ?args, ?cwd, "running command (streamed)");
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let status = cmd
            .status()
            .await
            .map_err(|e| ForgeError::Launch(format!("{program}: {e}")))?;
        Ok(status.code())
    }
}

/// Locate an executable on PATH.
pub fn find_binary(name: &str) -> ForgeResult<PathBuf> {
    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(ForgeError::MissingDependency(name.to_string()))
}
