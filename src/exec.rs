//! Subprocess execution: the [`Executor`] trait, its system implementation,
//! and the shared cancellation scope.
//!
//! Decision logic elsewhere in the crate only *builds* commands; everything
//! that actually spawns a process goes through an [`Executor`] so tests can
//! substitute a mock and never touch the real system.
use std::fmt;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// Poll interval while waiting on an interactive child process.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured standard output (empty for interactive runs).
    pub stdout: String,
    /// Captured standard error (empty for interactive runs).
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Raw exit code, if the process exited normally.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Shared cancellation scope for a batch of subprocess executions.
///
/// One scope is created per run and handed to every executor, so a single
/// external interrupt (Ctrl-C) cancels the whole in-flight batch rather than
/// only the currently-running child.
#[derive(Debug, Clone, Default)]
pub struct CancelScope {
    flag: Arc<AtomicBool>,
}

impl CancelScope {
    /// Create a fresh, un-cancelled scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the scope as cancelled.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Wire this scope to the process Ctrl-C handler.
    ///
    /// May only be called once per process (the handler slot is global).
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be installed.
    pub fn install_ctrlc_handler(&self) -> Result<()> {
        let flag = Arc::clone(&self.flag);
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::SeqCst);
        })
        .context("installing Ctrl-C handler")?;
        Ok(())
    }
}

/// Abstraction over subprocess execution.
///
/// [`SystemExecutor`] spawns real processes; tests substitute mocks that
/// script responses and record invocations.
pub trait Executor: fmt::Debug + Send + Sync {
    /// Run a command with captured output, failing if it exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command with captured output, allowing non-zero exits.
    ///
    /// # Errors
    ///
    /// Returns an error only if the command cannot be spawned at all.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command with inherited standard streams.
    ///
    /// Used for real installations where the package manager's own progress
    /// output should reach the operator's terminal. Honors the cancellation
    /// scope: a cancelled scope kills the child and returns an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be spawned or the batch has
    /// been cancelled.
    fn run_interactive(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;
}

/// Executor backed by real subprocesses.
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor {
    cancel: CancelScope,
}

impl SystemExecutor {
    /// Create an executor bound to the given cancellation scope.
    #[must_use]
    pub fn new(cancel: CancelScope) -> Self {
        Self { cancel }
    }

    /// The cancellation scope this executor observes.
    #[must_use]
    pub fn cancel_scope(&self) -> &CancelScope {
        &self.cancel
    }
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        let result = ExecResult::from(output);
        if !result.success {
            bail!(
                "{program} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.stderr.trim()
            );
        }
        Ok(result)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn run_interactive(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        if self.cancel.is_cancelled() {
            bail!("{program} cancelled");
        }
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("failed to execute: {program}"))?;

        loop {
            if self.cancel.is_cancelled() {
                child.kill().ok();
                child.wait().ok();
                bail!("{program} cancelled");
            }
            match child.try_wait() {
                Ok(Some(status)) => {
                    return Ok(ExecResult {
                        stdout: String::new(),
                        stderr: String::new(),
                        success: status.success(),
                        code: status.code(),
                    });
                }
                Ok(None) => std::thread::sleep(WAIT_POLL),
                Err(e) => {
                    child.kill().ok();
                    child.wait().ok();
                    return Err(e).with_context(|| format!("waiting on {program}"));
                }
            }
        }
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}
