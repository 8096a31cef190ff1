// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed catalog fixture and a scripted
// executor so each integration test can set up an isolated environment
// without repeating boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]
#![allow(clippy::expect_used)]

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use provision_cli::exec::{ExecResult, Executor};

/// A catalog exercising every entry shape: nested applications, flat
/// entries, filters, manager polymorphism, and custom/url fallbacks.
pub const SAMPLE_CATALOG: &str = "\
version: 1
install:
  manager_priority: [pacman]
applications:
  - name: editors
    filters:
      - include:
          os: linux|darwin
    entries:
      - name: neovim
        description: hyperextensible text editor
        managers:
          pacman:
            name: neovim
            deps: [gcc]
          apt: neovim
          brew: neovim
      - name: nvim-config
        managers:
          git:
            url: https://example.com/nvim-config.git
            branch: main
            targets:
              linux: /tmp/provision-test/nvim
              darwin: /tmp/provision-test/nvim
entries:
  - name: bash
    backup: bash
    targets:
      linux: ~/.bashrc
  - name: rustup
    managers:
      installer:
        command:
          linux: curl -fsSL https://sh.rustup.rs | sh -s -- -y
          darwin: curl -fsSL https://sh.rustup.rs | sh -s -- -y
        binary: rustup
  - name: scratch
    custom:
      linux: make -C /tmp/scratch install
      darwin: make -C /tmp/scratch install
      windows: scripts\\install.ps1
";

/// Write a catalog file into a fresh temporary directory.
pub fn write_catalog(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("catalog.yaml");
    std::fs::write(&path, content).expect("write catalog fixture");
    (dir, path)
}

/// A scripted executor for integration tests.
///
/// Responses are consumed FIFO by every run-style call; an exhausted queue
/// yields a failed "unexpected call" response. `which` answers from a fixed
/// set of program names.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: Mutex<VecDeque<(bool, String)>>,
    available: HashSet<String>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
    count: AtomicUsize,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: Vec<(bool, String)>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_available(mut self, programs: &[&str]) -> Self {
        self.available = programs.iter().map(ToString::to_string).collect();
        self
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn recorded_calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn next(&self, program: &str, args: &[&str]) -> ExecResult {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().expect("calls lock").push((
            program.to_string(),
            args.iter().map(ToString::to_string).collect(),
        ));
        let (success, stdout) = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or((false, "unexpected call".to_string()));
        ExecResult {
            stdout,
            stderr: String::new(),
            success,
            code: Some(i32::from(!success)),
        }
    }
}

impl Executor for ScriptedExecutor {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        let result = self.next(program, args);
        if result.success {
            Ok(result)
        } else {
            anyhow::bail!("scripted command failed")
        }
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        Ok(self.next(program, args))
    }

    fn run_interactive(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        Ok(self.next(program, args))
    }

    fn which(&self, program: &str) -> bool {
        self.available.contains(program)
    }
}
