//! I/O boundary interfaces for the engine
//!
//! This module defines trait-based abstractions for the two operations that leave the process:
//! - Source reading (file content for discovery)
//! - Interpreter invocation (one `swipl` process per test)
//!
//! The controller receives both as injected collaborators, which allows for:
//! - Reading unsaved editor buffers instead of the disk
//! - Stand-in interpreters in tests
//!
//! Default implementations talk to the file system and spawn real processes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::error::ProcessFailure;
use crate::config::InterpreterConfig;

/// Maximum source file size (100 MB)
///
/// Larger files are refused instead of being loaded into memory for a marker scan.
const MAX_SOURCE_SIZE: u64 = 100 * 1024 * 1024;

// ============================================================================
// Source Reader Interface
// ============================================================================

/// Read the text of a source document.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn read_source(&self, path: &Path) -> std::io::Result<String>;
}

/// Reads sources from the file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsSourceReader;

#[async_trait]
impl SourceReader for FsSourceReader {
    async fn read_source(&self, path: &Path) -> std::io::Result<String> {
        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > MAX_SOURCE_SIZE {
            return Err(std::io::Error::other(format!(
                "file is too large ({} bytes, max {} bytes)",
                metadata.len(),
                MAX_SOURCE_SIZE
            )));
        }
        tokio::fs::read_to_string(path).await
    }
}

// ============================================================================
// Process Launcher Interface
// ============================================================================

/// One interpreter run: load `source_path`, then prove `goal`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub source_path: PathBuf,
    pub goal: String,
}

impl Invocation {
    /// Invocation running exactly `suite:test` and halting.
    pub fn for_test(source_path: &Path, suite: &str, test: &str) -> Self {
        Self {
            source_path: source_path.to_path_buf(),
            goal: format!("run_tests({}:{}),halt", suite, test),
        }
    }
}

/// Captured result of a finished interpreter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, or `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Standard output followed by standard error.
    pub text: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Start the interpreter and wait for it to exit.
///
/// Implementations must not return before the process has exited and its output is fully captured.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessFailure>;
}

/// Spawns the configured interpreter (`swipl` by default) as
/// `<program> [args...] -s <file> -g <goal>`.
#[derive(Debug, Clone)]
pub struct InterpreterLauncher {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl InterpreterLauncher {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    pub fn from_config(config: &InterpreterConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    /// Arguments placed before the `-s <file> -g <goal>` pair.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn command(&self, invocation: &Invocation) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("-s")
            .arg(&invocation.source_path)
            .arg("-g")
            .arg(&invocation.goal)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl ProcessLauncher for InterpreterLauncher {
    async fn launch(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessFailure> {
        let child = self.command(invocation).spawn().map_err(|source| ProcessFailure::Spawn {
            program: self.program.clone(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let wait = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| ProcessFailure::TimedOut { limit })?,
            None => wait.await,
        }
        .map_err(ProcessFailure::Io)?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            text: format!("{}\n{}", stdout, stderr),
        })
    }
}
