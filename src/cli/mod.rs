//! CLI module for prologtest
//!
//! This module provides the command-line interface to the test engine.
//!
//! ## Commands
//!
//! - `list [PATH...]` - Discover and print suites and tests
//! - `run [PATH...]` - Run tests (pytest-style output)
//!
//! ## Modules
//!
//! - `commands` - Command implementations
//! - `reporter` - Console and JSON run output
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;
pub mod reporter;

use std::fmt;
use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};

use crate::version::PROLOGTEST_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
    /// Run interrupted with Ctrl-C (128 + SIGINT).
    pub const INTERRUPTED: ExitCode = ExitCode(130);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Discover and run plunit tests
#[derive(Parser, Debug)]
#[command(name = "prologtest")]
#[command(version = PROLOGTEST_VERSION)]
#[command(about = "Discover and run plunit tests with SWI-Prolog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct WorkspaceArgs {
    /// Files or directories to scan (default: current directory)
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Configuration file (default: prologtest.toml in the first path)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover and print suites and tests
    List {
        #[command(flatten)]
        workspace: WorkspaceArgs,
    },

    /// Run tests (pytest-style)
    Run {
        #[command(flatten)]
        workspace: WorkspaceArgs,
        /// Only run this suite (repeatable)
        #[arg(short = 's', long = "suite", value_name = "SUITE")]
        suites: Vec<String>,
        /// Only run this test, written as SUITE:TEST (repeatable)
        #[arg(short = 't', long = "test", value_name = "SUITE:TEST")]
        tests: Vec<String>,
        /// Filter tests by keyword
        #[arg(short = 'k', value_name = "KEYWORD")]
        filter: Option<String>,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        stop_on_fail: bool,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Per-test timeout in seconds (0 disables it)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
        /// Interpreter to run tests with
        #[arg(long, value_name = "PROGRAM")]
        interpreter: Option<String>,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::failure(format!("Error starting async runtime: {}", e)))?;

    match cli.command {
        Command::List { workspace } => runtime.block_on(commands::list(&workspace)),
        Command::Run {
            workspace,
            suites,
            tests,
            filter,
            stop_on_fail,
            verbose,
            timeout,
            interpreter,
        } => {
            let request = commands::RunRequest {
                suites,
                tests,
                filter,
                stop_on_fail,
                verbose,
                timeout,
                interpreter,
            };
            runtime.block_on(commands::run(&workspace, request))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
