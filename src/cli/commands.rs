//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::engine::{
    CancellationFlag, DiscoverySummary, EngineError, NoopObserver, RunOptions, RunReport, RunScope, TestController,
    TestTree,
};

use super::reporter::ConsoleReporter;
use super::{CliError, CliResult, ExitCode, WorkspaceArgs};

/// Options of the `run` subcommand beyond the workspace.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub suites: Vec<String>,
    pub tests: Vec<String>,
    pub filter: Option<String>,
    pub stop_on_fail: bool,
    pub verbose: bool,
    pub timeout: Option<u64>,
    pub interpreter: Option<String>,
}

// ============================================================================
// Workspace setup (shared between list and run)
// ============================================================================

/// Canonical workspace roots for the given paths (the current directory when none are given).
pub fn resolve_roots(paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
    let defaults = [PathBuf::from(".")];
    let paths = if paths.is_empty() { &defaults[..] } else { paths };

    paths
        .iter()
        .map(|path| {
            path.canonicalize()
                .map_err(|e| CliError::failure(format!("Error: cannot open '{}': {}", path.display(), e)))
        })
        .collect()
}

/// Directory that relative paths in the output are shown against.
fn display_base(roots: &[PathBuf]) -> PathBuf {
    match roots.first() {
        Some(root) if root.is_file() => root.parent().map(Path::to_path_buf).unwrap_or_default(),
        Some(root) => root.clone(),
        None => PathBuf::new(),
    }
}

/// Load `--config`, or `prologtest.toml` next to the first root.
pub fn load_config(args: &WorkspaceArgs, roots: &[PathBuf]) -> CliResult<Config> {
    let loaded = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::load(&display_base(roots)),
    };
    loaded.map_err(|e| CliError::failure(format!("Error: {}", e)))
}

fn engine_error(err: EngineError) -> CliError {
    CliError::failure(format!("Error: {}", err))
}

// ============================================================================
// list
// ============================================================================

/// Discover tests and print the tree.
pub async fn list(args: &WorkspaceArgs) -> CliResult<ExitCode> {
    let roots = resolve_roots(&args.paths)?;
    let config = load_config(args, &roots)?;
    let controller = TestController::with_defaults(roots.clone(), &config);

    let summary = controller.reload().await.map_err(engine_error)?;
    let tree = controller.snapshot().await;
    controller.dispose().await;

    if args.json {
        let json = serde_json::to_string_pretty(&tree.to_nodes())
            .map_err(|e| CliError::failure(format!("Error serializing test tree: {}", e)))?;
        println!("{}", json);
    } else {
        let base = display_base(&roots);
        print!("{}", render_tree(&tree, &base));
        print!("{}", render_warnings(&summary, &base));
    }
    Ok(ExitCode::SUCCESS)
}

/// Human-readable listing of `tree` with paths relative to `base`.
pub fn render_tree(tree: &TestTree, base: &Path) -> String {
    if tree.is_empty() {
        return "No tests collected\n".to_string();
    }

    let mut out = String::new();
    for suite in tree.suites() {
        let _ = writeln!(
            out,
            "{} ({}:{})",
            suite.name,
            relative(&suite.source_path, base).display(),
            suite.line + 1
        );
        for test in suite.tests() {
            let _ = writeln!(out, "  {} (line {})", test.name, test.line + 1);
        }
    }

    let tests = tree.test_count();
    let suites = tree.suite_count();
    let _ = writeln!(
        out,
        "\n{} test{} in {} suite{}",
        tests,
        if tests == 1 { "" } else { "s" },
        suites,
        if suites == 1 { "" } else { "s" }
    );
    out
}

/// Scan warnings as `warning: path: line N: message` lines.
pub fn render_warnings(summary: &DiscoverySummary, base: &Path) -> String {
    let mut out = String::new();
    for (path, warning) in summary.warnings() {
        let _ = writeln!(out, "warning: {}: {}", relative(path, base).display(), warning);
    }
    out
}

fn relative<'a>(path: &'a Path, base: &Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}

// ============================================================================
// run
// ============================================================================

/// Discover and run tests. Exits 1 when any test failed and 130 when interrupted.
pub async fn run(args: &WorkspaceArgs, request: RunRequest) -> CliResult<ExitCode> {
    let roots = resolve_roots(&args.paths)?;
    let mut config = load_config(args, &roots)?;
    if let Some(secs) = request.timeout {
        config.interpreter.timeout_secs = secs;
    }
    if let Some(program) = request.interpreter.clone() {
        config.interpreter.program = program;
    }
    config.validate().map_err(|e| CliError::failure(format!("Error: {}", e)))?;

    let controller = TestController::with_defaults(roots, &config);
    controller.reload().await.map_err(engine_error)?;
    let scope = select_scope(&controller.snapshot().await, &request.suites, &request.tests)?;

    let cancellation = CancellationFlag::new();
    let interrupt = {
        let flag = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.cancel();
            }
        })
    };

    let options = RunOptions {
        keyword: request.filter.clone(),
        stop_on_failure: request.stop_on_fail,
    };
    let result = if args.json {
        controller.run(&scope, &options, &cancellation, &mut NoopObserver).await
    } else {
        let mut reporter = ConsoleReporter::new(request.verbose);
        controller.run(&scope, &options, &cancellation, &mut reporter).await
    };
    interrupt.abort();
    controller.dispose().await;
    let report = result.map_err(engine_error)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::failure(format!("Error serializing run report: {}", e)))?;
        println!("{}", json);
    }

    match exit_code(&report) {
        ExitCode::SUCCESS => Ok(ExitCode::SUCCESS),
        // Summary already printed
        code => Err(CliError::new("", code)),
    }
}

/// A `-x` stop always follows a failure, so a cancelled run without failures was interrupted.
fn exit_code(report: &RunReport) -> ExitCode {
    if report.failed > 0 {
        ExitCode::FAILURE
    } else if report.cancelled {
        ExitCode::INTERRUPTED
    } else {
        ExitCode::SUCCESS
    }
}

/// Turn `--suite` and `--test` selections into a run scope.
///
/// A suite name selects that unit in every file declaring it. Selections matching nothing are errors.
pub fn select_scope(tree: &TestTree, suites: &[String], tests: &[String]) -> CliResult<RunScope> {
    if suites.is_empty() && tests.is_empty() {
        return Ok(RunScope::All);
    }

    let mut ids = Vec::new();
    for name in suites {
        let before = ids.len();
        ids.extend(
            tree.suites()
                .iter()
                .filter(|suite| &suite.name == name)
                .map(|suite| suite.id.to_string()),
        );
        if ids.len() == before {
            return Err(CliError::failure(format!("Error: no suite named '{}'", name)));
        }
    }

    for selector in tests {
        let Some((suite_name, test_name)) = selector.split_once(':') else {
            return Err(CliError::failure(format!(
                "Error: --test expects SUITE:TEST, got '{}'",
                selector
            )));
        };
        let before = ids.len();
        ids.extend(
            tree.suites()
                .iter()
                .filter(|suite| suite.name == suite_name)
                .flat_map(|suite| suite.tests())
                .filter(|test| test.name == test_name)
                .map(|test| test.id.to_string()),
        );
        if ids.len() == before {
            return Err(CliError::failure(format!("Error: no test named '{}'", selector)));
        }
    }

    Ok(RunScope::Many(ids))
}
