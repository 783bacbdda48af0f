//! Test execution: expand a run scope into work items and run each test in its own interpreter process.
//!
//! ## Notes
//!
//! - The tree is only read while the scope is expanded. No lock is held while an interpreter runs, so documents can
//!   be reconciled during a long run.
//! - Tests run strictly one after another. Cancellation is checked before each test; tests not reached get no
//!   verdict.
//! - One failing, hanging or crashing test never aborts the run. Every problem becomes a failed [`Outcome`].

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use super::SharedTree;
use super::classify::{Outcome, classify};
use super::error::ProcessFailure;
use super::interfaces::{Invocation, ProcessLauncher};
use super::tree::{Node, Suite, SuiteId, TestId, TestTree};

// ============================================================================
// Run requests
// ============================================================================

/// What a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
    /// Every test in the tree, in tree order.
    All,
    /// Every test of one suite.
    Suite(SuiteId),
    /// A single test.
    Test(TestId),
    /// Several serialized node identifiers, suites or tests, in request order.
    Many(Vec<String>),
}

/// Cooperative cancellation shared between a run and whoever may stop it.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Optional narrowing of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Only run tests whose `suite:test` label contains this text.
    pub keyword: Option<String>,
    /// Raise the run's cancellation flag after the first failure.
    pub stop_on_failure: bool,
}

/// One `(suite, test)` pair to execute, detached from the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: TestId,
    pub suite: String,
    pub test: String,
    pub source_path: PathBuf,
}

impl WorkItem {
    /// `suite:test`, the way plunit names a test.
    pub fn label(&self) -> String {
        format!("{}:{}", self.suite, self.test)
    }

    fn invocation(&self) -> Invocation {
        Invocation::for_test(&self.source_path, &self.suite, &self.test)
    }
}

// ============================================================================
// Observation
// ============================================================================

/// Receives run progress, typically to forward it to a host.
///
/// Every method has an empty default so observers only implement what they show.
pub trait RunObserver: Send {
    fn on_run_start(&mut self, _total: usize) {}

    fn on_test_started(&mut self, _item: &WorkItem) {}

    fn on_test_finished(&mut self, _item: &WorkItem, _outcome: &Outcome) {}

    fn on_run_complete(&mut self, _report: &RunReport) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Lifecycle of one test inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestState {
    Queued,
    Started,
    Passed,
    Failed,
}

impl TestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TestState::Passed | TestState::Failed)
    }
}

/// Per-test states of a run in progress.
///
/// A test moves `Queued -> Started -> Passed | Failed`; a terminal state is never overwritten.
#[derive(Debug, Clone, Default)]
pub struct RunSession {
    states: Vec<(TestId, TestState)>,
}

impl RunSession {
    pub fn new(items: &[WorkItem]) -> Self {
        Self {
            states: items.iter().map(|item| (item.id.clone(), TestState::Queued)).collect(),
        }
    }

    pub fn state(&self, id: &TestId) -> Option<TestState> {
        self.states.iter().find(|(known, _)| known == id).map(|(_, state)| *state)
    }

    /// Mark `id` as started. Returns `false` if it is unknown or already past `Queued`.
    pub fn start(&mut self, id: &TestId) -> bool {
        self.transition(id, TestState::Started, |state| state == TestState::Queued)
    }

    /// Record the verdict for `id`. Returns `false` if it already has one.
    pub fn finish(&mut self, id: &TestId, outcome: &Outcome) -> bool {
        let next = if outcome.is_passed() {
            TestState::Passed
        } else {
            TestState::Failed
        };
        self.transition(id, next, |state| !state.is_terminal())
    }

    /// Tests that never received a verdict.
    pub fn unfinished(&self) -> usize {
        self.states.iter().filter(|(_, state)| !state.is_terminal()).count()
    }

    fn transition(&mut self, id: &TestId, next: TestState, allowed: impl Fn(TestState) -> bool) -> bool {
        match self.states.iter_mut().find(|(known, _)| known == id) {
            Some((_, state)) if allowed(*state) => {
                *state = next;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Reports
// ============================================================================

/// Verdict of one executed test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRunResult {
    pub id: TestId,
    pub suite: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Summary of a whole run. Always produced, also for cancelled runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub passed: usize,
    pub failed: usize,
    /// `suite:test: message` for every failed test, in run order.
    pub failures: Vec<String>,
    pub results: Vec<TestRunResult>,
    pub cancelled: bool,
    /// Tests in scope that were never reached.
    pub not_run: usize,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, item: &WorkItem, outcome: Outcome) {
        match &outcome {
            Outcome::Passed => self.passed += 1,
            Outcome::Failed { message } => {
                self.failed += 1;
                self.failures.push(format!("{}: {}", item.label(), message));
            }
        }
        self.results.push(TestRunResult {
            id: item.id.clone(),
            suite: item.suite.clone(),
            name: item.test.clone(),
            outcome,
        });
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Runs tests from the shared tree through a [`ProcessLauncher`].
pub struct ExecutionEngine {
    tree: SharedTree,
    launcher: Arc<dyn ProcessLauncher>,
}

impl ExecutionEngine {
    pub fn new(tree: SharedTree, launcher: Arc<dyn ProcessLauncher>) -> Self {
        Self { tree, launcher }
    }

    /// Expand `scope` into owned work items under a short read lock.
    pub async fn plan(&self, scope: &RunScope, options: &RunOptions) -> Vec<WorkItem> {
        let tree = self.tree.read().await;
        let mut items = expand_scope(&tree, scope);
        if let Some(keyword) = options.keyword.as_deref() {
            items.retain(|item| item.label().contains(keyword));
        }
        items
    }

    /// Run every test in `scope` sequentially.
    #[tracing::instrument(skip_all, fields(scope = ?scope))]
    pub async fn run(
        &self,
        scope: &RunScope,
        options: &RunOptions,
        cancellation: &CancellationFlag,
        observer: &mut dyn RunObserver,
    ) -> RunReport {
        let items = self.plan(scope, options).await;
        let mut session = RunSession::new(&items);
        let mut report = RunReport::default();
        observer.on_run_start(items.len());

        for item in &items {
            if cancellation.is_cancelled() {
                report.cancelled = true;
                break;
            }

            session.start(&item.id);
            observer.on_test_started(item);
            tracing::debug!(test = %item.label(), "running test");

            let outcome = self.run_one(item).await;
            if session.finish(&item.id, &outcome) {
                observer.on_test_finished(item, &outcome);
                let failed = !outcome.is_passed();
                report.record(item, outcome);
                if failed && options.stop_on_failure {
                    cancellation.cancel();
                }
            }
        }

        report.not_run = session.unfinished();
        tracing::info!(
            passed = report.passed,
            failed = report.failed,
            not_run = report.not_run,
            cancelled = report.cancelled,
            "run finished"
        );
        observer.on_run_complete(&report);
        report
    }

    /// Launch one test in a separate task so a panicking launcher only fails that test.
    async fn run_one(&self, item: &WorkItem) -> Outcome {
        let launcher = Arc::clone(&self.launcher);
        let invocation = item.invocation();
        let task = tokio::spawn(async move { launcher.launch(&invocation).await });

        match task.await {
            Ok(Ok(output)) => classify(&output),
            Ok(Err(failure)) => {
                tracing::warn!(test = %item.label(), "{}", failure);
                failure.into()
            }
            Err(join) => {
                tracing::warn!(test = %item.label(), "launcher task failed: {}", join);
                ProcessFailure::Panicked(join.to_string()).into()
            }
        }
    }
}

fn expand_scope(tree: &TestTree, scope: &RunScope) -> Vec<WorkItem> {
    let mut items = Vec::new();
    match scope {
        RunScope::All => {
            for suite in tree.suites() {
                push_suite(&mut items, suite);
            }
        }
        RunScope::Suite(id) => match tree.suite(id) {
            Some(suite) => push_suite(&mut items, suite),
            None => tracing::warn!("unknown suite `{}`", id),
        },
        RunScope::Test(id) => match tree.test(id) {
            Some((test, suite)) => items.push(work_item(suite, &test.id, &test.name)),
            None => tracing::warn!("unknown test `{}`", id),
        },
        RunScope::Many(ids) => {
            for id in ids {
                match tree.node(id) {
                    Some(Node::Suite(suite)) => push_suite(&mut items, suite),
                    Some(Node::Test { test, suite }) => items.push(work_item(suite, &test.id, &test.name)),
                    None => tracing::warn!("unknown test item `{}`", id),
                }
            }
            let mut seen = HashSet::new();
            items.retain(|item| seen.insert(item.id.clone()));
        }
    }
    items
}

fn push_suite(items: &mut Vec<WorkItem>, suite: &Suite) {
    items.extend(suite.tests().iter().map(|test| work_item(suite, &test.id, &test.name)));
}

fn work_item(suite: &Suite, id: &TestId, name: &str) -> WorkItem {
    WorkItem {
        id: id.clone(),
        suite: suite.name.clone(),
        test: name.to_string(),
        source_path: suite.source_path.clone(),
    }
}
