//! The service object hosts talk to.
//!
//! A [`TestController`] owns the shared tree and wires discovery, reconciliation and execution to the injected
//! [`SourceReader`] and [`ProcessLauncher`]. Hosts (the CLI, the language server) create one per workspace and
//! call [`TestController::dispose`] when they shut down.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::SharedTree;
use super::discovery::{DiscoveryEngine, DiscoverySummary, FileDiscovery};
use super::error::EngineError;
use super::execution::{CancellationFlag, ExecutionEngine, RunObserver, RunOptions, RunReport, RunScope};
use super::interfaces::{FsSourceReader, InterpreterLauncher, ProcessLauncher, SourceReader};
use super::reconcile::ChangeReconciler;
use super::tree::{Node, TestNode, TestTree};
use crate::config::Config;

pub struct TestController {
    roots: Vec<PathBuf>,
    tree: SharedTree,
    discovery: Arc<DiscoveryEngine>,
    reconciler: ChangeReconciler,
    execution: ExecutionEngine,
    /// Whether the workspace has been discovered. Held while discovering so it runs once.
    discovered: tokio::sync::Mutex<bool>,
    /// Buffers edited before the first discovery, applied over the disk content once it ran.
    early_buffers: Mutex<HashMap<PathBuf, String>>,
    /// Held for the whole of a run: one interpreter process at a time across concurrent requests.
    run_guard: tokio::sync::Mutex<()>,
    disposed: AtomicBool,
    active_run: Mutex<Option<CancellationFlag>>,
}

impl TestController {
    pub fn new(
        roots: Vec<PathBuf>,
        config: &Config,
        reader: Arc<dyn SourceReader>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        let tree: SharedTree = Arc::new(tokio::sync::RwLock::new(TestTree::new()));
        let discovery = Arc::new(DiscoveryEngine::new(Arc::clone(&tree), reader, config.discovery.clone()));
        Self {
            roots,
            reconciler: ChangeReconciler::new(Arc::clone(&tree), Arc::clone(&discovery)),
            execution: ExecutionEngine::new(Arc::clone(&tree), launcher),
            discovery,
            tree,
            discovered: tokio::sync::Mutex::new(false),
            early_buffers: Mutex::new(HashMap::new()),
            run_guard: tokio::sync::Mutex::new(()),
            disposed: AtomicBool::new(false),
            active_run: Mutex::new(None),
        }
    }

    /// Controller reading from disk and running the configured interpreter.
    pub fn with_defaults(roots: Vec<PathBuf>, config: &Config) -> Self {
        let launcher = InterpreterLauncher::from_config(&config.interpreter);
        Self::new(roots, config, Arc::new(FsSourceReader), Arc::new(launcher))
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Whether `path` is a document the controller tracks.
    pub fn recognizes(&self, path: &Path) -> bool {
        self.discovery.recognizes(path)
    }

    /// Children of a node: the root suites when `id` is `None`, a suite's tests, or nothing for a test.
    ///
    /// The first root request discovers the whole workspace. Unknown identifiers resolve to no children.
    pub async fn resolve(&self, id: Option<&str>) -> Result<Vec<TestNode>, EngineError> {
        self.ensure_live()?;
        self.ensure_discovered().await;

        let tree = self.tree.read().await;
        Ok(match id {
            None => tree.to_nodes(),
            Some(id) => match tree.node(id) {
                Some(Node::Suite(suite)) => suite.tests().iter().map(TestNode::from_test).collect(),
                Some(Node::Test { .. }) => Vec::new(),
                None => {
                    tracing::debug!("resolve of unknown node `{}`", id);
                    Vec::new()
                }
            },
        })
    }

    /// Forget the whole tree and discover every workspace root again.
    pub async fn reload(&self) -> Result<DiscoverySummary, EngineError> {
        self.ensure_live()?;
        let mut discovered = self.discovered.lock().await;
        let summary = self.discover_workspace().await;
        *discovered = true;
        Ok(summary)
    }

    /// Run `scope`. `cancellation` becomes the active run's flag, so [`TestController::cancel`] stops this run.
    ///
    /// Runs are serialized: a second request waits until the first one has finished.
    pub async fn run(
        &self,
        scope: &RunScope,
        options: &RunOptions,
        cancellation: &CancellationFlag,
        observer: &mut dyn RunObserver,
    ) -> Result<RunReport, EngineError> {
        self.ensure_live()?;
        self.ensure_discovered().await;

        let _running = self.run_guard.lock().await;
        self.set_active_run(Some(cancellation.clone()));
        let report = self.execution.run(scope, options, cancellation, observer).await;
        self.set_active_run(None);
        Ok(report)
    }

    /// Raise the cancellation flag of the active run, if any. Returns whether a run was active.
    pub fn cancel(&self) -> bool {
        let active = self.active_run.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match active.as_ref() {
            Some(flag) => {
                flag.cancel();
                true
            }
            None => false,
        }
    }

    /// A document changed on disk.
    pub async fn on_document_changed(&self, path: &Path) -> Result<Option<FileDiscovery>, EngineError> {
        self.ensure_live()?;
        let discovered = self.discovered.lock().await;
        if !*discovered {
            self.early_buffers().remove(path);
        }
        drop(discovered);
        self.reconciler.on_document_changed(path).await
    }

    /// A document was edited in memory.
    ///
    /// Edits that arrive before the first discovery survive it: the buffer replaces what discovery reads from disk.
    pub async fn on_document_edited(&self, path: &Path, source: &str) -> Result<Option<FileDiscovery>, EngineError> {
        self.ensure_live()?;
        let discovered = self.discovered.lock().await;
        if !*discovered && self.recognizes(path) {
            self.early_buffers().insert(path.to_path_buf(), source.to_string());
        }
        drop(discovered);
        Ok(self.reconciler.reconcile_source(path, source).await)
    }

    /// Copy of the current tree.
    pub async fn snapshot(&self) -> TestTree {
        self.tree.read().await.clone()
    }

    /// Stop the active run, drop the tree and refuse further requests.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel();
        self.tree.write().await.clear();
        tracing::debug!("test controller disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.is_disposed() {
            Err(EngineError::Disposed)
        } else {
            Ok(())
        }
    }

    async fn ensure_discovered(&self) {
        let mut discovered = self.discovered.lock().await;
        if !*discovered {
            self.discover_workspace().await;
            *discovered = true;
        }
    }

    /// Clear the tree, discover every root and apply the buffers edited before the first discovery.
    async fn discover_workspace(&self) -> DiscoverySummary {
        self.tree.write().await.clear();
        let summary = self.discovery.discover_all(&self.roots).await;
        let buffers = std::mem::take(&mut *self.early_buffers());
        for (path, source) in &buffers {
            self.reconciler.reconcile_source(path, source).await;
        }
        summary
    }

    fn early_buffers(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, String>> {
        self.early_buffers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_active_run(&self, flag: Option<CancellationFlag>) {
        let mut active = self.active_run.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *active = flag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execution::NoopObserver;

    const SOURCE: &str = ":- begin_tests(arithmetic).\ntest(addition) :- 1 + 1 =:= 2.\n:- end_tests(arithmetic).\n";

    fn controller_for(dir: &Path) -> TestController {
        TestController::with_defaults(vec![dir.to_path_buf()], &Config::default())
    }

    #[tokio::test]
    async fn test_resolve_discovers_lazily() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("math.pl"), SOURCE).unwrap();
        let controller = controller_for(dir.path());

        assert!(controller.snapshot().await.is_empty());
        let roots = controller.resolve(None).await.unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].label, "arithmetic");

        let children = controller.resolve(Some(&roots[0].id)).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].label, "addition");
        assert!(controller.resolve(Some(&children[0].id)).await.unwrap().is_empty());
        assert!(controller.resolve(Some("suite:/nowhere.pl:x")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reload_does_not_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("math.pl"), SOURCE).unwrap();
        let controller = controller_for(dir.path());

        controller.resolve(None).await.unwrap();
        let summary = controller.reload().await.unwrap();
        assert_eq!(summary.test_count(), 1);
        assert_eq!(controller.snapshot().await.test_count(), 1);
    }

    #[tokio::test]
    async fn test_dispose_refuses_requests() {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_for(dir.path());
        controller.dispose().await;

        assert!(controller.is_disposed());
        assert!(matches!(controller.resolve(None).await, Err(EngineError::Disposed)));
        assert!(matches!(controller.reload().await, Err(EngineError::Disposed)));
        let result = controller
            .run(&RunScope::All, &RunOptions::default(), &CancellationFlag::new(), &mut NoopObserver)
            .await;
        assert!(matches!(result, Err(EngineError::Disposed)));
    }

    #[test]
    fn test_cancel_without_active_run() {
        let controller = TestController::with_defaults(Vec::new(), &Config::default());
        assert!(!controller.cancel());
    }
}
