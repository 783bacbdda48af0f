//! Keep the tree in sync with edited documents.
//!
//! A changed document is evicted from the tree and discovered again. The write lock is held from eviction through
//! re-insertion, so readers see either the old or the reconciled state of that document and never a mix.

use std::path::Path;
use std::sync::Arc;

use super::SharedTree;
use super::discovery::{DiscoveryEngine, FileDiscovery, ScannedFile};
use super::error::EngineError;

/// Applies document change notifications to the shared tree.
pub struct ChangeReconciler {
    tree: SharedTree,
    discovery: Arc<DiscoveryEngine>,
}

impl ChangeReconciler {
    pub fn new(tree: SharedTree, discovery: Arc<DiscoveryEngine>) -> Self {
        Self { tree, discovery }
    }

    /// Re-read `path` from its source and rebuild its suites.
    ///
    /// Returns `Ok(None)` for documents that are not test sources. If the document can no longer be read, its
    /// suites stay evicted and the read error is returned.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub async fn on_document_changed(&self, path: &Path) -> Result<Option<FileDiscovery>, EngineError> {
        if !self.discovery.recognizes(path) {
            return Ok(None);
        }

        let mut tree = self.tree.write().await;
        let removed = tree.remove_all_for_document(path);
        tracing::debug!(removed, "evicted suites");

        let scanned = match self.discovery.scan_file(path).await {
            Ok(scanned) => scanned,
            Err(err) => {
                tracing::warn!("{}", err);
                return Err(err);
            }
        };
        Ok(Some(scanned.insert_into(&mut tree)))
    }

    /// Rebuild the suites of `path` from an in-memory buffer.
    #[tracing::instrument(skip_all, fields(path = %path.display()))]
    pub async fn reconcile_source(&self, path: &Path, source: &str) -> Option<FileDiscovery> {
        if !self.discovery.recognizes(path) {
            return None;
        }

        let scanned = ScannedFile::scan(path, source);
        let mut tree = self.tree.write().await;
        let removed = tree.remove_all_for_document(path);
        tracing::debug!(removed, "evicted suites");
        Some(scanned.insert_into(&mut tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscoveryConfig;
    use crate::engine::interfaces::FsSourceReader;
    use crate::engine::tree::TestTree;

    fn reconciler() -> (SharedTree, ChangeReconciler) {
        let tree: SharedTree = Default::default();
        let discovery = Arc::new(DiscoveryEngine::new(
            Arc::clone(&tree),
            Arc::new(FsSourceReader),
            DiscoveryConfig::default(),
        ));
        (Arc::clone(&tree), ChangeReconciler::new(tree, discovery))
    }

    #[tokio::test]
    async fn test_edit_replaces_document_suites() {
        let (tree, reconciler) = reconciler();
        let path = Path::new("/ws/a.pl");
        reconciler
            .reconcile_source(path, ":- begin_tests(old).\ntest(x) :- true.\n:- end_tests(old).\n")
            .await;
        reconciler
            .reconcile_source(path, ":- begin_tests(new).\ntest(y) :- true.\n:- end_tests(new).\n")
            .await;

        let tree = tree.read().await;
        let names: Vec<&str> = tree.suites().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["new"]);
        assert_eq!(tree.test_count(), 1);
    }

    #[tokio::test]
    async fn test_other_documents_are_untouched() {
        let (tree, reconciler) = reconciler();
        reconciler
            .reconcile_source(Path::new("/ws/a.pl"), ":- begin_tests(a).\ntest(x) :- true.\n:- end_tests(a).\n")
            .await;
        reconciler
            .reconcile_source(Path::new("/ws/b.pl"), ":- begin_tests(b).\ntest(y) :- true.\n:- end_tests(b).\n")
            .await;
        reconciler.reconcile_source(Path::new("/ws/a.pl"), "").await;

        let tree = tree.read().await;
        assert_eq!(tree.suite_count(), 1);
        assert_eq!(tree.suites()[0].name, "b");
    }

    #[tokio::test]
    async fn test_unrecognized_documents_are_ignored() {
        let (tree, reconciler) = reconciler();
        let found = reconciler
            .reconcile_source(Path::new("/ws/notes.md"), ":- begin_tests(a).\n:- end_tests(a).\n")
            .await;
        assert!(found.is_none());
        assert!(tree.read().await.is_empty());
        assert!(
            reconciler
                .on_document_changed(Path::new("/ws/notes.md"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_unreadable_document_stays_evicted() {
        let (tree, reconciler) = reconciler();
        let path = Path::new("/definitely/not/here.pl");
        reconciler
            .reconcile_source(path, ":- begin_tests(a).\ntest(x) :- true.\n:- end_tests(a).\n")
            .await;

        let err = reconciler.on_document_changed(path).await.unwrap_err();
        assert!(matches!(err, EngineError::Read { .. }));
        assert_eq!(*tree.read().await, TestTree::new());
    }
}
