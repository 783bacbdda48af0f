//! Property-based tests for document reconciliation
//!
//! Whatever a document looked like before an edit, reconciling it must leave the same tree as discovering the
//! edited workspace from scratch.

use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use prologtest::config::DiscoveryConfig;
use prologtest::engine::{ChangeReconciler, DiscoveryEngine, FsSourceReader, SharedTree, TestNode};

/// Marker lines over a tiny name pool so units reopen and test names repeat.
fn line_strategy() -> impl Strategy<Value = String> {
    let name = prop::sample::select(vec!["a", "b", "c"]);
    prop_oneof![
        name.clone().prop_map(|n| format!(":- begin_tests({}).", n)),
        name.clone().prop_map(|n| format!(":- end_tests({}).", n)),
        name.prop_map(|n| format!("test({}) :- true.", n)),
        Just(":- begin_tests().".to_string()),
        Just("test(".to_string()),
        Just("helper(X) :- X > 0.".to_string()),
    ]
}

fn document_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(line_strategy(), 0..20).prop_map(|lines| lines.join("\n"))
}

fn engine() -> (SharedTree, Arc<DiscoveryEngine>) {
    let tree: SharedTree = Default::default();
    let engine = DiscoveryEngine::new(Arc::clone(&tree), Arc::new(FsSourceReader), DiscoveryConfig::default());
    (tree, Arc::new(engine))
}

async fn sorted_nodes(tree: &SharedTree) -> Vec<TestNode> {
    let mut nodes = tree.read().await.to_nodes();
    nodes.sort_by(|x, y| x.id.cmp(&y.id));
    nodes
}

proptest! {
    #[test]
    fn reconciled_tree_equals_fresh_discovery(
        before in document_strategy(),
        after in document_strategy(),
        other in document_strategy(),
    ) {
        let edited = Path::new("/ws/edited.pl");
        let untouched = Path::new("/ws/untouched.pl");
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        let (live, fresh) = runtime.block_on(async {
            let (live_tree, live_engine) = engine();
            live_engine.discover_source(edited, &before).await;
            live_engine.discover_source(untouched, &other).await;
            let reconciler = ChangeReconciler::new(Arc::clone(&live_tree), live_engine);
            reconciler.reconcile_source(edited, &after).await;

            let (fresh_tree, fresh_engine) = engine();
            fresh_engine.discover_source(untouched, &other).await;
            fresh_engine.discover_source(edited, &after).await;

            (sorted_nodes(&live_tree).await, sorted_nodes(&fresh_tree).await)
        });

        prop_assert_eq!(live, fresh);
    }
}
