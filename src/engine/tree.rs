//! In-memory test tree: suites own their tests, both keyed by stable identifiers.
//!
//! ## Identifiers
//!
//! - Suites are keyed by `(source path, suite name)` and serialize as `suite:<path>:<name>`.
//! - Tests are keyed by `(source path, test name)` and serialize as `test:<path>:<name>`. Line numbers are not part
//!   of the key, so a test keeps its identity when edits above it shift its line.
//! - When a file declares the same test name twice, later occurrences get an ordinal suffix (`#2`, `#3`, ...) on
//!   the identifier only. Their display name and the goal used to run them are unchanged.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

const SUITE_PREFIX: &str = "suite:";
const TEST_PREFIX: &str = "test:";

/// Errors raised by tree mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("duplicate identifier `{0}`")]
    DuplicateKey(String),

    #[error("unknown suite `{0}`")]
    UnknownSuite(String),
}

/// Serialized identifier of a suite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SuiteId(String);

impl SuiteId {
    pub fn new(source_path: &Path, name: &str) -> Self {
        Self(format!("{}{}:{}", SUITE_PREFIX, source_path.display(), name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SuiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serialized identifier of a test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    pub fn new(source_path: &Path, name: &str) -> Self {
        Self::with_ordinal(source_path, name, 1)
    }

    /// Identifier of the `ordinal`-th test named `name` in `source_path` (1-based).
    pub fn with_ordinal(source_path: &Path, name: &str, ordinal: usize) -> Self {
        let base = format!("{}{}:{}", TEST_PREFIX, source_path.display(), name);
        if ordinal > 1 {
            Self(format!("{}#{}", base, ordinal))
        } else {
            Self(base)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single plunit test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Test {
    pub id: TestId,
    /// Literal argument text of the `test(...)` marker.
    pub name: String,
    pub source_path: PathBuf,
    /// Zero-based line of the marker, used for navigation only.
    pub line: usize,
    /// Owning suite.
    pub suite: SuiteId,
}

/// A plunit unit (`begin_tests` ... `end_tests`) and the tests declared inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suite {
    pub id: SuiteId,
    pub name: String,
    pub source_path: PathBuf,
    /// Zero-based line of the `begin_tests` marker.
    pub line: usize,
    tests: Vec<Test>,
}

impl Suite {
    /// Tests in discovery order.
    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn test(&self, id: &TestId) -> Option<&Test> {
        self.tests.iter().find(|t| &t.id == id)
    }

    /// Suites always expose a (possibly empty) list of children.
    pub fn can_resolve_children(&self) -> bool {
        true
    }
}

/// A tree entry looked up by its serialized identifier.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Suite(&'a Suite),
    Test { test: &'a Test, suite: &'a Suite },
}

/// Hierarchy of suites and tests for a whole workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestTree {
    suites: Vec<Suite>,
}

impl TestTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new, empty suite.
    ///
    /// ## Errors
    /// Returns [`TreeError::DuplicateKey`] if a suite with the same `(source path, name)` already exists.
    pub fn add_suite(&mut self, name: &str, source_path: &Path, line: usize) -> Result<&Suite, TreeError> {
        let id = SuiteId::new(source_path, name);
        if self.suite(&id).is_some() {
            return Err(TreeError::DuplicateKey(id.0));
        }
        self.suites.push(Suite {
            id,
            name: name.to_string(),
            source_path: source_path.to_path_buf(),
            line,
            tests: Vec::new(),
        });
        let index = self.suites.len() - 1;
        Ok(&self.suites[index])
    }

    /// Insert a test under `suite` with an explicit identifier.
    ///
    /// ## Errors
    /// - [`TreeError::UnknownSuite`] if `suite` is not in the tree.
    /// - [`TreeError::DuplicateKey`] if any suite already holds a test with identifier `id`.
    pub fn add_test_with_id(
        &mut self,
        suite: &SuiteId,
        id: TestId,
        name: &str,
        source_path: &Path,
        line: usize,
    ) -> Result<&Test, TreeError> {
        if self.contains_test(&id) {
            return Err(TreeError::DuplicateKey(id.0));
        }
        let owner = self
            .suites
            .iter_mut()
            .find(|s| &s.id == suite)
            .ok_or_else(|| TreeError::UnknownSuite(suite.0.clone()))?;
        owner.tests.push(Test {
            id,
            name: name.to_string(),
            source_path: source_path.to_path_buf(),
            line,
            suite: suite.clone(),
        });
        let index = owner.tests.len() - 1;
        Ok(&owner.tests[index])
    }

    /// Insert a test under `suite`, keyed by `(source path, name)`.
    pub fn add_test(&mut self, suite: &SuiteId, name: &str, source_path: &Path, line: usize) -> Result<&Test, TreeError> {
        self.add_test_with_id(suite, TestId::new(source_path, name), name, source_path, line)
    }

    /// Remove every suite (and its tests) attributed to `source_path`. Returns the number of suites removed.
    pub fn remove_all_for_document(&mut self, source_path: &Path) -> usize {
        let before = self.suites.len();
        self.suites.retain(|s| s.source_path != source_path);
        before - self.suites.len()
    }

    pub fn clear(&mut self) {
        self.suites.clear();
    }

    /// Top-level entries in insertion order.
    pub fn roots(&self) -> impl Iterator<Item = (&SuiteId, &Suite)> {
        self.suites.iter().map(|s| (&s.id, s))
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn suite(&self, id: &SuiteId) -> Option<&Suite> {
        self.suites.iter().find(|s| &s.id == id)
    }

    /// Look up a test together with its owning suite.
    pub fn test(&self, id: &TestId) -> Option<(&Test, &Suite)> {
        self.suites
            .iter()
            .find_map(|suite| suite.test(id).map(|test| (test, suite)))
    }

    pub fn contains_test(&self, id: &TestId) -> bool {
        self.test(id).is_some()
    }

    /// Resolve a serialized identifier (`suite:...` or `test:...`).
    pub fn node(&self, id: &str) -> Option<Node<'_>> {
        if id.starts_with(SUITE_PREFIX) {
            self.suites.iter().find(|s| s.id.as_str() == id).map(Node::Suite)
        } else if id.starts_with(TEST_PREFIX) {
            self.suites.iter().find_map(|suite| {
                suite
                    .tests
                    .iter()
                    .find(|t| t.id.as_str() == id)
                    .map(|test| Node::Test { test, suite })
            })
        } else {
            None
        }
    }

    /// Suites declared in `source_path`, in discovery order.
    pub fn suites_in<'a>(&'a self, source_path: &'a Path) -> impl Iterator<Item = &'a Suite> + 'a {
        self.suites.iter().filter(move |s| s.source_path == source_path)
    }

    /// Tests whose marker sits on `line` of `source_path`.
    pub fn tests_at<'a>(&'a self, source_path: &'a Path, line: usize) -> impl Iterator<Item = &'a Test> + 'a {
        self.suites_in(source_path)
            .flat_map(|s| s.tests.iter())
            .filter(move |t| t.line == line)
    }

    pub fn suite_count(&self) -> usize {
        self.suites.len()
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

// ============================================================================
// Presentation view
// ============================================================================

/// Kind of a presented tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Suite,
    Test,
}

/// Serializable view of a tree node for hosts (LSP clients, `--json` output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
    pub path: PathBuf,
    pub line: usize,
    pub can_resolve_children: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TestNode>,
}

impl TestNode {
    pub fn from_suite(suite: &Suite) -> Self {
        Self {
            id: suite.id.to_string(),
            label: suite.name.clone(),
            kind: NodeKind::Suite,
            path: suite.source_path.clone(),
            line: suite.line,
            can_resolve_children: suite.can_resolve_children(),
            children: suite.tests.iter().map(TestNode::from_test).collect(),
        }
    }

    pub fn from_test(test: &Test) -> Self {
        Self {
            id: test.id.to_string(),
            label: test.name.clone(),
            kind: NodeKind::Test,
            path: test.source_path.clone(),
            line: test.line,
            can_resolve_children: false,
            children: Vec::new(),
        }
    }
}

impl TestTree {
    /// Presentation view of every root with its children.
    pub fn to_nodes(&self) -> Vec<TestNode> {
        self.suites.iter().map(TestNode::from_suite).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> PathBuf {
        PathBuf::from(p)
    }

    #[test]
    fn test_identifiers_are_prefixed() {
        let file = path("/ws/math.pl");
        assert_eq!(SuiteId::new(&file, "arith").as_str(), "suite:/ws/math.pl:arith");
        assert_eq!(TestId::new(&file, "add").as_str(), "test:/ws/math.pl:add");
        assert_eq!(TestId::with_ordinal(&file, "add", 2).as_str(), "test:/ws/math.pl:add#2");
    }

    #[test]
    fn test_add_suite_rejects_duplicates() {
        let mut tree = TestTree::new();
        let file = path("/ws/a.pl");
        tree.add_suite("s", &file, 0).unwrap();
        let err = tree.add_suite("s", &file, 10).unwrap_err();
        assert_eq!(err, TreeError::DuplicateKey("suite:/ws/a.pl:s".to_string()));
        // Same name in another file is a different suite.
        assert!(tree.add_suite("s", &path("/ws/b.pl"), 0).is_ok());
    }

    #[test]
    fn test_add_test_links_owner() {
        let mut tree = TestTree::new();
        let file = path("/ws/a.pl");
        let suite = tree.add_suite("s", &file, 0).unwrap().id.clone();
        let test = tree.add_test(&suite, "t", &file, 1).unwrap().id.clone();

        let (found, owner) = tree.test(&test).unwrap();
        assert_eq!(found.name, "t");
        assert_eq!(found.suite, suite);
        assert_eq!(owner.name, "s");
        assert_eq!(tree.test_count(), 1);
    }

    #[test]
    fn test_add_test_to_unknown_suite() {
        let mut tree = TestTree::new();
        let file = path("/ws/a.pl");
        let missing = SuiteId::new(&file, "nope");
        assert!(matches!(
            tree.add_test(&missing, "t", &file, 0),
            Err(TreeError::UnknownSuite(_))
        ));
    }

    #[test]
    fn test_duplicate_test_key_across_suites() {
        let mut tree = TestTree::new();
        let file = path("/ws/a.pl");
        let first = tree.add_suite("one", &file, 0).unwrap().id.clone();
        let second = tree.add_suite("two", &file, 5).unwrap().id.clone();
        tree.add_test(&first, "t", &file, 1).unwrap();
        assert!(matches!(
            tree.add_test(&second, "t", &file, 6),
            Err(TreeError::DuplicateKey(_))
        ));
    }

    #[test]
    fn test_remove_all_for_document() {
        let mut tree = TestTree::new();
        let a = path("/ws/a.pl");
        let b = path("/ws/b.pl");
        let sa = tree.add_suite("s", &a, 0).unwrap().id.clone();
        tree.add_test(&sa, "t1", &a, 1).unwrap();
        tree.add_suite("s2", &a, 5).unwrap();
        let sb = tree.add_suite("s", &b, 0).unwrap().id.clone();
        tree.add_test(&sb, "t1", &b, 1).unwrap();

        assert_eq!(tree.remove_all_for_document(&a), 2);
        assert_eq!(tree.suite_count(), 1);
        assert_eq!(tree.test_count(), 1);
        assert!(tree.suite(&sb).is_some());
        assert_eq!(tree.remove_all_for_document(&a), 0);
    }

    #[test]
    fn test_node_lookup() {
        let mut tree = TestTree::new();
        let file = path("/ws/a.pl");
        let suite = tree.add_suite("s", &file, 0).unwrap().id.clone();
        tree.add_test(&suite, "t", &file, 3).unwrap();

        assert!(matches!(tree.node("suite:/ws/a.pl:s"), Some(Node::Suite(s)) if s.name == "s"));
        assert!(matches!(
            tree.node("test:/ws/a.pl:t"),
            Some(Node::Test { test, suite }) if test.line == 3 && suite.name == "s"
        ));
        assert!(tree.node("test:/ws/a.pl:missing").is_none());
        assert!(tree.node("bogus").is_none());
    }

    #[test]
    fn test_tests_at_location() {
        let mut tree = TestTree::new();
        let file = path("/ws/a.pl");
        let suite = tree.add_suite("s", &file, 0).unwrap().id.clone();
        tree.add_test(&suite, "t1", &file, 1).unwrap();
        tree.add_test(&suite, "t2", &file, 2).unwrap();

        let names: Vec<&str> = tree.tests_at(&file, 2).map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t2"]);
        assert_eq!(tree.tests_at(&path("/ws/b.pl"), 2).count(), 0);
    }

    #[test]
    fn test_empty_suite_is_retained() {
        let mut tree = TestTree::new();
        tree.add_suite("empty", &path("/ws/a.pl"), 0).unwrap();
        assert_eq!(tree.suite_count(), 1);
        assert_eq!(tree.test_count(), 0);
        assert!(tree.suites()[0].can_resolve_children());
    }

    #[test]
    fn test_node_view_serialization() {
        let mut tree = TestTree::new();
        let file = path("/ws/a.pl");
        let suite = tree.add_suite("s", &file, 0).unwrap().id.clone();
        tree.add_test(&suite, "t", &file, 1).unwrap();

        let json = serde_json::to_value(tree.to_nodes()).unwrap();
        assert_eq!(json[0]["kind"], "suite");
        assert_eq!(json[0]["canResolveChildren"], true);
        assert_eq!(json[0]["children"][0]["id"], "test:/ws/a.pl:t");
        assert!(json[0]["children"][0].get("children").is_none());
    }
}
