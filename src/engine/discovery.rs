//! Test discovery: enumerate workspace sources, scan them for markers and populate the tree.
//!
//! ## Failure policy
//!
//! Discovery never fails as a whole. An unreadable file or an unwalkable root is logged, recorded in the
//! [`DiscoverySummary`] and skipped. Malformed markers are logged as scan warnings and skipped.
//!
//! ## Collisions
//!
//! - A unit opened twice in the same file (`begin_tests(x)` ... `end_tests(x)` ... `begin_tests(x)`) is reopened:
//!   later tests join the first suite.
//! - A test name used twice in the same file gets an ordinal suffix on its identifier (`#2`, `#3`, ...).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::WalkBuilder;
use prologtest_syntax::{MarkerKind, ScanEvent, ScanWarning, scan};

use super::SharedTree;
use super::error::EngineError;
use super::interfaces::SourceReader;
use super::tree::{SuiteId, TestId, TestTree, TreeError};
use crate::config::DiscoveryConfig;

/// A test marker found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedTest {
    pub name: String,
    pub line: usize,
}

/// A unit and the test markers found inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSuite {
    pub name: String,
    pub line: usize,
    pub tests: Vec<ScannedTest>,
}

/// Markers of one document grouped by unit, ready to be inserted into a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub suites: Vec<ScannedSuite>,
    pub warnings: Vec<ScanWarning>,
}

impl ScannedFile {
    /// Group the scanner events of `source` by unit.
    pub fn scan(path: &Path, source: &str) -> Self {
        let mut file = Self {
            path: path.to_path_buf(),
            suites: Vec::new(),
            warnings: Vec::new(),
        };
        let mut current: Option<usize> = None;

        for item in scan(source) {
            match item {
                Ok(ScanEvent::SuiteBegin { name, line }) => {
                    file.suites.push(ScannedSuite {
                        name,
                        line,
                        tests: Vec::new(),
                    });
                    current = Some(file.suites.len() - 1);
                }
                Ok(ScanEvent::SuiteEnd { .. }) => current = None,
                Ok(ScanEvent::TestCase { name, line }) => {
                    if let Some(suite) = current.and_then(|index| file.suites.get_mut(index)) {
                        suite.tests.push(ScannedTest { name, line });
                    }
                }
                Err(warning) => {
                    // A malformed begin marker still ends the span of the unit before it.
                    if warning.marker() == MarkerKind::SuiteBegin {
                        current = None;
                    }
                    file.warnings.push(warning);
                }
            }
        }

        file
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(|s| s.tests.len()).sum()
    }

    /// Insert the scanned suites and tests into `tree`, applying the collision policy.
    pub fn insert_into(&self, tree: &mut TestTree) -> FileDiscovery {
        let path = self.path.as_path();
        let mut discovery = FileDiscovery {
            path: self.path.clone(),
            suites: 0,
            tests: 0,
            warnings: self.warnings.clone(),
        };

        for warning in &self.warnings {
            tracing::warn!(path = %path.display(), "{}", warning);
        }

        for suite in &self.suites {
            let suite_id = match tree.add_suite(&suite.name, path, suite.line) {
                Ok(created) => {
                    discovery.suites += 1;
                    created.id.clone()
                }
                Err(TreeError::DuplicateKey(_)) => {
                    tracing::warn!(
                        path = %path.display(),
                        "line {}: unit `{}` is opened again; its tests join the earlier unit",
                        suite.line + 1,
                        suite.name
                    );
                    SuiteId::new(path, &suite.name)
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "skipping unit `{}`: {}", suite.name, err);
                    continue;
                }
            };

            for test in &suite.tests {
                let id = next_free_test_id(tree, path, &test.name);
                if id != TestId::new(path, &test.name) {
                    tracing::warn!(
                        path = %path.display(),
                        "line {}: duplicate test `{}` registered as `{}`",
                        test.line + 1,
                        test.name,
                        id
                    );
                }
                match tree.add_test_with_id(&suite_id, id, &test.name, path, test.line) {
                    Ok(_) => discovery.tests += 1,
                    Err(err) => tracing::warn!(path = %path.display(), "skipping test `{}`: {}", test.name, err),
                }
            }
        }

        discovery
    }
}

fn next_free_test_id(tree: &TestTree, path: &Path, name: &str) -> TestId {
    let mut ordinal = 1;
    loop {
        let id = TestId::with_ordinal(path, name, ordinal);
        if !tree.contains_test(&id) {
            return id;
        }
        ordinal += 1;
    }
}

/// Recognized source files below `root`, sorted. Blocking; runs on the blocking pool during discovery.
fn walk_sources(config: &DiscoveryConfig, root: &Path) -> Result<Vec<PathBuf>, EngineError> {
    if root.is_file() {
        return Ok(if config.recognizes(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }
    if !root.is_dir() {
        return Err(EngineError::Enumeration {
            root: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let excluded = config.clone();
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir && entry.depth() > 0 && entry.file_name().to_str().is_some_and(|n| excluded.is_excluded_dir(n)))
        })
        .build();

    let mut files = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|t| t.is_file()) && config.recognizes(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(err) if err.depth().unwrap_or(0) == 0 => {
                return Err(EngineError::Enumeration {
                    root: root.to_path_buf(),
                    message: err.to_string(),
                });
            }
            Err(err) => tracing::warn!(root = %root.display(), "skipping entry: {}", err),
        }
    }

    files.sort();
    Ok(files)
}

/// What one document contributed to the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiscovery {
    pub path: PathBuf,
    /// Newly created suites (reopened units are not counted).
    pub suites: usize,
    pub tests: usize,
    pub warnings: Vec<ScanWarning>,
}

/// Result of a full workspace discovery.
#[derive(Debug, Default)]
pub struct DiscoverySummary {
    pub files: Vec<FileDiscovery>,
    /// Read and enumeration failures, already logged.
    pub errors: Vec<EngineError>,
}

impl DiscoverySummary {
    pub fn suite_count(&self) -> usize {
        self.files.iter().map(|f| f.suites).sum()
    }

    pub fn test_count(&self) -> usize {
        self.files.iter().map(|f| f.tests).sum()
    }

    pub fn warnings(&self) -> impl Iterator<Item = (&Path, &ScanWarning)> {
        self.files
            .iter()
            .flat_map(|f| f.warnings.iter().map(move |w| (f.path.as_path(), w)))
    }
}

/// Populates the shared tree from workspace sources.
pub struct DiscoveryEngine {
    tree: SharedTree,
    reader: Arc<dyn SourceReader>,
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    pub fn new(tree: SharedTree, reader: Arc<dyn SourceReader>, config: DiscoveryConfig) -> Self {
        Self { tree, reader, config }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Whether `path` is a source document this engine scans.
    pub fn recognizes(&self, path: &Path) -> bool {
        self.config.recognizes(path)
    }

    /// List the recognized source files below `root`, sorted.
    ///
    /// Hidden entries, `.gitignore`d paths and configured dependency directories are skipped. A `root` that is
    /// itself a recognized file yields just that file.
    ///
    /// ## Errors
    /// Returns [`EngineError::Enumeration`] if `root` does not exist or cannot be walked.
    pub fn list_source_files(&self, root: &Path) -> Result<Vec<PathBuf>, EngineError> {
        walk_sources(&self.config, root)
    }

    /// Discover every recognized file below every root.
    #[tracing::instrument(skip_all, fields(roots = roots.len()))]
    pub async fn discover_all(&self, roots: &[PathBuf]) -> DiscoverySummary {
        let mut summary = DiscoverySummary::default();

        for root in roots {
            let config = self.config.clone();
            let walk_root = root.clone();
            let walked = tokio::task::spawn_blocking(move || walk_sources(&config, &walk_root))
                .await
                .unwrap_or_else(|join| {
                    Err(EngineError::Enumeration {
                        root: root.clone(),
                        message: join.to_string(),
                    })
                });
            let files = match walked {
                Ok(files) => files,
                Err(err) => {
                    tracing::warn!("{}", err);
                    summary.errors.push(err);
                    continue;
                }
            };
            tracing::debug!(root = %root.display(), files = files.len(), "enumerated workspace root");

            for file in files {
                match self.discover_in_file(&file).await {
                    Ok(found) => summary.files.push(found),
                    Err(err) => summary.errors.push(err),
                }
            }
        }

        tracing::info!(
            files = summary.files.len(),
            suites = summary.suite_count(),
            tests = summary.test_count(),
            "discovery finished"
        );
        summary
    }

    /// Read `path` and insert its suites and tests.
    ///
    /// On a read failure the error is logged and returned, and the tree is left untouched.
    pub async fn discover_in_file(&self, path: &Path) -> Result<FileDiscovery, EngineError> {
        let scanned = match self.scan_file(path).await {
            Ok(scanned) => scanned,
            Err(err) => {
                tracing::warn!("{}", err);
                return Err(err);
            }
        };
        let mut tree = self.tree.write().await;
        Ok(scanned.insert_into(&mut tree))
    }

    /// Insert the suites and tests of in-memory `source` attributed to `path`.
    pub async fn discover_source(&self, path: &Path, source: &str) -> FileDiscovery {
        let scanned = ScannedFile::scan(path, source);
        let mut tree = self.tree.write().await;
        scanned.insert_into(&mut tree)
    }

    /// Read and scan `path` without touching the tree.
    pub async fn scan_file(&self, path: &Path) -> Result<ScannedFile, EngineError> {
        let source = self.reader.read_source(path).await.map_err(|source| EngineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ScannedFile::scan(path, &source))
    }
}
