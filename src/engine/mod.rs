//! Test discovery and execution engine.
//!
//! ## Modules
//!
//! - `tree` - Suites, tests and their identifiers
//! - `discovery` - Workspace enumeration and marker scanning
//! - `execution` - Running tests through the interpreter
//! - `classify` - Turning interpreter output into a verdict
//! - `reconcile` - Rebuilding the tree for changed documents
//! - `interfaces` - File and process boundaries
//! - `controller` - The service object hosts use

pub mod classify;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod execution;
pub mod interfaces;
pub mod reconcile;
pub mod tree;

use std::sync::Arc;

use tokio::sync::RwLock;

pub use classify::Outcome;
pub use controller::TestController;
pub use discovery::{DiscoveryEngine, DiscoverySummary, FileDiscovery, ScannedFile};
pub use error::{EngineError, ProcessFailure};
pub use execution::{
    CancellationFlag, ExecutionEngine, NoopObserver, RunObserver, RunOptions, RunReport, RunScope, TestRunResult,
    WorkItem,
};
pub use interfaces::{FsSourceReader, InterpreterLauncher, Invocation, ProcessLauncher, ProcessOutput, SourceReader};
pub use reconcile::ChangeReconciler;
pub use tree::{NodeKind, Suite, SuiteId, Test, TestId, TestNode, TestTree, TreeError};

/// Tree shared by discovery, reconciliation and execution.
pub type SharedTree = Arc<RwLock<TestTree>>;
