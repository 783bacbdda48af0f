//! Error types for discovery and execution.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::tree::TreeError;

/// Errors raised inside the engine.
///
/// Most of these never reach a caller as `Err`: discovery logs them and execution turns them into a failed verdict.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to enumerate {}: {message}", root.display())]
    Enumeration { root: PathBuf, message: String },

    #[error(transparent)]
    Process(#[from] ProcessFailure),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("test controller has been disposed")]
    Disposed,
}

/// The interpreter could not be run to completion.
#[derive(Debug, Error)]
pub enum ProcessFailure {
    #[error("failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to capture interpreter output: {0}")]
    Io(#[source] std::io::Error),

    #[error("interpreter timed out after {limit:?}")]
    TimedOut { limit: Duration },

    #[error("interpreter exited with status {code}: {detail}")]
    Exited { code: i32, detail: String },

    #[error("interpreter was terminated by a signal")]
    Terminated,

    #[error("test execution panicked: {0}")]
    Panicked(String),
}
