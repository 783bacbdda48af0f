//! Recoverable scan diagnostics.

use thiserror::Error;

use crate::markers::MarkerKind;

/// A malformed marker line. The scanner reports it and moves on to the next line.
///
/// Line numbers are zero-based; `Display` renders them one-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanWarning {
    #[error("line {}: `{marker}` marker has no argument", .line + 1)]
    MissingArgument { marker: MarkerKind, line: usize, text: String },

    #[error("line {}: `{marker}` marker has an empty name", .line + 1)]
    EmptyName { marker: MarkerKind, line: usize, text: String },
}

impl ScanWarning {
    /// Zero-based line of the offending marker.
    pub fn line(&self) -> usize {
        match self {
            ScanWarning::MissingArgument { line, .. } | ScanWarning::EmptyName { line, .. } => *line,
        }
    }

    pub fn marker(&self) -> MarkerKind {
        match self {
            ScanWarning::MissingArgument { marker, .. } | ScanWarning::EmptyName { marker, .. } => *marker,
        }
    }

    /// The raw source line that produced the warning.
    pub fn text(&self) -> &str {
        match self {
            ScanWarning::MissingArgument { text, .. } | ScanWarning::EmptyName { text, .. } => text,
        }
    }
}
