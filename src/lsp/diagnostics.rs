//! Convert scan warnings to LSP diagnostics

use prologtest_syntax::ScanWarning;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};

use crate::engine::FileDiscovery;

/// Diagnostic source shown by editors.
pub const DIAGNOSTIC_SOURCE: &str = "prologtest";

/// Range covering the whole offending line.
fn line_range(line: usize, text: &str) -> Range {
    let line = u32::try_from(line).unwrap_or(u32::MAX);
    let end = u32::try_from(text.encode_utf16().count()).unwrap_or(u32::MAX);
    Range::new(Position::new(line, 0), Position::new(line, end))
}

/// Convert a ScanWarning to an LSP Diagnostic
pub fn warning_to_diagnostic(warning: &ScanWarning) -> Diagnostic {
    Diagnostic {
        range: line_range(warning.line(), warning.text()),
        severity: Some(DiagnosticSeverity::WARNING),
        code: None,
        code_description: None,
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: match warning {
            ScanWarning::MissingArgument { marker, .. } => {
                format!("`{}` marker has no argument; it is ignored", marker)
            }
            ScanWarning::EmptyName { marker, .. } => {
                format!("`{}` marker has an empty name; it is ignored", marker)
            }
        },
        related_information: None,
        tags: None,
        data: None,
    }
}

/// Diagnostics for everything a discovered document reported. Empty when the document is clean.
pub fn file_diagnostics(found: &FileDiscovery) -> Vec<Diagnostic> {
    found.warnings.iter().map(warning_to_diagnostic).collect()
}
