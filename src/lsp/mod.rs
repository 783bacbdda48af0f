//! prologtest Language Server Protocol (LSP) implementation
//!
//! Provides test explorer support for editors:
//! - Lazy test tree resolution and workspace reload
//! - Test runs with per-test progress notifications and cancellation
//! - Scan warnings as diagnostics

pub mod backend;
pub mod diagnostics;

use tower_lsp::{ClientSocket, LspService};

pub use backend::PrologTestServer;

/// Service with the standard handlers plus the `prologtest/*` methods.
pub fn service() -> (LspService<PrologTestServer>, ClientSocket) {
    LspService::build(PrologTestServer::new)
        .custom_method(backend::RESOLVE_METHOD, PrologTestServer::resolve)
        .custom_method(backend::RUN_METHOD, PrologTestServer::run_tests)
        .custom_method(backend::CANCEL_METHOD, PrologTestServer::cancel)
        .custom_method(backend::RELOAD_METHOD, PrologTestServer::reload)
        .finish()
}
