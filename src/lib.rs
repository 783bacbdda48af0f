#![forbid(unsafe_code)]
//! prologtest: discover and run plunit tests
//!
//! Test units (`:- begin_tests(Name).` ... `:- end_tests(Name).`) and the `test(Name)` clauses inside them are found
//! by a line scanner, kept in a tree of suites and tests, and run one at a time through the SWI-Prolog interpreter.
//! The engine is shared by two hosts: the `prologtest` CLI and the `prologtest-lsp` language server.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Interpreter crashes**: A launcher that panics fails only the test it was running.

pub mod cli;
pub mod config;
pub mod engine;
pub mod lsp;
pub mod version;

pub use config::Config;
pub use engine::{
    CancellationFlag, EngineError, Outcome, RunObserver, RunOptions, RunReport, RunScope, TestController, TestTree,
};
pub use prologtest_syntax as syntax;
