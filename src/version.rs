//! prologtest version information.
//!
//! ## Notes
//!
//! - The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time.
//! - Prefer this constant over repeating `env!("CARGO_PKG_VERSION")`; the CLI and the language server both report it.

/// The prologtest version string (for example, `0.1.0`).
pub const PROLOGTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
