//! Line-oriented scanner for plunit test markers in Prolog sources.
//!
//! This crate is dependency-light and shared by the test engine, the CLI and the language server.
//!
//! ## Notes
//! - This crate is intentionally "marker-only": it does not parse Prolog. It recognizes the `:- begin_tests(`,
//!   `:- end_tests(` and `test(` markers line by line and extracts their first argument.
//! - Scanning is a pure function of its input. Re-scanning the same text yields the same items.
//!
//! ## Examples
//! ```rust
//! use prologtest_syntax::{scan, ScanEvent};
//!
//! let source = ":- begin_tests(arithmetic).\ntest(addition) :- 2 =:= 1 + 1.\n:- end_tests(arithmetic).\n";
//! let events: Vec<ScanEvent> = scan(source).filter_map(Result::ok).collect();
//! assert_eq!(events.len(), 3);
//! assert_eq!(events[1], ScanEvent::TestCase { name: "addition".to_string(), line: 1 });
//! ```

pub mod markers;
pub mod scanner;
pub mod warning;

pub use markers::{MarkerKind, extract_argument};
pub use scanner::{ScanEvent, ScanItem, Scanner, scan};
pub use warning::ScanWarning;
