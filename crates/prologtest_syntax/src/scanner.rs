//! Marker scanner for plunit test units.
//!
//! The scanner walks a document line by line and keeps a single piece of state: whether a unit is open.
//!
//! - A line containing `:- begin_tests(` opens a unit.
//! - A line containing `:- end_tests(` closes it.
//! - Inside an open unit, a line whose trimmed text starts with `test(` declares a test.
//!
//! Test markers outside an open unit are ignored. A malformed marker produces a [`ScanWarning`] and leaves the
//! unit state unchanged.

use std::iter::Enumerate;
use std::str::Lines;

use crate::markers::{MarkerKind, extract_argument};
use crate::warning::ScanWarning;

/// A marker recognized by the scanner. Lines are zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    SuiteBegin { name: String, line: usize },
    SuiteEnd { line: usize },
    TestCase { name: String, line: usize },
}

impl ScanEvent {
    pub fn line(&self) -> usize {
        match self {
            ScanEvent::SuiteBegin { line, .. } | ScanEvent::SuiteEnd { line } | ScanEvent::TestCase { line, .. } => {
                *line
            }
        }
    }
}

/// One scanner step: an event, or a warning for a malformed marker line.
pub type ScanItem = Result<ScanEvent, ScanWarning>;

/// Lazy iterator over the markers of one document.
///
/// Cloning a scanner forks it at its current position; calling [`scan`] again restarts from the first line.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    lines: Enumerate<Lines<'a>>,
    in_suite: bool,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            lines: source.lines().enumerate(),
            in_suite: false,
        }
    }

    /// Whether a unit is currently open.
    pub fn in_suite(&self) -> bool {
        self.in_suite
    }

    fn scan_line(&mut self, line: usize, text: &str) -> Option<ScanItem> {
        if text.contains(MarkerKind::SuiteBegin.literal()) {
            let item = named_marker(MarkerKind::SuiteBegin, line, text)
                .map(|name| ScanEvent::SuiteBegin { name, line });
            if item.is_ok() {
                self.in_suite = true;
            }
            Some(item)
        } else if text.contains(MarkerKind::SuiteEnd.literal()) {
            self.in_suite = false;
            Some(Ok(ScanEvent::SuiteEnd { line }))
        } else if self.in_suite && text.trim_start().starts_with(MarkerKind::TestCase.literal()) {
            Some(named_marker(MarkerKind::TestCase, line, text).map(|name| ScanEvent::TestCase { name, line }))
        } else {
            None
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = ScanItem;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((line, text)) = self.lines.next() {
            if let Some(item) = self.scan_line(line, text) {
                return Some(item);
            }
        }
        None
    }
}

/// Scan `source` for plunit markers.
///
/// This is a shorthand for `Scanner::new(source)`.
pub fn scan(source: &str) -> Scanner<'_> {
    Scanner::new(source)
}

fn named_marker(marker: MarkerKind, line: usize, text: &str) -> Result<String, ScanWarning> {
    match extract_argument(text, marker) {
        Some("") => Err(ScanWarning::EmptyName {
            marker,
            line,
            text: text.to_string(),
        }),
        Some(name) => Ok(name.to_string()),
        None => Err(ScanWarning::MissingArgument {
            marker,
            line,
            text: text.to_string(),
        }),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ARITHMETIC: &str = "\
:- begin_tests(arithmetic).
test(addition) :- X is 1+1, X == 2.
test(subtraction) :- X is 5-3, X == 2.
:- end_tests(arithmetic).
";

    fn events(source: &str) -> Vec<ScanEvent> {
        scan(source).filter_map(Result::ok).collect()
    }

    #[test]
    fn test_arithmetic_scenario() {
        assert_eq!(
            events(ARITHMETIC),
            vec![
                ScanEvent::SuiteBegin {
                    name: "arithmetic".to_string(),
                    line: 0
                },
                ScanEvent::TestCase {
                    name: "addition".to_string(),
                    line: 1
                },
                ScanEvent::TestCase {
                    name: "subtraction".to_string(),
                    line: 2
                },
                ScanEvent::SuiteEnd { line: 3 },
            ]
        );
    }

    #[test]
    fn test_rescanning_is_identical() {
        let first: Vec<ScanItem> = scan(ARITHMETIC).collect();
        let second: Vec<ScanItem> = scan(ARITHMETIC).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tests_outside_units_are_ignored() {
        let source = "\
test(before) :- true.
:- begin_tests(a).
test(inside) :- true.
:- end_tests(a).
test(after) :- true.
";
        let names: Vec<String> = events(source)
            .into_iter()
            .filter_map(|e| match e {
                ScanEvent::TestCase { name, .. } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["inside".to_string()]);
    }

    #[test]
    fn test_indented_test_heads_are_recognized() {
        let source = ":- begin_tests(a).\n    test(indented) :- true.\n:- end_tests(a).\n";
        assert!(events(source).contains(&ScanEvent::TestCase {
            name: "indented".to_string(),
            line: 1
        }));
    }

    #[test]
    fn test_test_marker_must_lead_the_line() {
        let source = ":- begin_tests(a).\nfoo :- test(not_a_test).\n:- end_tests(a).\n";
        assert_eq!(events(source).len(), 2);
    }

    #[test]
    fn test_empty_suite_name_is_a_warning() {
        let items: Vec<ScanItem> = scan(":- begin_tests().\ntest(a) :- true.\n").collect();
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(ScanWarning::EmptyName { marker, line, .. }) => {
                assert_eq!(*marker, MarkerKind::SuiteBegin);
                assert_eq!(*line, 0);
            }
            other => panic!("expected an empty-name warning, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_begin_leaves_unit_closed() {
        let mut scanner = scan(":- begin_tests(\ntest(a) :- true.\n");
        assert!(matches!(scanner.next(), Some(Err(ScanWarning::MissingArgument { .. }))));
        assert!(!scanner.in_suite());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_malformed_test_does_not_stop_the_scan() {
        let source = ":- begin_tests(a).\ntest( ) :- true.\ntest(ok) :- true.\n:- end_tests(a).\n";
        let items: Vec<ScanItem> = scan(source).collect();
        assert_eq!(items.len(), 4);
        assert!(items[1].is_err());
        assert_eq!(
            items[2],
            Ok(ScanEvent::TestCase {
                name: "ok".to_string(),
                line: 2
            })
        );
    }

    #[test]
    fn test_unclosed_unit_runs_to_end_of_file() {
        let source = ":- begin_tests(a).\ntest(one) :- true.\ntest(two) :- true.\n";
        assert_eq!(events(source).len(), 3);
    }

    #[test]
    fn test_crlf_line_endings() {
        let source = ":- begin_tests(win).\r\ntest(crlf) :- true.\r\n:- end_tests(win).\r\n";
        assert_eq!(
            events(source)[1],
            ScanEvent::TestCase {
                name: "crlf".to_string(),
                line: 1
            }
        );
    }

    #[test]
    fn test_warning_display_is_one_based() {
        let warning = scan(":- begin_tests().").next().and_then(Result::err);
        assert_eq!(
            warning.map(|w| w.to_string()),
            Some("line 1: `begin_tests` marker has an empty name".to_string())
        );
    }
}
