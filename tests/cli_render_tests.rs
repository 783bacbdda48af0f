//! Golden snapshot tests for `prologtest list` output
//!
//! Run with: `cargo test --test cli_render_tests`
//! Review changes: `cargo insta review`

use std::path::Path;

use prologtest::cli::commands::{render_tree, render_warnings};
use prologtest::engine::{DiscoverySummary, ScannedFile, TestTree};

const MATH: &str = "\
:- module(math, []).

:- begin_tests(arithmetic).
test(addition) :- 1 + 1 =:= 2.
test(subtraction) :- 3 - 1 =:= 2.
:- end_tests(arithmetic).

:- begin_tests(comparison).
test(less, [true]) :- 1 < 2.
:- end_tests(comparison).
";

const LISTS: &str = "\
:- begin_tests(lists).
test(append) :- append([a], [b], [a, b]).
test() :- true.
:- end_tests(lists).
";

fn workspace() -> (TestTree, DiscoverySummary) {
    let mut tree = TestTree::new();
    let mut summary = DiscoverySummary::default();
    for (path, source) in [("/ws/math.pl", MATH), ("/ws/tests/lists.plt", LISTS)] {
        let found = ScannedFile::scan(Path::new(path), source).insert_into(&mut tree);
        summary.files.push(found);
    }
    (tree, summary)
}

#[test]
fn test_tree_listing() {
    let (tree, _) = workspace();
    let rendered = render_tree(&tree, Path::new("/ws"));
    insta::assert_snapshot!("tree_listing", rendered);
}

#[test]
fn test_warning_listing() {
    let (_, summary) = workspace();
    let rendered = render_warnings(&summary, Path::new("/ws"));
    insta::assert_snapshot!("warning_listing", rendered);
}
