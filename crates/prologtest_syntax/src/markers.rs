//! Marker vocabulary and argument extraction.

use std::fmt;

/// Directive that opens a unit: `:- begin_tests(Name)` or `:- begin_tests(Name, Options)`.
pub const SUITE_BEGIN: &str = ":- begin_tests(";

/// Directive that closes a unit: `:- end_tests(Name)`.
pub const SUITE_END: &str = ":- end_tests(";

/// Head of a test clause. Only recognized at the start of a trimmed line.
pub const TEST_CASE: &str = "test(";

/// The three marker forms the scanner recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    SuiteBegin,
    SuiteEnd,
    TestCase,
}

impl MarkerKind {
    /// Literal text of the marker, including its opening parenthesis.
    pub fn literal(self) -> &'static str {
        match self {
            MarkerKind::SuiteBegin => SUITE_BEGIN,
            MarkerKind::SuiteEnd => SUITE_END,
            MarkerKind::TestCase => TEST_CASE,
        }
    }
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarkerKind::SuiteBegin => "begin_tests",
            MarkerKind::SuiteEnd => "end_tests",
            MarkerKind::TestCase => "test",
        };
        f.write_str(name)
    }
}

/// Extract the first argument of the marker occurring in `line`.
///
/// ## Parameters
/// - `line`: a single source line.
/// - `marker`: the marker whose argument should be extracted.
///
/// ## Returns
/// - `None` if the marker does not occur, or if the argument is not terminated by `,` or `)` on the same line.
/// - `Some(text)` with the trimmed text between the marker's `(` and the first `,` or `)` after it that is not
///   inside a quoted atom or string. The text may be empty (`begin_tests()`); callers decide how to treat that.
///
/// ## Notes
/// - Cutting at the first comma drops plunit options: `test(eq, [true(X == 2)])` yields `eq`. It also lets the
///   options list continue on the following lines.
/// - Quoted names keep their quotes and inner punctuation: `test('a, b')` yields `'a, b'`.
pub fn extract_argument(line: &str, marker: MarkerKind) -> Option<&str> {
    let literal = marker.literal();
    let start = line.find(literal)? + literal.len();
    let rest = &line[start..];
    let end = argument_end(rest)?;
    Some(rest[..end].trim())
}

/// Byte offset of the first `,` or `)` outside quotes. `\` escapes the next character inside quotes.
fn argument_end(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, ch) in text.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if ch == '\\' => escaped = true,
            Some(open) if ch == open => quote = None,
            Some(_) => {}
            None => match ch {
                '\'' | '"' | '`' => quote = Some(ch),
                ',' | ')' => return Some(offset),
                _ => {}
            },
        }
    }
    None
}
