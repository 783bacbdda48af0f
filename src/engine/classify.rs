//! Turn captured interpreter output into a verdict.
//!
//! plunit prints human-oriented diagnostics with no machine-readable success marker, so the verdict is read from
//! the text: a line starting with `ERROR` marks a failed test. The exit status only matters when no such line
//! exists and the interpreter did not finish normally.

use serde::Serialize;

use super::error::ProcessFailure;
use super::interfaces::ProcessOutput;

/// Prefix of the diagnostic lines that mark a failure.
pub const ERROR_PREFIX: &str = "ERROR";

/// Terminal verdict of one test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed { message: String },
}

impl Outcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Outcome::Failed {
            message: message.into(),
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { message } => Some(message),
        }
    }
}

impl From<ProcessFailure> for Outcome {
    fn from(failure: ProcessFailure) -> Self {
        Outcome::failed(failure.to_string())
    }
}

/// First line of `text` that starts with [`ERROR_PREFIX`].
pub fn first_error_line(text: &str) -> Option<&str> {
    text.lines().find(|line| line.starts_with(ERROR_PREFIX))
}

/// Classify a finished process.
///
/// 1. An `ERROR` line fails the test with that line as the message.
/// 2. Otherwise an abnormal exit fails the test with a process failure description.
/// 3. Otherwise the test passed.
pub fn classify(output: &ProcessOutput) -> Outcome {
    if let Some(line) = first_error_line(&output.text) {
        return Outcome::failed(line.trim_end());
    }
    match output.exit_code {
        Some(0) => Outcome::Passed,
        Some(code) => ProcessFailure::Exited {
            code,
            detail: last_diagnostic(&output.text).unwrap_or("no diagnostic output").to_string(),
        }
        .into(),
        None => ProcessFailure::Terminated.into(),
    }
}

/// Last non-blank output line, used to explain an abnormal exit.
fn last_diagnostic(text: &str) -> Option<&str> {
    text.lines().rev().map(str::trim).find(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(code: Option<i32>, text: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: code,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_clean_output_passes() {
        let out = output(Some(0), "% All 1 tests passed\n\n");
        assert_eq!(classify(&out), Outcome::Passed);
    }

    #[test]
    fn test_first_error_line_is_the_message() {
        let text = "% Start unit: arithmetic\n\
                    ERROR: /ws/math.pl:3:\n\
                    ERROR:     test arithmetic:subtraction: failed\n";
        let out = output(Some(1), text);
        assert_eq!(classify(&out), Outcome::failed("ERROR: /ws/math.pl:3:"));
    }

    #[test]
    fn test_error_must_start_the_line() {
        let out = output(Some(0), "note: no ERROR here\n");
        assert_eq!(classify(&out), Outcome::Passed);
    }

    #[test]
    fn test_error_line_wins_over_exit_code() {
        let out = output(Some(0), "ERROR: something odd\n");
        assert_eq!(classify(&out).message(), Some("ERROR: something odd"));
    }

    #[test]
    fn test_abnormal_exit_without_error_line() {
        let out = output(Some(1), "Warning: goal (run_tests(a:b)) failed\n\n");
        assert_eq!(
            classify(&out),
            Outcome::failed("interpreter exited with status 1: Warning: goal (run_tests(a:b)) failed")
        );
    }

    #[test]
    fn test_signal_termination() {
        let out = output(None, "");
        assert_eq!(
            classify(&out),
            Outcome::failed("interpreter was terminated by a signal")
        );
    }

    #[test]
    fn test_crlf_error_line_is_trimmed() {
        let out = output(Some(1), "ERROR: boom\r\n");
        assert_eq!(classify(&out).message(), Some("ERROR: boom"));
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_value(Outcome::failed("ERROR: x")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "ERROR: x");
        assert_eq!(serde_json::to_value(Outcome::Passed).unwrap()["status"], "passed");
    }
}
