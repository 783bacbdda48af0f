//! Run output for the terminal (pytest-style).
//!
//! [`ConsoleReporter`] is a [`RunObserver`]: the engine drives it while tests execute. Progress and failure details
//! go to stderr so `--json` output on stdout stays clean.

use std::time::Instant;

use crate::engine::{Outcome, RunObserver, RunReport, WorkItem};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Default console reporter (pytest-style)
pub struct ConsoleReporter {
    pub verbose: bool,
    started: Instant,
    test_started: Instant,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        let now = Instant::now();
        Self {
            verbose,
            started: now,
            test_started: now,
        }
    }
}

impl Default for ConsoleReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl RunObserver for ConsoleReporter {
    fn on_run_start(&mut self, total: usize) {
        self.started = Instant::now();
        if total == 0 {
            eprintln!("No tests collected");
        } else if self.verbose {
            eprintln!("collected {} test{}\n", total, plural(total));
        }
    }

    fn on_test_started(&mut self, item: &WorkItem) {
        self.test_started = Instant::now();
        if self.verbose {
            eprint!("{} ... ", item.label());
        }
    }

    fn on_test_finished(&mut self, item: &WorkItem, outcome: &Outcome) {
        let elapsed = self.test_started.elapsed();
        let status = match (outcome, self.verbose) {
            (Outcome::Passed, true) => format!("{GREEN}PASSED{RESET} ({}ms)", elapsed.as_millis()),
            (Outcome::Passed, false) => format!("{GREEN}.{RESET}"),
            (Outcome::Failed { .. }, true) => format!("{RED}FAILED{RESET} ({}ms)", elapsed.as_millis()),
            (Outcome::Failed { .. }, false) => format!("{RED}F{RESET}"),
        };

        if self.verbose {
            eprintln!("{}", status);
        } else {
            eprint!("{}", status);
        }

        // Print failure details
        if let Outcome::Failed { message } = outcome {
            eprintln!("\n{RED}{}{RESET} ({})", item.label(), item.source_path.display());
            eprintln!("{}", message);
        }
    }

    fn on_run_complete(&mut self, report: &RunReport) {
        if report.total() == 0 && report.not_run == 0 {
            return;
        }
        if !self.verbose {
            eprintln!();
        }
        eprintln!();
        eprintln!(
            "====== {} in {:.2}s ======",
            summary_line(report),
            self.started.elapsed().as_secs_f64()
        );
    }
}

/// `2 passed, 1 failed, 3 not run` with colors.
pub fn summary_line(report: &RunReport) -> String {
    let mut parts = Vec::new();
    if report.passed > 0 {
        parts.push(format!("{GREEN}{} passed{RESET}", report.passed));
    }
    if report.failed > 0 {
        parts.push(format!("{RED}{} failed{RESET}", report.failed));
    }
    if report.not_run > 0 {
        parts.push(format!("{YELLOW}{} not run{RESET}", report.not_run));
    }
    if parts.is_empty() {
        parts.push("no tests ran".to_string());
    }
    parts.join(", ")
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}
