use std::fmt::Write;

use crate::models::RunOutcome;

const RULE_WIDTH: usize = 60;

/// Totals and verdict for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub total_passed: usize,
    pub total_failed: usize,
    pub all_tests_passed: bool,
    pub cleanup_succeeded: bool,
}

impl Summary {
    /// The CI gate: every module passed and nothing was left running.
    #[must_use]
    pub fn success(&self) -> bool {
        self.all_tests_passed && self.cleanup_succeeded
    }

    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.success())
    }
}

pub struct Reporter;

impl Reporter {
    #[must_use]
    pub fn summarize(outcome: &RunOutcome) -> Summary {
        let total_passed = outcome.results.iter().filter(|r| r.passed()).count();
        let total_failed = outcome.results.len() - total_passed;

        Summary {
            total_passed,
            total_failed,
            all_tests_passed: total_failed == 0,
            cleanup_succeeded: outcome.cleanup_succeeded,
        }
    }

    /// Human-readable report: one line per module, totals, verdict.
    #[must_use]
    pub fn render(outcome: &RunOutcome, summary: &Summary) -> String {
        let rule = "=".repeat(RULE_WIDTH);
        let mut out = String::new();

        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(out, "INTEGRATION TEST RESULTS");
        let _ = writeln!(out, "{rule}");

        for result in &outcome.results {
            let status = if result.passed() { "PASSED" } else { "FAILED" };
            let _ = writeln!(
                out,
                "\n{}: {} ({:.1}s)",
                result.module_name,
                status,
                result.duration.as_secs_f64()
            );
            if let Some(failure) = &result.failure {
                let _ = writeln!(out, "  Error: {failure}");
            }
        }

        let _ = writeln!(out, "\n{rule}");
        let _ = writeln!(
            out,
            "TOTAL: {} module(s)",
            summary.total_passed + summary.total_failed
        );
        let _ = writeln!(out, "Passed: {}", summary.total_passed);
        let _ = writeln!(out, "Failed: {}", summary.total_failed);

        if summary.all_tests_passed {
            let _ = writeln!(out, "\nALL INTEGRATION TESTS PASSED");
        } else {
            let _ = writeln!(out, "\n{} module(s) failed", summary.total_failed);
        }
        if !summary.cleanup_succeeded {
            let _ = writeln!(out, "Test environment cleanup failed; containers may still be running");
        }

        if summary.success() {
            let _ = writeln!(out, "\nINTEGRATION TESTS COMPLETED SUCCESSFULLY");
        } else {
            let _ = writeln!(out, "\nINTEGRATION TESTS COMPLETED WITH ERRORS");
        }

        out
    }

    /// Print the report to stdout and return the summary.
    pub fn report(outcome: &RunOutcome) -> Summary {
        let summary = Self::summarize(outcome);
        print!("{}", Self::render(outcome, &summary));
        summary
    }
}
