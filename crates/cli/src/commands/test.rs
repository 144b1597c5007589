//! `discover` and `run`

use crate::shutdown::ShutdownCoordinator;
use noderig_core::Result;
use noderig_testing::{
    Outcome, ReportSummary, ResultSink, RunOptions, TestAdapter, TestCase, TestOutcome,
};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Prints each outcome as it is delivered.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// One report line per outcome, plus indented failure details.
pub fn format_outcome(outcome: &TestOutcome) -> String {
    let mut line = format!("{:<6} {}", outcome.outcome.to_string(), outcome.identifier);
    if let Some(duration) = outcome.duration {
        line.push_str(&format!(" ({} ms)", duration.as_millis()));
    }
    if outcome.outcome == Outcome::Failed {
        if let Some(message) = &outcome.error_message {
            line.push_str(&format!("\n    {message}"));
        }
        if let Some(stack) = &outcome.error_stack {
            for frame in stack.lines() {
                line.push_str(&format!("\n      {}", frame.trim()));
            }
        }
    }
    line
}

impl<W: Write> ResultSink for ConsoleSink<W> {
    fn record_result(&mut self, outcome: &TestOutcome) {
        if let Err(e) = writeln!(self.out, "{}", format_outcome(outcome)) {
            warn!(error = %e, test = %outcome.identifier, "Failed to print test outcome");
        }
    }
}

/// Closing line of a `run`.
pub fn summary_line(summary: &ReportSummary) -> String {
    let mut line = format!(
        "{} tests, {} passed, {} failed",
        summary.delivered, summary.passed, summary.failed
    );
    if summary.cancelled {
        line.push_str(" (cancelled)");
    }
    line
}

/// Run the suite once and list its tests with their outcomes.
pub async fn discover(config: &Path) -> Result<String> {
    let cases = TestAdapter::default().discover(config).await?;
    Ok(cases
        .iter()
        .map(|case| match &case.outcome {
            Some(outcome) => format!("{:<6} {}", outcome.outcome.to_string(), case.identifier),
            None => case.identifier.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Run all tests, or only `tests`, printing outcomes as they arrive.
///
/// An interrupt stops further outcomes from being printed; the suite itself is
/// left to finish.
pub async fn run(
    config: &Path,
    tests: Vec<String>,
    shutdown: &ShutdownCoordinator,
) -> Result<ReportSummary> {
    let adapter = TestAdapter::new(RunOptions::default());
    let mut sink = ConsoleSink::new(std::io::stdout());

    let run = async {
        if tests.is_empty() {
            adapter.run_all(config, &mut sink).await
        } else {
            let requested: Vec<TestCase> = tests
                .into_iter()
                .map(|id| TestCase::new(id, config))
                .collect();
            adapter.run_selected(&requested, &mut sink).await
        }
    };
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        () = shutdown.wait_for_shutdown() => {
            warn!("Interrupted, no further test outcomes will be reported");
            adapter.cancel();
            run.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failed() -> TestOutcome {
        TestOutcome {
            identifier: "Calc divides".to_string(),
            outcome: Outcome::Failed,
            duration: Some(Duration::from_millis(4)),
            error_message: Some("Expected 1 to be 2.".to_string()),
            error_stack: Some("Error: boom\n    at spec.js:3".to_string()),
        }
    }

    #[test]
    fn test_format_passed() {
        let outcome = TestOutcome {
            identifier: "Calc adds".to_string(),
            outcome: Outcome::Passed,
            duration: None,
            error_message: None,
            error_stack: None,
        };
        assert_eq!(format_outcome(&outcome), "passed Calc adds");
    }

    #[test]
    fn test_format_failed_with_details() {
        assert_eq!(
            format_outcome(&failed()),
            "failed Calc divides (4 ms)\n    Expected 1 to be 2.\n      Error: boom\n      at spec.js:3"
        );
    }

    #[test]
    fn test_console_sink_writes_lines() {
        let mut sink = ConsoleSink::new(Vec::new());
        sink.record_result(&failed());
        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("failed Calc divides"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_summary_line() {
        let summary = ReportSummary {
            delivered: 2,
            passed: 1,
            failed: 1,
            cancelled: true,
        };
        assert_eq!(summary_line(&summary), "2 tests, 1 passed, 1 failed (cancelled)");
    }
}
