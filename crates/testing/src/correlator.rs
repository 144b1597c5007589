//! Mapping of spec records onto host test outcomes.

use crate::protocol::{SpecRecord, SpecStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Host-level verdict of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The spec passed
    Passed,
    /// The spec failed, was skipped, or reported an unknown status
    Failed,
}

impl From<SpecStatus> for Outcome {
    fn from(status: SpecStatus) -> Self {
        match status {
            SpecStatus::Passed => Self::Passed,
            SpecStatus::Failed
            | SpecStatus::Pending
            | SpecStatus::Excluded
            | SpecStatus::Unknown => {
                Self::Failed
            }
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one test as delivered to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Fully qualified test name
    pub identifier: String,
    /// Verdict
    pub outcome: Outcome,
    /// Wall time, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    /// Message of the first failed expectation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Stack of the first failed expectation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
}

impl From<&SpecRecord> for TestOutcome {
    fn from(record: &SpecRecord) -> Self {
        let first_failure = record.failed_expectations.first();
        Self {
            identifier: record.full_name.clone(),
            outcome: record.status.into(),
            duration: record.duration_millis.map(Duration::from_millis),
            error_message: first_failure.and_then(|e| e.message.clone()),
            error_stack: first_failure.and_then(|e| e.stack.clone()),
        }
    }
}

/// Which outcomes the host asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Everything the suite produced
    All,
    /// Only these identifiers
    Only(Vec<String>),
}

/// Translate records into outcomes, keeping execution order.
///
/// With [`Selection::Only`] records whose identifier was not requested are
/// dropped. Requested identifiers that never ran are logged.
#[must_use]
pub fn correlate(records: &[SpecRecord], selection: &Selection) -> Vec<TestOutcome> {
    match selection {
        Selection::All => records.iter().map(TestOutcome::from).collect(),
        Selection::Only(requested) => {
            let wanted: HashSet<&str> = requested.iter().map(String::as_str).collect();
            let outcomes: Vec<TestOutcome> = records
                .iter()
                .filter(|record| wanted.contains(record.full_name.as_str()))
                .map(TestOutcome::from)
                .collect();

            let seen: HashSet<&str> = outcomes.iter().map(|o| o.identifier.as_str()).collect();
            for missing in wanted.difference(&seen) {
                warn!(test = %missing, "Requested test did not run");
            }
            outcomes
        }
    }
}

/// Receiver of test outcomes on the host side.
pub trait ResultSink {
    /// Accept one outcome.
    fn record_result(&mut self, outcome: &TestOutcome);
}

impl ResultSink for Vec<TestOutcome> {
    fn record_result(&mut self, outcome: &TestOutcome) {
        self.push(outcome.clone());
    }
}

/// Counts from one [`report`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Outcomes handed to the sink
    pub delivered: usize,
    /// Delivered outcomes that passed
    pub passed: usize,
    /// Delivered outcomes that failed
    pub failed: usize,
    /// Whether delivery stopped because of cancellation
    pub cancelled: bool,
}

impl ReportSummary {
    /// Whether every delivered outcome passed and nothing was cancelled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Hand outcomes to `sink` in order until done or cancelled.
///
/// The token is checked before each delivery. Cancellation only stops
/// delivery; it does not affect a child process that is still running.
pub fn report<S: ResultSink + ?Sized>(
    outcomes: &[TestOutcome],
    sink: &mut S,
    cancel: &CancellationToken,
) -> ReportSummary {
    let mut summary = ReportSummary::default();
    for outcome in outcomes {
        if cancel.is_cancelled() {
            debug!(
                delivered = summary.delivered,
                remaining = outcomes.len() - summary.delivered,
                "Reporting cancelled"
            );
            summary.cancelled = true;
            break;
        }
        sink.record_result(outcome);
        summary.delivered += 1;
        match outcome.outcome {
            Outcome::Passed => summary.passed += 1,
            Outcome::Failed => summary.failed += 1,
        }
    }
    summary
}
