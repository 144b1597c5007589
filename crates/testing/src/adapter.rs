//! Host-facing test adapter.
//!
//! A *source* is the path of an [`ExecuteConfig`] file. Discovery runs the
//! whole suite once; executing all tests reuses that run, and executing a
//! subset re-runs each distinct source and filters the outcomes.

use crate::correlator::{ReportSummary, ResultSink, Selection, TestOutcome, correlate, report};
use crate::runner::{RunOptions, run_session};
use noderig_core::{ExecuteConfig, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// One test known to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    /// Fully qualified test name
    pub identifier: String,
    /// Config file the test was discovered from
    pub source: PathBuf,
    /// Outcome observed while discovering; `None` for tests named by the host
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TestOutcome>,
}

impl TestCase {
    /// A test the host wants to run, identified by name and source.
    pub fn new(identifier: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            source: source.into(),
            outcome: None,
        }
    }
}

/// Discovers and executes Jasmine suites for a host.
#[derive(Debug, Default)]
pub struct TestAdapter {
    options: RunOptions,
    cancel: Mutex<CancellationToken>,
}

impl TestAdapter {
    /// Adapter with the given run options.
    #[must_use]
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Stop delivering outcomes for the run in progress.
    ///
    /// The child process is left to finish on its own.
    pub fn cancel(&self) {
        self.current_token().cancel();
    }

    /// Token of the current run.
    #[must_use]
    pub fn current_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn reset_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token.clone();
        token
    }

    /// Run the suite behind `source` once and return its tests.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub async fn discover(&self, source: &Path) -> Result<Vec<TestCase>> {
        let config = ExecuteConfig::load(source).await?;
        let run = run_session(&config, &self.options).await?;
        let cases: Vec<TestCase> = correlate(&run.records, &Selection::All)
            .into_iter()
            .map(|outcome| TestCase {
                identifier: outcome.identifier.clone(),
                source: source.to_path_buf(),
                outcome: Some(outcome),
            })
            .collect();
        info!(tests = cases.len(), "Discovered tests");
        Ok(cases)
    }

    /// Run every test behind `source` and report them to `sink`.
    pub async fn run_all<S: ResultSink + ?Sized>(
        &self,
        source: &Path,
        sink: &mut S,
    ) -> Result<ReportSummary> {
        let cancel = self.reset_token();
        let cases = self.discover(source).await?;
        let outcomes: Vec<TestOutcome> =
            cases.into_iter().filter_map(|case| case.outcome).collect();
        Ok(report(&outcomes, sink, &cancel))
    }

    /// Run only the `requested` tests and report them to `sink`.
    ///
    /// Each distinct source is run once, in the order it first appears.
    pub async fn run_selected<S: ResultSink + ?Sized>(
        &self,
        requested: &[TestCase],
        sink: &mut S,
    ) -> Result<ReportSummary> {
        let cancel = self.reset_token();
        let mut total = ReportSummary::default();

        for source in distinct_sources(requested) {
            if cancel.is_cancelled() {
                total.cancelled = true;
                break;
            }
            let wanted: Vec<String> = requested
                .iter()
                .filter(|case| case.source == source)
                .map(|case| case.identifier.clone())
                .collect();

            let config = ExecuteConfig::load(&source).await?;
            let run = run_session(&config, &self.options).await?;
            let outcomes = correlate(&run.records, &Selection::Only(wanted));
            let summary = report(&outcomes, sink, &cancel);

            total.delivered += summary.delivered;
            total.passed += summary.passed;
            total.failed += summary.failed;
            if summary.cancelled {
                total.cancelled = true;
                break;
            }
        }
        Ok(total)
    }
}

fn distinct_sources(cases: &[TestCase]) -> Vec<PathBuf> {
    let mut sources: Vec<PathBuf> = Vec::new();
    for case in cases {
        if !sources.contains(&case.source) {
            sources.push(case.source.clone());
        }
    }
    sources
}
