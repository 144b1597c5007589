//! One execution of a Jasmine suite: bind, spawn, read, join.

use crate::channel::ResultChannel;
use crate::launcher::Launcher;
use crate::protocol::SpecRecord;
use noderig_core::{Error, ExecuteConfig, Result};
use std::process::ExitStatus;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long the reader may keep going after the child has exited.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Tuning for suite executions.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Time allowed for the result stream to finish once the child has exited
    pub grace_period: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl RunOptions {
    /// Override the grace period.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

/// Everything one execution produced.
#[derive(Debug)]
pub struct SessionRun {
    /// Token that named the result channel
    pub token: Uuid,
    /// Records in emission order
    pub records: Vec<SpecRecord>,
    /// How the child exited
    pub exit_status: ExitStatus,
}

/// Run the whole suite described by `config` once.
///
/// The channel is bound before the child starts and read by a single task.
/// The run succeeds only when the stream reached its end-of-stream marker; a
/// non-zero exit of the child (Jasmine exits 1 when specs fail) is not an
/// error by itself.
pub async fn run_session(config: &ExecuteConfig, options: &RunOptions) -> Result<SessionRun> {
    let token = Uuid::new_v4();
    let channel = ResultChannel::bind(token)?;
    let endpoint = channel.endpoint().to_path_buf();
    let received = channel.received_counter();
    let mut reader = tokio::spawn(channel.receive());

    let mut child = match Launcher::spawn(config, &token, &endpoint) {
        Ok(child) => child,
        Err(e) => {
            reader.abort();
            return Err(e);
        }
    };

    let exit_status = match child.wait().await {
        Ok(status) => status,
        Err(e) => {
            reader.abort();
            return Err(Error::process(format!("Failed to wait for test process: {e}")));
        }
    };
    debug!(%token, %exit_status, "Test process exited");

    let records = match tokio::time::timeout(options.grace_period, &mut reader).await {
        Ok(Ok(records)) => records?,
        Ok(Err(join)) => return Err(Error::process(format!("Result reader failed: {join}"))),
        Err(_) => {
            let received = received.load(Ordering::Acquire);
            warn!(
                %token,
                received,
                grace_ms = options.grace_period.as_millis(),
                "Result stream did not finish after the test process exited"
            );
            reader.abort();
            return Err(Error::IncompleteStream { received });
        }
    };

    info!(%token, specs = records.len(), "Test run complete");
    Ok(SessionRun {
        token,
        records,
        exit_status,
    })
}
