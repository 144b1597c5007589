//! Jasmine test execution for noderig
//!
//! Runs a Jasmine suite in a provisioned Node.js runtime and streams one
//! record per spec back to the host over a private, token-named channel:
//! - [`protocol`] defines the JSON-lines wire format and its sentinel
//! - [`channel`] binds the private Unix socket or named pipe for one run
//! - [`launcher`] spawns the child with the bundled reporter script
//! - [`correlator`] turns records into host outcomes and delivers them
//! - [`adapter`] ties it together as discover / run / cancel

pub mod adapter;
pub mod channel;
pub mod correlator;
pub mod launcher;
pub mod protocol;
pub mod runner;

pub use adapter::{TestAdapter, TestCase};
pub use channel::{ENDPOINT_ENV, ResultChannel, channel_name};
#[cfg(windows)]
pub use channel::pipe_path;
#[cfg(unix)]
pub use channel::socket_path;
pub use correlator::{
    Outcome, ReportSummary, ResultSink, Selection, TestOutcome, correlate, report,
};
pub use launcher::{
    LAUNCHER_FILE_NAME, LAUNCHER_SCRIPT, Launcher, global_modules_dir, write_launcher_script,
};
pub use protocol::{
    Expectation, Frame, ProtocolWriter, SENTINEL, SpecRecord, SpecStatus, read_records,
    read_records_counted,
};
pub use runner::{DEFAULT_GRACE_PERIOD, RunOptions, SessionRun, run_session};
