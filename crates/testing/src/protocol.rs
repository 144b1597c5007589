//! Line protocol between the launcher script and the host.
//!
//! The child writes one JSON-encoded [`SpecRecord`] per line as each spec
//! finishes, then a line holding only [`SENTINEL`] once the whole suite is
//! done. Lines end with `\n`; a trailing `\r` is tolerated and blank lines are
//! ignored. Anything else is a protocol error: a garbled stream cannot be
//! trusted, so decoding stops at the first bad line.

use noderig_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// End-of-stream marker (U+0004, end of transmission).
pub const SENTINEL: &str = "\u{4}";

/// Final status of one spec as reported by Jasmine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecStatus {
    /// Every expectation held
    Passed,
    /// At least one expectation failed or the spec threw
    Failed,
    /// Marked pending or had no expectations body
    Pending,
    /// Filtered out (`xit`, `fit` elsewhere)
    Excluded,
    /// Any status this version does not know
    #[serde(other)]
    Unknown,
}

/// One failed expectation of a spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    /// Matcher that failed, e.g. `toBe`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher_name: Option<String>,
    /// Failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// JavaScript stack trace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Always `false` for failed expectations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

/// Result of one spec, exactly as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecRecord {
    /// Suite descriptions and spec description joined by spaces
    pub full_name: String,
    /// Final status
    pub status: SpecStatus,
    /// Wall time in milliseconds
    #[serde(
        default,
        rename = "duration",
        alias = "durationMillis",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_millis: Option<u64>,
    /// Expectations that failed, in order
    #[serde(default)]
    pub failed_expectations: Vec<Expectation>,
}

impl SpecRecord {
    /// A record with no duration and no failures.
    pub fn new(full_name: impl Into<String>, status: SpecStatus) -> Self {
        Self {
            full_name: full_name.into(),
            status,
            duration_millis: None,
            failed_expectations: Vec::new(),
        }
    }
}

/// A decoded protocol line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A finished spec
    Record(SpecRecord),
    /// The sentinel
    End,
}

/// Decode one line. Blank lines decode to `None`.
pub fn decode_line(line: &str) -> Result<Option<Frame>> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() {
        return Ok(None);
    }
    if line == SENTINEL {
        return Ok(Some(Frame::End));
    }
    serde_json::from_str(line)
        .map(|record| Some(Frame::Record(record)))
        .map_err(|e| Error::protocol_format(line, e.to_string()))
}

/// Read records until the sentinel.
///
/// Records are returned in the order they were written. End of input before
/// the sentinel is [`Error::IncompleteStream`].
pub async fn read_records<R: AsyncBufRead + Unpin>(reader: R) -> Result<Vec<SpecRecord>> {
    read_records_counted(reader, &AtomicUsize::new(0)).await
}

/// [`read_records`], publishing the number of records decoded so far to
/// `received` so another task can observe a stream that never finishes.
pub async fn read_records_counted<R: AsyncBufRead + Unpin>(
    reader: R,
    received: &AtomicUsize,
) -> Result<Vec<SpecRecord>> {
    let mut lines = reader.lines();
    let mut records = Vec::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::io(e, None, "read result stream"))?
    {
        match decode_line(&line)? {
            Some(Frame::Record(record)) => {
                trace!(spec = %record.full_name, status = ?record.status, "Decoded spec record");
                records.push(record);
                received.store(records.len(), Ordering::Release);
            }
            Some(Frame::End) => return Ok(records),
            None => {}
        }
    }

    Err(Error::IncompleteStream {
        received: records.len(),
    })
}

/// Writer side of the protocol.
///
/// Mirrors the reporter installed by the launcher script: one call per
/// finished spec, then one call when the suite is done.
pub struct ProtocolWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ProtocolWriter<W> {
    /// Wrap a connected stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Report a finished spec.
    pub async fn spec_done(&mut self, record: &SpecRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .await
            .map_err(|e| Error::io(e, None, "write spec record"))
    }

    /// Write the sentinel and close the stream.
    pub async fn jasmine_done(mut self) -> Result<()> {
        self.writer
            .write_all(format!("{SENTINEL}\n").as_bytes())
            .await
            .map_err(|e| Error::io(e, None, "write end-of-stream marker"))?;
        self.writer
            .shutdown()
            .await
            .map_err(|e| Error::io(e, None, "close result stream"))
    }
}
