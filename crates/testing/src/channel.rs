//! Private rendezvous endpoint carrying the protocol stream of one run.
//!
//! The endpoint name is derived from the run's session token, so concurrent
//! runs on one machine never share an endpoint. On Unix it is a socket file
//! inside a fresh directory only the current user can enter, under the user's
//! runtime directory (or `/tmp` where there is none); on Windows it is a named
//! pipe. The child learns the address from [`ENDPOINT_ENV`].

use crate::protocol::{SpecRecord, read_records_counted};
use noderig_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::io::BufReader;
use tracing::debug;
use uuid::Uuid;

/// Environment variable holding the endpoint address for the launcher.
pub const ENDPOINT_ENV: &str = "NODERIG_REPORTER_ENDPOINT";

/// Name of the endpoint for `token`, without platform decoration.
#[must_use]
pub fn channel_name(token: &Uuid) -> String {
    format!("noderig-reporter-{token}")
}

/// Unix socket path for `token` inside `dir`.
#[cfg(unix)]
#[must_use]
pub fn socket_path(dir: &Path, token: &Uuid) -> PathBuf {
    dir.join(format!("{}.sock", channel_name(token)))
}

/// Named pipe address for `token`.
#[cfg(windows)]
#[must_use]
pub fn pipe_path(token: &Uuid) -> PathBuf {
    PathBuf::from(format!(r"\\.\pipe\{}", channel_name(token)))
}

#[cfg(unix)]
type Listener = tokio::net::UnixListener;
#[cfg(windows)]
type Listener = tokio::net::windows::named_pipe::NamedPipeServer;

/// Server side of the result channel.
///
/// Bind it before spawning the child so the child can connect as soon as it
/// starts. Exactly one connection is accepted.
pub struct ResultChannel {
    token: Uuid,
    endpoint: PathBuf,
    listener: Listener,
    received: Arc<AtomicUsize>,
    // Removing it removes the socket; declared last so the listener closes first.
    #[cfg(unix)]
    _dir: tempfile::TempDir,
}

impl ResultChannel {
    /// Create the endpoint for `token`.
    #[cfg(unix)]
    pub fn bind(token: Uuid) -> Result<Self> {
        let base = dirs::runtime_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
        let dir = tempfile::Builder::new()
            .prefix("noderig-")
            .tempdir_in(&base)
            .map_err(|e| Error::io(e, Some(base.clone()), "create result channel directory"))?;
        restrict_to_owner(dir.path())?;

        let endpoint = socket_path(dir.path(), &token);
        let listener = tokio::net::UnixListener::bind(&endpoint)
            .map_err(|e| Error::io(e, Some(endpoint.clone()), "bind result socket"))?;
        debug!(endpoint = %endpoint.display(), "Result channel bound");
        Ok(Self {
            token,
            endpoint,
            listener,
            received: Arc::default(),
            _dir: dir,
        })
    }

    /// Create the endpoint for `token`.
    #[cfg(windows)]
    pub fn bind(token: Uuid) -> Result<Self> {
        let endpoint = pipe_path(&token);
        let listener = tokio::net::windows::named_pipe::ServerOptions::new()
            .first_pipe_instance(true)
            .create(&endpoint)
            .map_err(|e| Error::io(e, Some(endpoint.clone()), "create result pipe"))?;
        debug!(endpoint = %endpoint.display(), "Result channel bound");
        Ok(Self {
            token,
            endpoint,
            listener,
            received: Arc::default(),
        })
    }

    /// Session token this channel belongs to.
    #[must_use]
    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Address the child connects to.
    #[must_use]
    pub fn endpoint(&self) -> &Path {
        &self.endpoint
    }

    /// Number of records decoded so far, updated while [`Self::receive`] runs.
    #[must_use]
    pub fn received_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.received)
    }

    /// Wait for the child to connect and decode its stream up to the sentinel.
    #[cfg_attr(not(windows), allow(unused_mut))]
    pub async fn receive(mut self) -> Result<Vec<SpecRecord>> {
        #[cfg(unix)]
        let stream = {
            let (stream, _) = self.listener.accept().await.map_err(|e| {
                Error::io(e, Some(self.endpoint.clone()), "accept result connection")
            })?;
            stream
        };
        #[cfg(windows)]
        let stream = {
            self.listener.connect().await.map_err(|e| {
                Error::io(e, Some(self.endpoint.clone()), "accept result connection")
            })?;
            &mut self.listener
        };

        debug!(endpoint = %self.endpoint.display(), "Reporter connected");
        let records = read_records_counted(BufReader::new(stream), &self.received).await?;
        debug!(count = records.len(), "Result stream complete");
        Ok(records)
    }
}

#[cfg(unix)]
fn restrict_to_owner(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| Error::io(e, Some(dir.to_path_buf()), "restrict result channel directory"))
}
