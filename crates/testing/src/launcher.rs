//! Spawning of the Node.js child that runs a Jasmine suite.

use crate::channel::ENDPOINT_ENV;
use noderig_core::fsutil::write_atomic;
use noderig_core::{Error, ExecuteConfig, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::debug;
use uuid::Uuid;

/// The bundled launcher script.
///
/// Resolves `jasmine` from `NODE_PATH`, the running runtime's global modules,
/// then the project, waits for the Jasmine config given as its first argument
/// to load,
/// replaces every reporter with the protocol reporter and streams results to
/// the endpoint named by [`ENDPOINT_ENV`]. The session token is its second
/// argument.
pub const LAUNCHER_SCRIPT: &str = include_str!("../assets/launcher.js");

/// File name used by [`write_launcher_script`].
pub const LAUNCHER_FILE_NAME: &str = "noderig-launcher.js";

/// Write the bundled launcher script into `dir`, returning its path.
pub async fn write_launcher_script(dir: &Path) -> Result<PathBuf> {
    let path = dir.join(LAUNCHER_FILE_NAME);
    write_atomic(&path, LAUNCHER_SCRIPT.as_bytes()).await?;
    debug!(path = %path.display(), "Launcher script written");
    Ok(path)
}

/// Builds and spawns launcher invocations.
pub struct Launcher;

impl Launcher {
    /// `interpreter launcher-script test-config token`, with output piped.
    ///
    /// The child gets the channel address in [`ENDPOINT_ENV`] and the
    /// interpreter's global `node_modules` in front of `NODE_PATH`.
    #[must_use]
    pub fn command(config: &ExecuteConfig, token: &Uuid, endpoint: &Path) -> Command {
        let mut command = Command::new(&config.interpreter_path);
        command
            .arg(&config.launcher_script_path)
            .arg(&config.test_config_path)
            .arg(token.to_string())
            .env(ENDPOINT_ENV, endpoint);
        if let Some(node_path) = node_path(&config.interpreter_path) {
            command.env("NODE_PATH", node_path);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Spawn the child and forward its output to the log.
    pub fn spawn(config: &ExecuteConfig, token: &Uuid, endpoint: &Path) -> Result<Child> {
        debug!(
            interpreter = %config.interpreter_path.display(),
            launcher = %config.launcher_script_path.display(),
            config = %config.test_config_path.display(),
            %token,
            endpoint = %endpoint.display(),
            "Starting test process"
        );
        let mut child = Self::command(config, token, endpoint).spawn().map_err(|e| {
            Error::process(format!(
                "Failed to start {}: {e}",
                config.interpreter_path.display()
            ))
        })?;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, "stderr");
        }
        Ok(child)
    }
}

/// Where `npm install -g` puts packages for the runtime owning `interpreter`.
#[must_use]
pub fn global_modules_dir(interpreter: &Path) -> Option<PathBuf> {
    let bin = interpreter.parent()?;
    if cfg!(windows) {
        Some(bin.join("node_modules"))
    } else {
        Some(bin.parent()?.join("lib").join("node_modules"))
    }
}

fn node_path(interpreter: &Path) -> Option<OsString> {
    let global = global_modules_dir(interpreter)?;
    let inherited = std::env::var_os("NODE_PATH");
    let paths = std::iter::once(global).chain(
        inherited
            .iter()
            .flat_map(std::env::split_paths)
            .filter(|p| !p.as_os_str().is_empty()),
    );
    std::env::join_paths(paths).ok()
}

fn forward_lines<R: AsyncRead + Unpin + Send + 'static>(stream: R, name: &'static str) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(stream = name, "{line}");
        }
    });
}
