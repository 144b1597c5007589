//! Centralized path management for noderig data directories.
//!
//! | Platform | Cache Dir | Lock Dir |
//! |----------|-----------|----------|
//! | **macOS** | `~/Library/Caches/noderig` | `$TMPDIR/noderig/locks` |
//! | **Linux** | `~/.cache/noderig` (XDG_CACHE_HOME) | `/tmp/noderig/locks` |
//! | **Windows** | `%LOCALAPPDATA%\noderig` | `%TEMP%\noderig\locks` |
//!
//! Every location can be overridden through the environment:
//! - `NODERIG_CACHE_DIR` - Override cache directory
//! - `NODERIG_LOCK_DIR` - Override lock file directory
//! - `NODERIG_DIST_URL` - Override the Node.js distribution mirror

use crate::{Error, Result};
use std::path::PathBuf;

/// Official Node.js release mirror.
pub const DEFAULT_DIST_URL: &str = "https://nodejs.org/download/release";

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

/// Get the cache directory for noderig.
///
/// Resolution order:
/// 1. `NODERIG_CACHE_DIR` environment variable
/// 2. Platform cache directory + `/noderig`
///
/// # Errors
///
/// Returns an error if the cache directory cannot be determined.
pub fn cache_dir() -> Result<PathBuf> {
    if let Some(dir) = env_override("NODERIG_CACHE_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let base = dirs::cache_dir()
        .ok_or_else(|| Error::configuration("Could not determine cache directory"))?;

    Ok(base.join("noderig"))
}

/// Get the directory holding the cross-process lock files.
///
/// The directory is shared by every process on the machine, so it lives in the
/// system temp directory rather than in a per-user location.
///
/// Resolution order:
/// 1. `NODERIG_LOCK_DIR` environment variable
/// 2. System temp directory + `/noderig/locks`
pub fn lock_dir() -> Result<PathBuf> {
    if let Some(dir) = env_override("NODERIG_LOCK_DIR") {
        return Ok(PathBuf::from(dir));
    }

    Ok(std::env::temp_dir().join("noderig").join("locks"))
}

/// Default working directory for Node.js runtimes.
pub fn node_workdir() -> Result<PathBuf> {
    Ok(cache_dir()?.join("node"))
}

/// Base URL of the Node.js distribution mirror.
#[must_use]
pub fn dist_url() -> String {
    env_override("NODERIG_DIST_URL")
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| DEFAULT_DIST_URL.to_string())
}
