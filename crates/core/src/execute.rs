//! Persisted description of how to run a test pass.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The execution config artifact.
///
/// Written by the host once the runtime and packages are provisioned and read
/// back once per test pass. Serialized as camelCase JSON:
///
/// ```json
/// {"interpreterPath": "...", "launcherScriptPath": "...", "testConfigPath": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteConfig {
    /// Path of the `node` executable
    pub interpreter_path: PathBuf,
    /// Path of the launcher script that installs the protocol reporter
    pub launcher_script_path: PathBuf,
    /// Path of the Jasmine JSON config naming the spec files
    pub test_config_path: PathBuf,
}

impl ExecuteConfig {
    /// Create a config from its three paths.
    pub fn new(
        interpreter_path: impl Into<PathBuf>,
        launcher_script_path: impl Into<PathBuf>,
        test_config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            interpreter_path: interpreter_path.into(),
            launcher_script_path: launcher_script_path.into(),
            test_config_path: test_config_path.into(),
        }
    }

    /// Read a config artifact from disk.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(e, Some(path.to_path_buf()), "read execution config"))?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::configuration(format!(
                "Invalid execution config {}: {e}",
                path.display()
            ))
        })
    }

    /// Write the config artifact atomically.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_vec_pretty(self)?;
        crate::fsutil::write_atomic(path, &contents).await
    }
}
