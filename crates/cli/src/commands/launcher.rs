//! `write-launcher`

use super::ConfigRequest;
use noderig_core::fsutil::ensure_dir;
use noderig_core::{Error, ExecuteConfig, Result};
use noderig_testing::write_launcher_script;
use std::path::{Path, PathBuf};
use tracing::info;

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| Error::io(e, Some(path.to_path_buf()), "resolve absolute path"))
}

/// Write the launcher into `dir` and, when asked, an execution config using it.
///
/// Paths stored in the config are made absolute so the artifact does not
/// depend on the working directory of whoever reads it.
pub async fn write_launcher(dir: &Path, config: Option<ConfigRequest>) -> Result<String> {
    ensure_dir(dir).await?;
    let script = absolute(&write_launcher_script(dir).await?)?;
    let mut written = vec![script.display().to_string()];

    if let Some(request) = config {
        let execute = ExecuteConfig::new(
            request.interpreter,
            script,
            absolute(&request.test_config)?,
        );
        if let Some(parent) = request.out.parent()
            && !parent.as_os_str().is_empty()
        {
            ensure_dir(parent).await?;
        }
        execute.save(&request.out).await?;
        info!(config = %request.out.display(), "Execution config written");
        written.push(request.out.display().to_string());
    }

    Ok(written.join("\n"))
}
