//! `install-runtime`

use noderig_core::{Platform, Result, paths};
use noderig_tools_node::{ProvisionOptions, Provisioned, RuntimeProvisioner};
use std::path::PathBuf;
use tracing::info;

/// Provision `version` with the machine-wide locks and the configured mirror.
pub async fn provision(
    version: &str,
    workdir: Option<PathBuf>,
    dist_url: Option<String>,
    platform: Option<&str>,
) -> Result<Provisioned> {
    let workdir = match workdir {
        Some(dir) => dir,
        None => paths::node_workdir()?,
    };
    let mut options = ProvisionOptions::new(version, workdir);
    if let Some(url) = dist_url {
        options = options.with_dist_url(url);
    }
    if let Some(platform) = platform {
        options = options.with_platform(Platform::parse(platform)?);
    }

    RuntimeProvisioner::from_env()?.provision(&options).await
}

/// Provision and render the resulting layout as JSON.
pub async fn install_runtime(
    version: &str,
    workdir: Option<PathBuf>,
    dist_url: Option<String>,
    platform: Option<&str>,
) -> Result<String> {
    let provisioned = provision(version, workdir, dist_url, platform).await?;
    info!(
        node = %provisioned.layout.node.display(),
        fresh = provisioned.freshly_installed,
        "Node.js runtime ready"
    );
    Ok(serde_json::to_string_pretty(&provisioned.layout)?)
}
