//! `install-package`

use super::NpmSource;
use super::runtime::provision;
use noderig_core::{FileLocks, Result};
use noderig_tools_node::{Invocation, PackageInstaller, PackageSpec};
use std::sync::Arc;
use std::time::Duration;

#[cfg(windows)]
const PATH_NPM: &str = "npm.cmd";
#[cfg(not(windows))]
const PATH_NPM: &str = "npm";

/// Resolve how to run npm.
pub async fn npm_invocation(source: NpmSource) -> Result<Invocation> {
    match source {
        NpmSource::Program { program, args } => {
            Ok(args
                .into_iter()
                .fold(Invocation::program(program), |npm, arg| npm.arg(arg)))
        }
        NpmSource::Runtime { version, workdir } => {
            Ok(provision(&version, workdir, None, None).await?.layout.npm)
        }
        NpmSource::Path => Ok(Invocation::program(PATH_NPM)),
    }
}

/// Install `name` globally and describe what was installed.
pub async fn install_package(
    name: &str,
    version: Option<&str>,
    npm: NpmSource,
    timeout: Duration,
) -> Result<String> {
    let npm = npm_invocation(npm).await?;
    let installer =
        PackageInstaller::new(npm, Arc::new(FileLocks::from_env()?)).with_timeout(timeout);
    let spec = PackageSpec::new(name, version.map(str::to_string));
    installer.install_spec(&spec).await?;
    Ok(format!("Installed {}", spec.requested()))
}
