//! Global npm package installation on top of a provisioned runtime.

use crate::layout::Invocation;
use noderig_core::{Error, Result, SharedLock};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Upper bound on one `npm install -g` run.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Version requested when none is given.
pub const DEFAULT_PACKAGE_VERSION: &str = "latest";

/// A package to install globally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package name, e.g. `jasmine`
    pub name: String,
    /// Version or dist-tag; `latest` when `None`
    pub version: Option<String>,
}

impl PackageSpec {
    /// Create a spec.
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    /// The version that will be requested from npm.
    #[must_use]
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or(DEFAULT_PACKAGE_VERSION)
    }

    /// `name@version` as passed to npm.
    #[must_use]
    pub fn requested(&self) -> String {
        format!("{}@{}", self.name, self.version_or_default())
    }

    /// Key of the machine-wide lock serializing installs of this package version.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("npm-{}", self.requested())
    }
}

/// Runs `npm install -g` under a per-package lock.
pub struct PackageInstaller {
    npm: Invocation,
    locks: SharedLock,
    timeout: Duration,
}

impl PackageInstaller {
    /// Create an installer driving `npm`.
    pub fn new(npm: Invocation, locks: SharedLock) -> Self {
        Self {
            npm,
            locks,
            timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }

    /// Override the install time bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Install `name@version` globally.
    pub async fn install(&self, name: &str, version: Option<&str>) -> Result<()> {
        self.install_spec(&PackageSpec::new(name, version.map(str::to_string)))
            .await
    }

    /// Install several packages one after another.
    ///
    /// Each package takes its own lock, which is released before the next one
    /// is acquired. Stops at the first failure.
    pub async fn install_all(&self, packages: &[PackageSpec]) -> Result<()> {
        for package in packages {
            self.install_spec(package).await?;
        }
        Ok(())
    }

    /// Install one package.
    pub async fn install_spec(&self, package: &PackageSpec) -> Result<()> {
        if package.name.trim().is_empty() {
            return Err(Error::configuration("package name must not be empty"));
        }
        let requested = package.requested();

        let _guard = self.locks.acquire(&package.lock_key()).await?;
        info!(package = %requested, "Installing global package");

        let mut command = self.npm.command(["install", "-g", requested.as_str()]);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            Error::process(format!("Failed to start package manager {}: {e}", self.npm))
        })?;

        let stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut output = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut output).await;
            }
            output
        });

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status.map_err(|e| {
                Error::process(format!("Failed to wait for package manager: {e}"))
            })?,
            Err(_) => {
                warn!(
                    package = %requested,
                    timeout_secs = self.timeout.as_secs(),
                    "Package install timed out, killing npm"
                );
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill package manager");
                }
                stderr_reader.abort();
                return Err(Error::InstallationTimeout {
                    package: requested,
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            let stderr = stderr_reader.await.unwrap_or_default();
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no output");
            return Err(Error::package_install(
                requested,
                format!("package manager exited with {status}: {detail}"),
            ));
        }

        debug!(package = %requested, "Global package installed");
        Ok(())
    }
}
