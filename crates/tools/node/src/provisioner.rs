//! Idempotent, concurrency-safe installation of a pinned Node.js runtime.
//!
//! A provision walks a fixed sequence of steps:
//!
//! 1. resolve the distribution identifier for the requested version
//! 2. take the machine-wide lock for that version
//! 3. if the lock marker already names the version, stop here
//! 4. reuse the cached archive if it verifies, otherwise download and verify
//! 5. unpack and write the lock marker
//!
//! The marker is written last, so its presence means the runtime is complete.
//! Every waiter re-checks the marker after acquiring the lock, which makes
//! concurrent provisions of one version download and unpack it exactly once.

use crate::distribution::DistributionId;
use crate::extract;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::integrity::IntegrityVerifier;
use crate::layout::RuntimeLayout;
use noderig_core::fsutil::{ensure_dir, remove_file_if_exists, write_atomic};
use noderig_core::{Error, FileLocks, Platform, Result, SharedLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What to provision.
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Exact `major.minor.patch` version, optionally prefixed with `v`
    pub version: String,
    /// Directory holding archives and unpacked runtimes
    pub workdir: PathBuf,
    /// Mirror base URL
    pub dist_url: String,
    /// Target platform; the host platform when `None`
    pub platform: Option<Platform>,
}

impl ProvisionOptions {
    /// Options for `version` under `workdir` using the configured mirror.
    pub fn new(version: impl Into<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            workdir: workdir.into(),
            dist_url: noderig_core::paths::dist_url(),
            platform: None,
        }
    }

    /// Use a different distribution mirror.
    #[must_use]
    pub fn with_dist_url(mut self, url: impl Into<String>) -> Self {
        self.dist_url = url.into();
        self
    }

    /// Provision for a platform other than the host's.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }
}

/// Result of a successful provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    /// Paths of the installed runtime
    pub layout: RuntimeLayout,
    /// Whether this call unpacked the runtime, as opposed to finding it installed
    pub freshly_installed: bool,
}

/// Installs Node.js runtimes.
pub struct RuntimeProvisioner {
    fetcher: Arc<dyn Fetcher>,
    locks: SharedLock,
}

impl RuntimeProvisioner {
    /// Create a provisioner from its collaborators.
    pub fn new(fetcher: Arc<dyn Fetcher>, locks: SharedLock) -> Self {
        Self { fetcher, locks }
    }

    /// Provisioner using HTTP and the machine-wide lock directory.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(
            Arc::new(HttpFetcher::new()?),
            Arc::new(FileLocks::from_env()?),
        ))
    }

    /// Ensure the requested runtime is installed and return its layout.
    ///
    /// Any failure is wrapped in [`Error::Provisioning`] and its full causal
    /// chain is logged once.
    pub async fn provision(&self, options: &ProvisionOptions) -> Result<Provisioned> {
        info!(
            version = %options.version,
            workdir = %options.workdir.display(),
            "Ensuring Node.js runtime"
        );
        match self.provision_steps(options).await {
            Ok(provisioned) => Ok(provisioned),
            Err(e) => {
                let err = Error::provisioning(&options.version, e);
                error!(chain = %err.render_chain(), "Node.js installation failed");
                Err(err)
            }
        }
    }

    async fn provision_steps(&self, options: &ProvisionOptions) -> Result<Provisioned> {
        if options.workdir.as_os_str().is_empty() {
            return Err(Error::configuration("working directory must not be empty"));
        }
        let platform = match options.platform {
            Some(platform) => platform,
            None => Platform::current()?,
        };
        let id = DistributionId::new(&options.version, platform)?;
        let paths = InstallPaths::new(&options.workdir, &id);

        ensure_dir(&options.workdir).await?;

        let _guard = self.locks.acquire(&id.lock_key()).await?;

        let layout = RuntimeLayout::for_platform(&paths.runtime_dir, platform);
        if is_installed(&paths.marker, id.version()).await {
            debug!(root = %paths.runtime_dir.display(), "Node.js already installed");
            return Ok(Provisioned {
                layout,
                freshly_installed: false,
            });
        }

        self.ensure_archive(&id, &paths, &options.dist_url).await?;

        info!(archive = %paths.archive.display(), "Unpacking Node.js distribution");
        extract::unpack(&paths.archive, &paths.runtime_dir).await?;
        write_atomic(&paths.marker, id.version().as_bytes()).await?;

        info!(root = %paths.runtime_dir.display(), "Node.js installed");
        Ok(Provisioned {
            layout,
            freshly_installed: true,
        })
    }

    async fn ensure_archive(
        &self,
        id: &DistributionId,
        paths: &InstallPaths,
        dist_url: &str,
    ) -> Result<()> {
        let verifier = IntegrityVerifier::new(self.fetcher.as_ref());
        let manifest_url = id.manifest_url(dist_url);
        let archive_name = id.archive_name();

        if verifier.verify(&paths.archive, &manifest_url, &archive_name).await? {
            debug!(archive = %paths.archive.display(), "Reusing verified archive");
            return Ok(());
        }
        if paths.archive.exists() {
            warn!(
                archive = %paths.archive.display(),
                "Cached archive failed verification, downloading again"
            );
            remove_file_if_exists(&paths.archive).await?;
        }

        let url = id.archive_url(dist_url);
        let partial = paths.partial_archive();
        info!(%url, "Downloading Node.js distribution");
        if let Err(e) = self.fetcher.download_to(&url, &partial).await {
            let _ = remove_file_if_exists(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, &paths.archive)
            .await
            .map_err(|e| Error::io(e, Some(paths.archive.clone()), "rename"))?;

        if let Some((expected, actual)) = verifier
            .check(&paths.archive, &manifest_url, &archive_name)
            .await?
        {
            remove_file_if_exists(&paths.archive).await?;
            return Err(Error::corrupt_download(archive_name, expected, actual));
        }
        Ok(())
    }
}

struct InstallPaths {
    archive: PathBuf,
    runtime_dir: PathBuf,
    marker: PathBuf,
}

impl InstallPaths {
    fn new(workdir: &Path, id: &DistributionId) -> Self {
        let name = id.name();
        let runtime_dir = workdir.join(&name);
        Self {
            archive: workdir.join(id.archive_name()),
            marker: runtime_dir.join(format!("{name}.lock")),
            runtime_dir,
        }
    }

    fn partial_archive(&self) -> PathBuf {
        let mut name = self.archive.as_os_str().to_os_string();
        name.push(".part");
        PathBuf::from(name)
    }
}

async fn is_installed(marker: &Path, version: &str) -> bool {
    tokio::fs::read_to_string(marker)
        .await
        .is_ok_and(|content| content == version)
}
