//! Naming of Node.js release distributions.

use noderig_core::{Error, Platform, Result};
use regex::Regex;
use std::sync::OnceLock;

/// File name of the checksum manifest published next to every release.
pub const MANIFEST_FILE: &str = "SHASUMS256.txt";

static VERSION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn version_pattern() -> &'static Regex {
    VERSION_PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"^\d+\.\d+\.\d+$").expect("static version pattern is valid")
    })
}

/// Validate an exact `major.minor.patch` version, accepting a leading `v`.
///
/// Returns the version without the prefix.
pub fn normalize_version(version: &str) -> Result<String> {
    let trimmed = version.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    if version_pattern().is_match(bare) {
        Ok(bare.to_string())
    } else {
        Err(Error::invalid_version(version))
    }
}

/// Identifies one Node.js distribution: a version built for a platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistributionId {
    version: String,
    platform: Platform,
}

impl DistributionId {
    /// Create an identifier after validating `version`.
    pub fn new(version: &str, platform: Platform) -> Result<Self> {
        Ok(Self {
            version: normalize_version(version)?,
            platform,
        })
    }

    /// Version without the `v` prefix.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Target platform.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Canonical name, e.g. `node-v18.0.0-linux-x64`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("node-v{}-{}", self.version, self.platform)
    }

    /// Archive file name: `.zip` for Windows, `.tar.gz` everywhere else.
    #[must_use]
    pub fn archive_name(&self) -> String {
        let extension = if self.platform.is_windows_family() {
            "zip"
        } else {
            "tar.gz"
        };
        format!("{}.{extension}", self.name())
    }

    /// Directory on the mirror holding this release.
    #[must_use]
    pub fn release_url(&self, base_url: &str) -> String {
        format!("{}/v{}", base_url.trim_end_matches('/'), self.version)
    }

    /// Download URL of the archive.
    #[must_use]
    pub fn archive_url(&self, base_url: &str) -> String {
        format!("{}/{}", self.release_url(base_url), self.archive_name())
    }

    /// URL of the release's checksum manifest.
    #[must_use]
    pub fn manifest_url(&self, base_url: &str) -> String {
        format!("{}/{MANIFEST_FILE}", self.release_url(base_url))
    }

    /// Key of the machine-wide lock serializing installs of this version.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!("node-{}", self.version)
    }
}

impl std::fmt::Display for DistributionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}
