//! Host platform detection in Node.js distribution terms.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Platform identifier combining OS and architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system family
    pub os: Os,
    /// CPU architecture
    pub arch: Arch,
}

impl Platform {
    /// Create a new platform.
    #[must_use]
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    /// Detect the platform this process runs on.
    pub fn current() -> Result<Self> {
        Ok(Self {
            os: Os::current()?,
            arch: Arch::current()?,
        })
    }

    /// Parse from a string like `linux-x64` or `darwin-arm64`.
    pub fn parse(s: &str) -> Result<Self> {
        let (os, arch) = s
            .split_once('-')
            .ok_or_else(|| Error::unsupported_platform(format!("'{s}' is not os-arch")))?;
        Ok(Self {
            os: Os::parse(os)?,
            arch: Arch::parse(arch)?,
        })
    }

    /// Whether this platform uses the Windows distribution layout.
    #[must_use]
    pub fn is_windows_family(&self) -> bool {
        self.os == Os::Windows
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// Operating system, spelled the way Node.js names its distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// `win`
    #[serde(rename = "win")]
    Windows,
    /// `darwin`
    Darwin,
    /// `linux`
    Linux,
}

impl Os {
    /// Get the current OS.
    pub fn current() -> Result<Self> {
        Self::parse(std::env::consts::OS)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "win" | "windows" | "win32" => Ok(Self::Windows),
            "darwin" | "macos" | "osx" => Ok(Self::Darwin),
            "linux" => Ok(Self::Linux),
            other => Err(Error::unsupported_platform(format!(
                "no Node.js distribution for operating system '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Os {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windows => write!(f, "win"),
            Self::Darwin => write!(f, "darwin"),
            Self::Linux => write!(f, "linux"),
        }
    }
}

/// CPU architecture, spelled the way Node.js names its distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit x86
    X64,
    /// 32-bit x86
    X86,
    /// 64-bit ARM
    Arm64,
    /// 32-bit ARMv7
    Armv7l,
}

impl Arch {
    /// Get the current architecture.
    pub fn current() -> Result<Self> {
        Self::parse(std::env::consts::ARCH)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "x64" | "x86_64" | "amd64" => Ok(Self::X64),
            "x86" | "i386" | "i686" | "ia32" => Ok(Self::X86),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            "armv7l" | "arm" | "armv7" => Ok(Self::Armv7l),
            other => Err(Error::unsupported_platform(format!(
                "no Node.js distribution for architecture '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::X64 => write!(f, "x64"),
            Self::X86 => write!(f, "x86"),
            Self::Arm64 => write!(f, "arm64"),
            Self::Armv7l => write!(f, "armv7l"),
        }
    }
}
