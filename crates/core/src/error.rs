//! Error types shared by every noderig crate
//!
//! Errors keep their causes as structured `source()` links. They are only
//! flattened into a single string at the boundary, via [`Error::render_chain`].

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for noderig operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Version string is not an exact `major.minor.patch` release
    #[error("Invalid Node.js version '{version}': expected major.minor.patch")]
    #[diagnostic(
        code(noderig::version::invalid),
        help("Use an exact release such as 18.0.0")
    )]
    InvalidVersion {
        /// The rejected version string
        version: String,
    },

    /// Bad input or configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(code(noderig::config::invalid))]
    InvalidConfiguration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// Operating system or CPU architecture without a Node.js distribution
    #[error("Unsupported platform: {message}")]
    #[diagnostic(code(noderig::platform::unsupported))]
    UnsupportedPlatform {
        /// What was not recognized
        message: String,
    },

    /// Network or HTTP failure while fetching a remote resource
    #[error("Download of {url} failed: {message}")]
    #[diagnostic(code(noderig::download::failed))]
    Download {
        /// The URL being fetched
        url: String,
        /// Short description of the failure
        message: String,
        /// Transport error, if any
        #[source]
        source: Option<BoxedCause>,
    },

    /// The checksum manifest has no entry for a file
    #[error("No hash published for '{file_name}' in {manifest_url}")]
    #[diagnostic(code(noderig::integrity::not_found))]
    HashNotFound {
        /// File the hash was looked up for
        file_name: String,
        /// Manifest that was scanned
        manifest_url: String,
    },

    /// Hash mismatch that persists after a fresh download
    #[error("Downloaded archive {file_name} is corrupted: expected sha256 {expected}, got {actual}")]
    #[diagnostic(
        code(noderig::integrity::corrupt),
        help("The mirror may be serving a broken file; retry later")
    )]
    CorruptDownload {
        /// Archive file name
        file_name: String,
        /// Published hash
        expected: String,
        /// Hash of the bytes on disk
        actual: String,
    },

    /// Archive could not be unpacked
    #[error("Failed to extract {}: {message}", .archive.display())]
    #[diagnostic(code(noderig::extract::failed))]
    Extraction {
        /// Archive path
        archive: Box<Path>,
        /// Error message
        message: String,
    },

    /// Package manager exceeded its time bound and was killed
    #[error("Installing {package} timed out after {seconds} seconds")]
    #[diagnostic(code(noderig::package::timeout))]
    InstallationTimeout {
        /// `name@version` being installed
        package: String,
        /// The bound that was exceeded
        seconds: u64,
    },

    /// Package manager ran but did not succeed
    #[error("Installing {package} failed: {message}")]
    #[diagnostic(code(noderig::package::failed))]
    PackageInstall {
        /// `name@version` being installed
        package: String,
        /// Error message
        message: String,
    },

    /// A line on the result channel could not be decoded
    #[error("Malformed result line {line:?}: {message}")]
    #[diagnostic(
        code(noderig::protocol::format),
        help("The launcher script and the host are out of sync; results cannot be trusted")
    )]
    ProtocolFormat {
        /// The offending line
        line: String,
        /// Decoder message
        message: String,
    },

    /// Result channel closed before the end-of-stream marker
    #[error("Result stream ended after {received} record(s) without the end-of-stream marker")]
    #[diagnostic(code(noderig::protocol::incomplete))]
    IncompleteStream {
        /// Records decoded before the stream ended
        received: usize,
    },

    /// Child process could not be spawned or awaited
    #[error("Process execution failed: {message}")]
    #[diagnostic(code(noderig::process))]
    Process {
        /// The error message describing the process failure
        message: String,
    },

    /// A named lock could not be acquired
    #[error("Failed to acquire lock '{key}'")]
    #[diagnostic(code(noderig::lock))]
    Lock {
        /// Lock key
        key: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}{}", describe_path(.path.as_deref()))]
    #[diagnostic(code(noderig::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<Path>>,
        /// Description of the operation that failed
        operation: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(noderig::serialization))]
    Serialization {
        /// The error message describing the serialization issue
        message: String,
    },

    /// Provisioning of a runtime failed; wraps the first unrecoverable step
    #[error("Node.js {version} installation failed")]
    #[diagnostic(code(noderig::provision::failed))]
    Provisioning {
        /// Requested version
        version: String,
        /// The step that failed
        #[source]
        source: Box<Error>,
    },
}

fn describe_path(path: Option<&Path>) -> String {
    path.map(|p| format!(" on {}", p.display()))
        .unwrap_or_default()
}

impl Error {
    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    /// Create a configuration error with a message
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an unsupported platform error
    pub fn unsupported_platform(message: impl Into<String>) -> Self {
        Self::UnsupportedPlatform {
            message: message.into(),
        }
    }

    /// Create a download error without an underlying transport error
    pub fn download(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a download error caused by a transport error
    pub fn download_with_source(
        url: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Download {
            url: url.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a missing-hash error
    pub fn hash_not_found(file_name: impl Into<String>, manifest_url: impl Into<String>) -> Self {
        Self::HashNotFound {
            file_name: file_name.into(),
            manifest_url: manifest_url.into(),
        }
    }

    /// Create a corrupt download error
    pub fn corrupt_download(
        file_name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::CorruptDownload {
            file_name: file_name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an extraction error
    pub fn extraction(archive: &Path, message: impl Into<String>) -> Self {
        Self::Extraction {
            archive: archive.into(),
            message: message.into(),
        }
    }

    /// Create a package install error
    pub fn package_install(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PackageInstall {
            package: package.into(),
            message: message.into(),
        }
    }

    /// Create a protocol format error naming the offending line
    pub fn protocol_format(line: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProtocolFormat {
            line: line.into(),
            message: message.into(),
        }
    }

    /// Create a process execution error
    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    /// Create a lock acquisition error
    pub fn lock(key: impl Into<String>, source: std::io::Error) -> Self {
        Self::Lock {
            key: key.into(),
            source,
        }
    }

    /// Create an I/O error with context
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(PathBuf::into_boxed_path),
            operation: operation.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Wrap a failed provisioning step
    pub fn provisioning(version: impl Into<String>, source: Self) -> Self {
        Self::Provisioning {
            version: version.into(),
            source: Box::new(source),
        }
    }

    /// Messages of this error and every nested cause, outermost first.
    #[must_use]
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            messages.push(cause.to_string());
            current = cause.source();
        }
        messages
    }

    /// The whole causal chain as one line, innermost message last.
    #[must_use]
    pub fn render_chain(&self) -> String {
        self.chain().join(" -> ")
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io(source, None, "I/O operation")
    }
}

impl From<serde_json::Error> for Error {
    fn from(source: serde_json::Error) -> Self {
        Self::serialization(source.to_string())
    }
}

/// Result type for noderig operations
pub type Result<T> = std::result::Result<T, Error>;
