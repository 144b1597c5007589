//! Node.js runtime provisioning for noderig
//!
//! Downloads a pinned Node.js release from the official mirror (or any mirror
//! with the same layout), verifies it against the published `SHASUMS256.txt`,
//! unpacks it and marks it installed. Installs of the same version are
//! serialized machine-wide, so any number of processes can ask for the same
//! runtime at once.
//!
//! On top of a runtime, [`PackageInstaller`] installs global npm packages
//! such as `jasmine`.
//!
//! # Example
//!
//! ```ignore
//! use noderig_tools_node::{ProvisionOptions, RuntimeProvisioner};
//!
//! let provisioner = RuntimeProvisioner::from_env()?;
//! let provisioned = provisioner
//!     .provision(&ProvisionOptions::new("18.0.0", "/var/cache/noderig/node"))
//!     .await?;
//! println!("node is at {}", provisioned.layout.node.display());
//! ```

pub mod distribution;
pub mod extract;
pub mod fetch;
pub mod integrity;
pub mod layout;
pub mod packages;
pub mod provisioner;

pub use distribution::{DistributionId, MANIFEST_FILE};
pub use fetch::{Fetcher, HttpFetcher};
pub use integrity::{IntegrityVerifier, compute_hash};
pub use layout::{Invocation, RuntimeLayout};
pub use packages::{DEFAULT_INSTALL_TIMEOUT, PackageInstaller, PackageSpec};
pub use provisioner::{ProvisionOptions, Provisioned, RuntimeProvisioner};
