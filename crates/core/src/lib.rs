//! Core types and error handling for noderig
//!
//! This crate provides the pieces shared by the runtime provisioner and the
//! test runner:
//! - The [`Error`] taxonomy with structured causes and [`Error::render_chain`]
//! - Machine-wide named locks via the [`lock`] module
//! - Host [`platform`] detection in Node.js distribution terms
//! - Directory resolution with environment overrides in [`paths`]
//! - The persisted [`ExecuteConfig`] artifact

pub mod error;
pub mod execute;
pub mod fsutil;
pub mod lock;
pub mod paths;
pub mod platform;

pub use error::{Error, Result};
pub use execute::ExecuteConfig;
pub use lock::{FileLocks, InProcessLocks, LockGuard, NamedLock, SharedLock};
pub use platform::{Arch, Os, Platform};
