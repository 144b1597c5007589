//! Where things live inside an installed Node.js distribution.

use noderig_core::Platform;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// A program plus the leading arguments needed to run it.
///
/// On Unix `npm` is not a standalone executable but `node npm-cli.js`, so a
/// bare path is not enough to describe how to run it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Executable to spawn
    pub program: PathBuf,
    /// Arguments placed before any caller arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Invocation {
    /// An invocation of a bare program.
    pub fn program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append a leading argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Build a command running this invocation followed by `extra`.
    pub fn command<I, S>(&self, extra: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(&self.args).args(extra);
        command
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Paths of an installed runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeLayout {
    /// Unpacked distribution directory
    pub root: PathBuf,
    /// Directory global packages are installed into
    pub global_modules: PathBuf,
    /// The `node` executable
    pub node: PathBuf,
    /// How to run `npm`
    pub npm: Invocation,
}

impl RuntimeLayout {
    /// Layout of a distribution unpacked at `root` for `platform`.
    #[must_use]
    pub fn for_platform(root: &Path, platform: Platform) -> Self {
        if platform.is_windows_family() {
            Self {
                root: root.to_path_buf(),
                global_modules: root.join("node_modules"),
                node: root.join("node.exe"),
                npm: Invocation::program(root.join("npm.cmd")),
            }
        } else {
            let global_modules = root.join("lib").join("node_modules");
            let node = root.join("bin").join("node");
            let npm_cli = global_modules.join("npm").join("bin").join("npm-cli.js");
            Self {
                root: root.to_path_buf(),
                npm: Invocation::program(&node).arg(npm_cli.to_string_lossy()),
                global_modules,
                node,
            }
        }
    }

    /// Invocation of a script shipped by a globally installed package,
    /// e.g. `package_script("jasmine", "bin/jasmine.js")`.
    #[must_use]
    pub fn package_script(&self, package: &str, script: &str) -> Invocation {
        let path = self.global_modules.join(package).join(script);
        Invocation::program(&self.node).arg(path.to_string_lossy())
    }
}
