pub mod launcher;
pub mod package;
pub mod runtime;
pub mod test;

use crate::shutdown::ShutdownCoordinator;
use noderig_core::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, event};

/// A parsed CLI command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InstallRuntime {
        node_version: String,
        workdir: Option<PathBuf>,
        dist_url: Option<String>,
        platform: Option<String>,
    },
    InstallPackage {
        name: String,
        package_version: Option<String>,
        npm: NpmSource,
        timeout_secs: u64,
    },
    WriteLauncher {
        dir: PathBuf,
        config: Option<ConfigRequest>,
    },
    Discover {
        config: PathBuf,
    },
    Run {
        config: PathBuf,
        tests: Vec<String>,
    },
}

impl Command {
    /// Name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstallRuntime { .. } => "install-runtime",
            Self::InstallPackage { .. } => "install-package",
            Self::WriteLauncher { .. } => "write-launcher",
            Self::Discover { .. } => "discover",
            Self::Run { .. } => "run",
        }
    }
}

/// Where `install-package` finds npm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NpmSource {
    /// An explicit program and leading arguments
    Program { program: PathBuf, args: Vec<String> },
    /// The npm bundled with a provisioned runtime
    Runtime {
        version: String,
        workdir: Option<PathBuf>,
    },
    /// `npm` from `PATH`
    Path,
}

/// Execution config to write next to the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRequest {
    pub out: PathBuf,
    pub interpreter: PathBuf,
    pub test_config: PathBuf,
}

/// What a finished command hands back to `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text for stdout, if any
    pub stdout: Option<String>,
    /// Whether the process should exit successfully
    pub success: bool,
}

impl CommandOutput {
    fn text(stdout: String) -> Self {
        Self {
            stdout: Some(stdout),
            success: true,
        }
    }
}

pub struct CommandExecutor {
    shutdown: ShutdownCoordinator,
}

impl CommandExecutor {
    pub fn new(shutdown: ShutdownCoordinator) -> Self {
        Self { shutdown }
    }

    pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
        let name = command.name();
        event!(Level::DEBUG, command = name, "Executing command");

        let output = match command {
            Command::InstallRuntime {
                node_version,
                workdir,
                dist_url,
                platform,
            } => {
                let layout = runtime::install_runtime(
                    &node_version,
                    workdir,
                    dist_url,
                    platform.as_deref(),
                )
                .await?;
                CommandOutput::text(layout)
            }
            Command::InstallPackage {
                name,
                package_version,
                npm,
                timeout_secs,
            } => CommandOutput::text(
                package::install_package(
                    &name,
                    package_version.as_deref(),
                    npm,
                    Duration::from_secs(timeout_secs),
                )
                .await?,
            ),
            Command::WriteLauncher { dir, config } => {
                CommandOutput::text(launcher::write_launcher(&dir, config).await?)
            }
            Command::Discover { config } => CommandOutput::text(test::discover(&config).await?),
            Command::Run { config, tests } => {
                let summary = test::run(&config, tests, &self.shutdown).await?;
                CommandOutput {
                    stdout: Some(test::summary_line(&summary)),
                    success: summary.is_success(),
                }
            }
        };

        event!(Level::DEBUG, command = name, success = output.success, "Command finished");
        Ok(output)
    }
}
