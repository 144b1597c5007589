use crate::commands::{Command, ConfigRequest, NpmSource};
use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "noderig")]
#[command(about = "Provision pinned Node.js runtimes and run Jasmine suites against them")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,

    #[arg(
        long = "log-format",
        global = true,
        conflicts_with = "json",
        help = "Log format: pretty, compact, json or dev [default: compact]"
    )]
    pub log_format: Option<TracingFormat>,

    #[arg(
        long = "log-filter",
        global = true,
        help = "Tracing filter directive, overriding --level and RUST_LOG"
    )]
    pub log_filter: Option<String>,
}

impl Cli {
    /// Log format selected by `--log-format` or `--json`.
    pub fn tracing_format(&self) -> TracingFormat {
        match (self.log_format, self.json) {
            (Some(format), _) => format,
            (None, true) => TracingFormat::Json,
            (None, false) => TracingFormat::Compact,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Download, verify and unpack a Node.js runtime")]
    InstallRuntime {
        #[arg(
            long = "node-version",
            env = "NODERIG_NODE_VERSION",
            help = "Exact Node.js version, e.g. 18.0.0"
        )]
        node_version: String,
        #[arg(long, help = "Directory holding archives and runtimes [default: <cache>/node]")]
        workdir: Option<PathBuf>,
        #[arg(long, env = "NODERIG_DIST_URL", help = "Distribution mirror base URL")]
        dist_url: Option<String>,
        #[arg(long, help = "Target platform such as linux-x64 [default: host]")]
        platform: Option<String>,
    },
    #[command(about = "Install a global npm package")]
    InstallPackage {
        #[arg(help = "Package name")]
        name: String,
        #[arg(long = "package-version", help = "Version or dist-tag [default: latest]")]
        package_version: Option<String>,
        #[arg(long, help = "npm program to run [default: npm from PATH]")]
        npm: Option<PathBuf>,
        #[arg(
            long = "npm-arg",
            allow_hyphen_values = true,
            requires = "npm",
            help = "Argument placed before `install` (repeatable)"
        )]
        npm_args: Vec<String>,
        #[arg(
            long = "node-version",
            conflicts_with = "npm",
            help = "Use the npm of this provisioned runtime"
        )]
        node_version: Option<String>,
        #[arg(long, help = "Runtime directory used with --node-version [default: <cache>/node]")]
        workdir: Option<PathBuf>,
        #[arg(long = "timeout-secs", default_value_t = 60, help = "Install time bound in seconds")]
        timeout_secs: u64,
    },
    #[command(about = "Write the bundled launcher script, optionally with an execution config")]
    WriteLauncher {
        #[arg(long, help = "Directory to write the launcher into")]
        dir: PathBuf,
        #[arg(
            long = "config-out",
            requires_all = ["interpreter", "test_config"],
            help = "Also write an execution config artifact to this file"
        )]
        config_out: Option<PathBuf>,
        #[arg(long, help = "Path of the node executable for the execution config")]
        interpreter: Option<PathBuf>,
        #[arg(
            long = "test-config",
            help = "Path of the Jasmine JSON config for the execution config"
        )]
        test_config: Option<PathBuf>,
    },
    #[command(about = "Run a suite once and list its tests")]
    Discover {
        #[arg(long, help = "Execution config artifact")]
        config: PathBuf,
    },
    #[command(about = "Run all or selected tests and report their outcomes")]
    Run {
        #[arg(long, help = "Execution config artifact")]
        config: PathBuf,
        #[arg(long = "test", help = "Fully qualified test name to run (repeatable)")]
        tests: Vec<String>,
    },
}

impl From<Commands> for Command {
    fn from(cmd: Commands) -> Self {
        match cmd {
            Commands::InstallRuntime {
                node_version,
                workdir,
                dist_url,
                platform,
            } => Self::InstallRuntime {
                node_version,
                workdir,
                dist_url,
                platform,
            },
            Commands::InstallPackage {
                name,
                package_version,
                npm,
                npm_args,
                node_version,
                workdir,
                timeout_secs,
            } => Self::InstallPackage {
                name,
                package_version,
                npm: match (npm, node_version) {
                    (Some(program), _) => NpmSource::Program {
                        program,
                        args: npm_args,
                    },
                    (None, Some(version)) => NpmSource::Runtime { version, workdir },
                    (None, None) => NpmSource::Path,
                },
                timeout_secs,
            },
            Commands::WriteLauncher {
                dir,
                config_out,
                interpreter,
                test_config,
            } => Self::WriteLauncher {
                dir,
                config: match (config_out, interpreter, test_config) {
                    (Some(out), Some(interpreter), Some(test_config)) => Some(ConfigRequest {
                        out,
                        interpreter,
                        test_config,
                    }),
                    _ => None,
                },
            },
            Commands::Discover { config } => Self::Discover { config },
            Commands::Run { config, tests } => Self::Run { config, tests },
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_values() {
        let cli = Cli::try_parse_from(["noderig", "discover", "--config", "x.json"]).unwrap();

        assert_eq!(cli.level, LogLevel::Warn);
        assert!(!cli.json);
        assert_eq!(cli.tracing_format(), TracingFormat::Compact);
        assert_eq!(cli.log_filter, None);
        assert!(matches!(cli.command, Commands::Discover { .. }));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "noderig", "run", "--config", "x.json", "--level", "debug", "--json",
        ])
        .unwrap();
        assert_eq!(cli.level, LogLevel::Debug);
        assert!(cli.json);
    }

    #[test]
    fn test_log_format_and_filter() {
        let cli = Cli::try_parse_from([
            "noderig",
            "--log-format",
            "dev",
            "--log-filter",
            "noderig_testing=trace",
            "discover",
            "--config",
            "x.json",
        ])
        .unwrap();
        assert_eq!(cli.tracing_format(), TracingFormat::Dev);
        assert_eq!(cli.log_filter.as_deref(), Some("noderig_testing=trace"));

        let cli = Cli::try_parse_from(["noderig", "--json", "discover", "--config", "x"]).unwrap();
        assert_eq!(cli.tracing_format(), TracingFormat::Json);
    }

    #[test]
    fn test_log_format_conflicts_with_json() {
        let result = Cli::try_parse_from([
            "noderig", "--json", "--log-format", "pretty", "discover", "--config", "x",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_log_format() {
        let err = Cli::try_parse_from([
            "noderig",
            "--log-format",
            "loud",
            "discover",
            "--config",
            "x",
        ])
        .unwrap_err();
        assert!(err.to_string().contains("Unknown tracing format: loud"));
    }

    #[test]
    fn test_invalid_log_level() {
        let result =
            Cli::try_parse_from(["noderig", "--level", "loud", "discover", "--config", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_subcommand() {
        assert!(Cli::try_parse_from(["noderig"]).is_err());
    }

    #[test]
    fn test_install_runtime_arguments() {
        let cli = Cli::try_parse_from([
            "noderig",
            "install-runtime",
            "--node-version",
            "18.0.0",
            "--workdir",
            "/tmp/node",
            "--dist-url",
            "https://mirror.example/node",
        ])
        .unwrap();

        let command: Command = cli.command.into();
        assert_eq!(
            command,
            Command::InstallRuntime {
                node_version: "18.0.0".to_string(),
                workdir: Some(PathBuf::from("/tmp/node")),
                dist_url: Some("https://mirror.example/node".to_string()),
                platform: None,
            }
        );
    }

    #[test]
    fn test_install_package_with_program() {
        let cli = Cli::try_parse_from([
            "noderig",
            "install-package",
            "jasmine",
            "--package-version",
            "4.5.0",
            "--npm",
            "/opt/node/bin/node",
            "--npm-arg",
            "/opt/node/lib/node_modules/npm/bin/npm-cli.js",
        ])
        .unwrap();

        let Command::InstallPackage {
            name,
            package_version,
            npm,
            timeout_secs,
        } = cli.command.into()
        else {
            panic!("expected install-package");
        };
        assert_eq!(name, "jasmine");
        assert_eq!(package_version.as_deref(), Some("4.5.0"));
        assert_eq!(timeout_secs, 60);
        assert_eq!(
            npm,
            NpmSource::Program {
                program: PathBuf::from("/opt/node/bin/node"),
                args: vec!["/opt/node/lib/node_modules/npm/bin/npm-cli.js".to_string()],
            }
        );
    }

    #[test]
    fn test_install_package_with_runtime() {
        let cli = Cli::try_parse_from([
            "noderig",
            "install-package",
            "jasmine",
            "--node-version",
            "18.0.0",
        ])
        .unwrap();

        let Command::InstallPackage { npm, .. } = cli.command.into() else {
            panic!("expected install-package");
        };
        assert_eq!(
            npm,
            NpmSource::Runtime {
                version: "18.0.0".to_string(),
                workdir: None,
            }
        );
    }

    #[test]
    fn test_install_package_defaults_to_path_npm() {
        let cli = Cli::try_parse_from(["noderig", "install-package", "jasmine"]).unwrap();
        let Command::InstallPackage { npm, .. } = cli.command.into() else {
            panic!("expected install-package");
        };
        assert_eq!(npm, NpmSource::Path);
    }

    #[test]
    fn test_install_package_sources_conflict() {
        let result = Cli::try_parse_from([
            "noderig",
            "install-package",
            "jasmine",
            "--npm",
            "npm",
            "--node-version",
            "18.0.0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_write_launcher_config_needs_all_paths() {
        let result = Cli::try_parse_from([
            "noderig",
            "write-launcher",
            "--dir",
            "/tmp/l",
            "--config-out",
            "/tmp/l/execute.json",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "noderig",
            "write-launcher",
            "--dir",
            "/tmp/l",
            "--config-out",
            "/tmp/l/execute.json",
            "--interpreter",
            "/opt/node/bin/node",
            "--test-config",
            "spec/support/jasmine.json",
        ])
        .unwrap();
        let Command::WriteLauncher { config, .. } = cli.command.into() else {
            panic!("expected write-launcher");
        };
        assert_eq!(config.unwrap().test_config, PathBuf::from("spec/support/jasmine.json"));
    }

    #[test]
    fn test_run_collects_selected_tests() {
        let cli = Cli::try_parse_from([
            "noderig",
            "run",
            "--config",
            "execute.json",
            "--test",
            "Calc adds",
            "--test",
            "Calc divides",
        ])
        .unwrap();

        assert_eq!(
            Command::from(cli.command),
            Command::Run {
                config: PathBuf::from("execute.json"),
                tests: vec!["Calc adds".to_string(), "Calc divides".to_string()],
            }
        );
    }
}
