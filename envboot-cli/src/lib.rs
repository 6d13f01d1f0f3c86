//! Command line surface of envboot

pub mod commands;
pub mod logging;

use clap::{ArgAction, Parser};
use commands::bootstrap::BootstrapCommands;
use envboot_core::Privilege;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(
    name = "envboot",
    version = envboot_core::VERSION,
    about = "Install missing build prerequisites, then build the project"
)]
pub struct Cli {
    /// Project root; installs and the build run here
    #[clap(long, env = "ENVBOOT_PROJECT_DIR", default_value = ".", global = true)]
    pub project_dir: PathBuf,

    /// Config file (default: <project-dir>/bootstrap.toml, else built-in defaults)
    #[clap(long, env = "ENVBOOT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured privilege: auto, sudo or none
    #[clap(long, global = true)]
    pub privilege: Option<Privilege>,

    /// More log output (-v debug, -vv trace); ENVBOOT_LOG wins when set
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[clap(subcommand)]
    pub command: Option<BootstrapCommands>,
}

/// Dispatch a parsed command line; returns the process exit code
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    let command = cli.command.clone().unwrap_or_default();
    commands::bootstrap::handle_bootstrap_command(&cli, command)
}
