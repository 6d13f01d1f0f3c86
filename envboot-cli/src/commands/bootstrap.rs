//! Bootstrap commands
//!
//! - `run`: ensure prerequisites, then build (the default)
//! - `check`: probe prerequisites only
//! - `init-config`: write the default bootstrap.toml

use crate::Cli;
use anyhow::{Context, Result};
use clap::Subcommand;
use envboot_core::config::{CONFIG_FILE_NAME, DEFAULT_CONFIG_TOML};
use envboot_core::report::{render, write_report};
use envboot_core::{BootstrapConfig, BootstrapReport, ReportFormat, RunOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Subcommand, Clone, PartialEq, Eq)]
pub enum BootstrapCommands {
    /// Ensure every prerequisite, then run the build once
    Run {
        /// Report missing tools without installing them
        #[clap(long)]
        skip_install: bool,

        /// Print the install and build commands instead of running them
        #[clap(long)]
        dry_run: bool,

        /// Also write the report to this file (.json: JSON, otherwise TOML)
        #[clap(short, long)]
        report: Option<PathBuf>,

        /// Report format on stdout: human, json or toml
        #[clap(long, default_value = "human")]
        format: ReportFormat,
    },

    /// Check prerequisites only; exits 1 when any is missing
    Check {
        /// Report format on stdout: human, json or toml
        #[clap(long, default_value = "human")]
        format: ReportFormat,
    },

    /// Write the default bootstrap.toml
    InitConfig {
        /// Overwrite an existing file
        #[clap(long)]
        force: bool,
    },
}

impl Default for BootstrapCommands {
    fn default() -> Self {
        Self::Run {
            skip_install: false,
            dry_run: false,
            report: None,
            format: ReportFormat::Human,
        }
    }
}

/// Handle bootstrap commands, returning the process exit code
pub fn handle_bootstrap_command(cli: &Cli, cmd: BootstrapCommands) -> Result<i32> {
    match cmd {
        BootstrapCommands::Run {
            skip_install,
            dry_run,
            report,
            format,
        } => run_bootstrap(cli, skip_install, dry_run, report.as_deref(), format),
        BootstrapCommands::Check { format } => check_only(cli, format),
        BootstrapCommands::InitConfig { force } => init_config(cli, force),
    }
}

fn project_dir(cli: &Cli) -> Result<PathBuf> {
    std::fs::canonicalize(&cli.project_dir)
        .with_context(|| format!("Project directory not found: {}", cli.project_dir.display()))
}

fn load_config(cli: &Cli, project_dir: &Path) -> Result<BootstrapConfig> {
    let (mut config, used) = BootstrapConfig::discover(project_dir, cli.config.as_deref())
        .context("Failed to load bootstrap config")?;

    match used {
        Some(path) => tracing::debug!("config: {}", path.display()),
        None => tracing::debug!("config: built-in defaults"),
    }

    if let Some(privilege) = cli.privilege {
        config.bootstrap.privilege = privilege;
    }
    Ok(config)
}

fn run_bootstrap(
    cli: &Cli,
    skip_install: bool,
    dry_run: bool,
    report_path: Option<&Path>,
    format: ReportFormat,
) -> Result<i32> {
    let project_dir = project_dir(cli)?;
    let config = load_config(cli, &project_dir)?;

    tracing::info!("🥾 envboot {} in {}", envboot_core::VERSION, project_dir.display());
    if dry_run {
        tracing::info!("dry run: nothing will be installed or built");
    }

    let options = RunOptions {
        skip_install,
        verify_after_install: config.bootstrap.verify_after_install,
    };
    let report = envboot_core::system_bootstrapper(&config, project_dir, dry_run)
        .with_options(options)
        .run();

    emit(&mut std::io::stdout().lock(), &report, format)?;

    if let Some(path) = report_path {
        write_report(&report, path).context("Failed to write bootstrap report")?;
        tracing::info!("📄 Report written to: {}", path.display());
    }

    Ok(report.exit_code())
}

fn check_only(cli: &Cli, format: ReportFormat) -> Result<i32> {
    let project_dir = project_dir(cli)?;
    let config = load_config(cli, &project_dir)?;

    tracing::info!("📋 Checking prerequisites...");
    let report = envboot_core::system_bootstrapper(&config, project_dir, true).check();

    emit(&mut std::io::stdout().lock(), &report, format)?;

    Ok(report.exit_code())
}

/// Write the rendered report; a closed stdout is an error, not a panic
fn emit(out: &mut impl Write, report: &BootstrapReport, format: ReportFormat) -> Result<()> {
    let rendered = render(report, format).context("Failed to render report")?;
    write!(out, "{rendered}").context("Failed to write report to stdout")?;
    if format != ReportFormat::Human {
        writeln!(out).context("Failed to write report to stdout")?;
    }
    out.flush().context("Failed to write report to stdout")
}

fn init_config(cli: &Cli, force: bool) -> Result<i32> {
    let target = match &cli.config {
        Some(path) => path.clone(),
        None => project_dir(cli)?.join(CONFIG_FILE_NAME),
    };

    if target.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    std::fs::write(&target, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    println!("✨ Wrote {}", target.display());
    Ok(0)
}
