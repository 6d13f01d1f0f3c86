//! Auto-installer for missing prerequisites
//!
//! Package installs go through the system package manager (apt-get by
//! default, under sudo unless configured otherwise). The toolchain manager is
//! fetched over HTTPS and piped into a shell instead.

use crate::config::{InstallMethod, PackageManagerSpec, ToolSpec};
use crate::error::{BootstrapError, Result};
use crate::process::{self, CommandLine, Invocation};
use std::ffi::OsString;
use std::path::PathBuf;

/// What an install call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Commands ran and exited successfully
    Installed,
    /// Dry run: these commands would have run
    Planned(Vec<String>),
}

/// Host capability: install one tool
pub trait PackageManager {
    /// Exactly one install action for `tool`. Failure is reported as
    /// `BootstrapError::InstallFailed` and never retried.
    fn install(&mut self, tool: &ToolSpec) -> Result<InstallOutcome>;
}

/// Installs through the real package manager and fetcher
#[derive(Debug)]
pub struct SystemPackageManager {
    spec: PackageManagerSpec,
    sudo: bool,
    project_dir: PathBuf,
    path_var: Option<OsString>,
    dry_run: bool,
    refreshed: bool,
}

impl SystemPackageManager {
    pub fn new(spec: PackageManagerSpec, sudo: bool, project_dir: PathBuf) -> Self {
        Self {
            spec,
            sudo,
            project_dir,
            path_var: None,
            dry_run: false,
            refreshed: false,
        }
    }

    /// `PATH` handed to every spawned command
    #[must_use]
    pub fn with_path_var(mut self, path_var: Option<OsString>) -> Self {
        self.path_var = path_var;
        self
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn refresh_command(&self) -> Option<Invocation> {
        if !self.spec.refresh || self.refreshed || self.spec.update_args.is_empty() {
            return None;
        }
        Some(Invocation::Single(
            CommandLine::new(&self.spec.program, &self.spec.update_args).elevated(self.sudo),
        ))
    }

    fn install_command(&self, tool: &ToolSpec) -> Invocation {
        match &tool.install {
            InstallMethod::Package { packages } => {
                let args = self.spec.install_args.iter().chain(packages);
                Invocation::Single(CommandLine::new(&self.spec.program, args).elevated(self.sudo))
            }
            InstallMethod::Script {
                url,
                tls,
                shell,
                args,
            } => {
                // HTTPS only, with a floor on the TLS version
                let fetch = CommandLine::new(
                    &self.spec.fetcher,
                    [
                        "--proto".to_string(),
                        "=https".to_string(),
                        format!("--tlsv{tls}"),
                        "-sSf".to_string(),
                        url.clone(),
                    ],
                );
                let run = CommandLine::new(
                    shell,
                    ["-s".to_string(), "--".to_string()]
                        .into_iter()
                        .chain(args.iter().cloned()),
                );
                Invocation::Pipe(fetch, run)
            }
        }
    }

    /// Commands an install of `tool` would run right now, in order
    pub fn plan(&self, tool: &ToolSpec) -> Vec<Invocation> {
        let refresh = match tool.install {
            InstallMethod::Package { .. } => self.refresh_command(),
            InstallMethod::Script { .. } => None,
        };
        refresh
            .into_iter()
            .chain(std::iter::once(self.install_command(tool)))
            .collect()
    }

    fn run(&self, invocation: &Invocation) -> Result<std::process::ExitStatus> {
        invocation.run(&self.project_dir, self.path_var.as_ref())
    }
}

impl PackageManager for SystemPackageManager {
    fn install(&mut self, tool: &ToolSpec) -> Result<InstallOutcome> {
        let plan = self.plan(tool);
        let refreshing = plan.len() > 1;

        if self.dry_run {
            for invocation in &plan {
                tracing::info!("would run: {invocation}");
            }
            self.refreshed |= refreshing;
            return Ok(InstallOutcome::Planned(
                plan.iter().map(ToString::to_string).collect(),
            ));
        }

        let failed = |reason: String| BootstrapError::InstallFailed {
            tool: tool.name.clone(),
            reason,
        };

        let mut steps = plan.iter();
        if refreshing {
            if let Some(refresh) = steps.next() {
                self.refreshed = true;
                match self.run(refresh) {
                    Ok(status) if status.success() => {}
                    // A stale index may still have the package; carry on
                    Ok(status) => tracing::warn!(
                        "package index refresh failed ({}), installing anyway",
                        process::describe_status(status)
                    ),
                    Err(e) => tracing::warn!("package index refresh failed: {e}"),
                }
            }
        }

        for invocation in steps {
            tracing::info!("🔧 Installing {} via `{invocation}`", tool.name);
            let status = self.run(invocation).map_err(|e| failed(e.to_string()))?;
            if !status.success() {
                return Err(failed(process::describe_status(status)));
            }
        }

        Ok(InstallOutcome::Installed)
    }
}
