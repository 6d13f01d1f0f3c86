//! The bootstrapper: ensure each prerequisite, then build
//!
//! Steps run strictly in order with no retries. A missing tool gets exactly
//! one install attempt; whatever happens, the run moves on to the next step,
//! and the build step always runs once at the end.

use crate::config::{BootstrapConfig, BuildSpec, ToolSpec};
use crate::driver::{BuildDriver, BuildOutcome};
use crate::error::BootstrapError;
use crate::installer::{InstallOutcome, PackageManager};
use crate::probe::{ToolProbe, version_meets_requirement};
use crate::report::{BootstrapReport, RunMode, StepKind, StepOutcome, StepReport};
use std::path::PathBuf;

/// Printed when a present tool's version query fails
pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Record missing tools without installing them
    pub skip_install: bool,
    /// Re-probe a tool after a successful install
    pub verify_after_install: bool,
}

/// One entry of the fixed step sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ensure(ToolSpec),
    Build(BuildSpec),
}

pub struct Bootstrapper<P, M, B> {
    probe: P,
    packages: M,
    driver: B,
    tools: Vec<ToolSpec>,
    build: BuildSpec,
    project_dir: PathBuf,
    options: RunOptions,
}

impl<P, M, B> Bootstrapper<P, M, B>
where
    P: ToolProbe,
    M: PackageManager,
    B: BuildDriver,
{
    pub fn new(config: &BootstrapConfig, project_dir: PathBuf, probe: P, packages: M, driver: B) -> Self {
        Self {
            probe,
            packages,
            driver,
            tools: config.bootstrap.tools.clone(),
            build: config.bootstrap.build.clone(),
            project_dir,
            options: RunOptions {
                skip_install: false,
                verify_after_install: config.bootstrap.verify_after_install,
            },
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// The ensure steps in configured order, then the build
    pub fn steps(&self) -> Vec<Step> {
        self.tools
            .iter()
            .cloned()
            .map(Step::Ensure)
            .chain(std::iter::once(Step::Build(self.build.clone())))
            .collect()
    }

    /// Ensure every tool, then build. Never stops early.
    pub fn run(&mut self) -> BootstrapReport {
        let reports = self
            .steps()
            .into_iter()
            .enumerate()
            .map(|(index, step)| match step {
                Step::Ensure(tool) => StepReport {
                    index,
                    step: StepKind::Ensure,
                    outcome: self.ensure(&tool),
                    tool: Some(tool.name),
                    role: Some(tool.role),
                },
                Step::Build(build) => StepReport {
                    index,
                    step: StepKind::Build,
                    tool: None,
                    role: None,
                    outcome: self.run_build(&build),
                },
            })
            .collect();

        BootstrapReport::new(RunMode::Run, self.project_dir.clone(), reports)
    }

    /// Probe every tool without installing or building
    pub fn check(&self) -> BootstrapReport {
        let steps = self
            .tools
            .iter()
            .enumerate()
            .map(|(index, tool)| StepReport {
                index,
                step: StepKind::Ensure,
                tool: Some(tool.name.clone()),
                role: Some(tool.role),
                outcome: self.present(tool).unwrap_or(StepOutcome::Missing),
            })
            .collect();

        BootstrapReport::new(RunMode::Check, self.project_dir.clone(), steps)
    }

    /// `Present` when the tool's binary resolves, with its version banner
    fn present(&self, tool: &ToolSpec) -> Option<StepOutcome> {
        let path = self.probe.locate(&tool.binary)?;
        let version = self
            .probe
            .version(&path, &tool.version_args)
            .unwrap_or_else(|| UNKNOWN_VERSION.to_string());

        let meets_requirement = tool.version.as_deref().and_then(|requirement| {
            let meets = version_meets_requirement(&version, requirement);
            match meets {
                Some(false) => tracing::warn!(
                    "{} {version} does not satisfy {requirement}; not reinstalling",
                    tool.name
                ),
                None => tracing::debug!("{}: cannot compare '{version}' with {requirement}", tool.name),
                Some(true) => {}
            }
            meets
        });

        tracing::info!("✅ {} [{}]: {version}", tool.name, tool.role);
        Some(StepOutcome::Present {
            path,
            version,
            requirement: tool.version.clone(),
            meets_requirement,
        })
    }

    fn ensure(&mut self, tool: &ToolSpec) -> StepOutcome {
        if let Some(present) = self.present(tool) {
            return present;
        }

        let not_found = BootstrapError::ToolNotFound {
            tool: tool.binary.clone(),
        };
        tracing::warn!("❌ {}: {not_found}", tool.name);

        if self.options.skip_install {
            return StepOutcome::InstallSkipped;
        }

        match self.packages.install(tool) {
            Ok(InstallOutcome::Installed) => {
                let verified = self.options.verify_after_install.then(|| {
                    let found = self.probe.is_installed(&tool.binary);
                    if !found {
                        tracing::warn!("{} installed but {} is still not on PATH", tool.name, tool.binary);
                    }
                    found
                });
                tracing::info!("🔧 {} installed", tool.name);
                StepOutcome::Installed { verified }
            }
            Ok(InstallOutcome::Planned(commands)) => StepOutcome::InstallPlanned { commands },
            Err(e) => {
                // Non-fatal: the next step runs regardless
                tracing::error!("{e}");
                StepOutcome::InstallFailed {
                    reason: install_reason(e),
                }
            }
        }
    }

    fn run_build(&mut self, build: &BuildSpec) -> StepOutcome {
        match self.driver.build(build) {
            Ok(BuildOutcome::Succeeded) => StepOutcome::Built,
            Ok(BuildOutcome::Planned(command)) => StepOutcome::BuildPlanned { command },
            Err(BootstrapError::BuildFailed {
                command,
                code,
                reason,
            }) => {
                tracing::error!("build `{command}` failed: {reason}");
                StepOutcome::BuildFailed {
                    command,
                    code,
                    reason,
                }
            }
            Err(other) => {
                tracing::error!("build failed: {other}");
                StepOutcome::BuildFailed {
                    command: build.command_line(),
                    code: None,
                    reason: other.to_string(),
                }
            }
        }
    }
}

fn install_reason(e: BootstrapError) -> String {
    match e {
        BootstrapError::InstallFailed { reason, .. } => reason,
        other => other.to_string(),
    }
}
