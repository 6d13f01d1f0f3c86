//! The final build step

use crate::config::BuildSpec;
use crate::error::{BootstrapError, Result};
use crate::process::{self, CommandLine, Invocation};
use std::ffi::OsString;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Succeeded,
    /// Dry run: the command that would have run
    Planned(String),
}

/// Host capability: run the project's build command
pub trait BuildDriver {
    /// Non-zero exit or failure to start is `BootstrapError::BuildFailed`
    fn build(&mut self, spec: &BuildSpec) -> Result<BuildOutcome>;
}

#[derive(Debug)]
pub struct SystemBuildDriver {
    project_dir: PathBuf,
    path_var: Option<OsString>,
    dry_run: bool,
}

impl SystemBuildDriver {
    pub fn new(project_dir: PathBuf) -> Self {
        Self {
            project_dir,
            path_var: None,
            dry_run: false,
        }
    }

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
}

impl BuildDriver for SystemBuildDriver {
    fn build(&mut self, spec: &BuildSpec) -> Result<BuildOutcome> {
        let invocation = Invocation::Single(CommandLine::new(&spec.program, &spec.args));

        if self.dry_run {
            tracing::info!("would run: {invocation}");
            return Ok(BuildOutcome::Planned(invocation.to_string()));
        }

        tracing::info!("🔨 Building with `{invocation}`");
        let status = invocation
            .run(&self.project_dir, self.path_var.as_ref())
            .map_err(|e| BootstrapError::BuildFailed {
                command: invocation.to_string(),
                code: None,
                reason: e.to_string(),
            })?;

        if status.success() {
            Ok(BuildOutcome::Succeeded)
        } else {
            Err(BootstrapError::BuildFailed {
                command: invocation.to_string(),
                code: status.code(),
                reason: process::describe_status(status),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn spec(program: &str, args: &[&str]) -> BuildSpec {
        BuildSpec {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    #[test]
    fn test_build_runs_in_project_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = SystemBuildDriver::new(dir.path().to_path_buf());

        let outcome = driver
            .build(&spec("sh", &["-c", "touch built.marker"]))
            .unwrap();
        assert_eq!(outcome, BuildOutcome::Succeeded);
        assert!(dir.path().join("built.marker").exists());
    }

    #[test]
    fn test_build_failure_keeps_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = SystemBuildDriver::new(dir.path().to_path_buf());

        let err = driver.build(&spec("sh", &["-c", "exit 101"])).unwrap_err();
        match err {
            BootstrapError::BuildFailed { code, command, .. } => {
                assert_eq!(code, Some(101));
                assert_eq!(command, "sh -c exit 101");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_build_program_is_build_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = SystemBuildDriver::new(dir.path().to_path_buf());

        let err = driver
            .build(&spec("envboot-no-such-build-tool", &[]))
            .unwrap_err();
        assert!(matches!(err, BootstrapError::BuildFailed { code: None, .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_dry_run_does_not_execute() {
        let dir = tempfile::tempdir().unwrap();
        let mut driver = SystemBuildDriver::new(dir.path().to_path_buf()).dry_run(true);

        let outcome = driver
            .build(&spec("sh", &["-c", "touch built.marker"]))
            .unwrap();
        assert_eq!(
            outcome,
            BuildOutcome::Planned("sh -c touch built.marker".to_string())
        );
        assert!(!dir.path().join("built.marker").exists());
    }
}
