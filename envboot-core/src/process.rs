//! Spawning external commands
//!
//! Every command the bootstrapper runs goes through [`Invocation`] so that a
//! dry run can print exactly what a real run would execute. Child stdout is
//! sent to stderr; stdout belongs to the report.

use crate::error::{Result, SpawnSnafu};
use duct::Expression;
use snafu::ResultExt;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Prefix with `sudo` when `elevate` is set
    #[must_use]
    pub fn elevated(self, elevate: bool) -> Self {
        if !elevate {
            return self;
        }
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
        }
    }

    fn expression(&self) -> Expression {
        duct::cmd(&self.program, &self.args)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A single command, or one command piped into another
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Single(CommandLine),
    Pipe(CommandLine, CommandLine),
}

impl Invocation {
    fn expression(&self) -> Expression {
        match self {
            Self::Single(cmd) => cmd.expression(),
            Self::Pipe(left, right) => left.expression().pipe(right.expression()),
        }
    }

    /// Run to completion in `dir`. A non-zero exit is returned, not raised;
    /// only a failure to spawn is an error. For a pipe, a failing left side
    /// wins over a successful right side.
    pub fn run(&self, dir: &Path, path_var: Option<&OsString>) -> Result<ExitStatus> {
        let mut expr = self.expression().dir(dir).stdout_to_stderr().unchecked();
        if let Some(path_var) = path_var {
            expr = expr.env("PATH", path_var);
        }

        tracing::debug!(command = %self, dir = %dir.display(), "running");
        let output = expr.run().context(SpawnSnafu {
            command: self.to_string(),
        })?;
        Ok(output.status)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(cmd) => write!(f, "{cmd}"),
            Self::Pipe(left, right) => write!(f, "{left} | {right}"),
        }
    }
}

/// `PATH` for child processes: `extra` first, then the current `$PATH`.
/// `None` when there is nothing to prepend.
pub fn search_path_var(extra: &[PathBuf]) -> Option<OsString> {
    if extra.is_empty() {
        return None;
    }
    let current = std::env::var_os("PATH").unwrap_or_default();
    let dirs = extra
        .iter()
        .cloned()
        .chain(std::env::split_paths(&current));
    match std::env::join_paths(dirs) {
        Ok(joined) => Some(joined),
        Err(e) => {
            tracing::warn!("ignoring extra_path, cannot join into PATH: {e}");
            None
        }
    }
}

/// Describe how a command ended, for reports
pub fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevated_prefixes_sudo() {
        let cmd = CommandLine::new("apt-get", ["install", "-y", "m4"]).elevated(true);
        assert_eq!(cmd.program, "sudo");
        assert_eq!(cmd.to_string(), "sudo apt-get install -y m4");

        let cmd = CommandLine::new("apt-get", ["update"]).elevated(false);
        assert_eq!(cmd.to_string(), "apt-get update");
    }

    #[test]
    fn test_pipe_display() {
        let pipe = Invocation::Pipe(
            CommandLine::new("curl", ["-sSf", "https://sh.rustup.rs"]),
            CommandLine::new("sh", ["-s", "--", "-y"]),
        );
        assert_eq!(pipe.to_string(), "curl -sSf https://sh.rustup.rs | sh -s -- -y");
    }

    #[test]
    fn test_search_path_var_prepends_extra() {
        assert!(search_path_var(&[]).is_none());

        let joined = search_path_var(&[PathBuf::from("/opt/envboot/bin")]).unwrap();
        let first = std::env::split_paths(&joined).next().unwrap();
        assert_eq!(first, PathBuf::from("/opt/envboot/bin"));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_reports_exit_status_without_failing() {
        let dir = tempfile::tempdir().unwrap();

        let ok = Invocation::Single(CommandLine::new("true", Vec::<String>::new()));
        assert!(ok.run(dir.path(), None).unwrap().success());

        let failing = Invocation::Single(CommandLine::new("sh", ["-c", "exit 3"]));
        let status = failing.run(dir.path(), None).unwrap();
        assert_eq!(describe_status(status), "exit status 3");

        // Left side of the pipe fails, right side succeeds
        let pipe = Invocation::Pipe(
            CommandLine::new("sh", ["-c", "exit 7"]),
            CommandLine::new("cat", Vec::<String>::new()),
        );
        assert!(!pipe.run(dir.path(), None).unwrap().success());
    }

    #[test]
    fn test_run_missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = Invocation::Single(CommandLine::new(
            "envboot-definitely-not-a-real-binary",
            Vec::<String>::new(),
        ));
        let err = missing.run(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("failed to execute"));
    }
}
