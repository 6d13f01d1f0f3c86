//! Error taxonomy for a bootstrap run
//!
//! Only `BuildFailed` ends a run with a failing status. Missing tools and
//! failed installs are recorded in the report and the run falls through to
//! the next step.

use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BootstrapError {
    #[snafu(display("{tool} is not resolvable on PATH"))]
    ToolNotFound { tool: String },

    #[snafu(display("failed to install {tool}: {reason}"))]
    InstallFailed { tool: String, reason: String },

    #[snafu(display("build command `{command}` failed: {reason}"))]
    BuildFailed {
        command: String,
        code: Option<i32>,
        reason: String,
    },

    #[snafu(display("failed to read config {}", path.display()))]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to parse config {}", path.display()))]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[snafu(display("invalid config: {message}"))]
    InvalidConfig { message: String },

    #[snafu(display("failed to execute `{command}`"))]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to render report as {format}: {message}"))]
    RenderReport { format: String, message: String },

    #[snafu(display("failed to write report to {}", path.display()))]
    WriteReport {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl BootstrapError {
    /// Whether this error should turn the process exit status non-zero.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ToolNotFound { .. } | Self::InstallFailed { .. }
        )
    }
}

pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_build_and_setup_errors_are_fatal() {
        let missing = BootstrapError::ToolNotFound {
            tool: "m4".to_string(),
        };
        let install = BootstrapError::InstallFailed {
            tool: "gcc".to_string(),
            reason: "exit status 100".to_string(),
        };
        let build = BootstrapError::BuildFailed {
            command: "cargo build".to_string(),
            code: Some(101),
            reason: "exit status 101".to_string(),
        };

        assert!(!missing.is_fatal());
        assert!(!install.is_fatal());
        assert!(build.is_fatal());
        assert_eq!(build.to_string(), "build command `cargo build` failed: exit status 101");
    }
}
