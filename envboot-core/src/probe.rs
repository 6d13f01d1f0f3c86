//! Tool presence checks
//!
//! A tool counts as installed when its binary resolves to an executable file
//! on the search path. Presence is decided by PATH lookup alone; the version
//! query only feeds the report.

use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Host capability: where is a binary, and what version does it report
pub trait ToolProbe {
    fn locate(&self, binary: &str) -> Option<PathBuf>;

    /// First line of `<binary> <args>` output, if it ran successfully
    fn version(&self, path: &Path, args: &[String]) -> Option<String>;

    fn is_installed(&self, binary: &str) -> bool {
        self.locate(binary).is_some()
    }
}

/// Probe backed by the real filesystem and `$PATH`
#[derive(Debug, Clone)]
pub struct SystemProbe {
    search_path: Vec<PathBuf>,
}

impl SystemProbe {
    /// `extra` directories are searched first, then the process `$PATH`
    pub fn new(extra: Vec<PathBuf>) -> Self {
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        Self::with_path_var(extra, &path_var)
    }

    pub fn with_path_var(extra: Vec<PathBuf>, path_var: &OsString) -> Self {
        let mut search_path = extra;
        search_path.extend(std::env::split_paths(path_var));
        Self { search_path }
    }
}

impl ToolProbe for SystemProbe {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        // A name with a separator is taken as a path, like the shell does
        if binary.contains(std::path::MAIN_SEPARATOR) {
            let path = PathBuf::from(binary);
            return is_executable(&path).then_some(path);
        }

        self.search_path
            .iter()
            .map(|dir| dir.join(binary))
            .find(|candidate| is_executable(candidate))
    }

    fn version(&self, path: &Path, args: &[String]) -> Option<String> {
        let output = duct::cmd(path, args)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .ok()?;

        if !output.status.success() {
            tracing::debug!(binary = %path.display(), status = %output.status, "version query failed");
            return None;
        }

        // Some tools (gcc -v, older m4) print their banner on stderr
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        first_line(&stdout).or_else(|| first_line(&stderr))
    }
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(ToString::to_string)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"v?(\d+\.\d+\.\d+)").expect("version regex is valid"));

/// Extract semantic version from version output
/// Handles various formats:
///   "rustup 1.27.1 (54dd3d00f 2024-04-24)" -> "1.27.1"
///   "gcc (Debian 12.2.0-14) 12.2.0" -> "12.2.0"
///   "m4 (GNU M4) 1.4.19" -> "1.4.19"
pub fn extract_version(output: &str) -> Option<String> {
    VERSION_RE
        .captures(output)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

/// Split a requirement like ">=1.0.0" into operator and version
pub(crate) fn parse_requirement(requirement: &str) -> Option<(Op, semver::Version)> {
    let requirement = requirement.trim();

    let (op, rest) = if let Some(rest) = requirement.strip_prefix(">=") {
        (Op::Ge, rest)
    } else if let Some(rest) = requirement.strip_prefix("<=") {
        (Op::Le, rest)
    } else if let Some(rest) = requirement.strip_prefix('>') {
        (Op::Gt, rest)
    } else if let Some(rest) = requirement.strip_prefix('<') {
        (Op::Lt, rest)
    } else if let Some(rest) = requirement.strip_prefix('=') {
        (Op::Eq, rest)
    } else {
        (Op::Eq, requirement)
    };

    semver::Version::parse(rest.trim()).ok().map(|v| (op, v))
}

/// Check if a version banner meets a requirement.
/// `None` when either side cannot be parsed.
pub fn version_meets_requirement(banner: &str, requirement: &str) -> Option<bool> {
    let installed = semver::Version::parse(&extract_version(banner)?).ok()?;
    let (op, required) = parse_requirement(requirement)?;

    Some(match op {
        Op::Ge => installed >= required,
        Op::Le => installed <= required,
        Op::Gt => installed > required,
        Op::Lt => installed < required,
        Op::Eq => installed == required,
    })
}
