//! Bootstrap configuration
//!
//! Reads `bootstrap.toml` from the project directory. Every section has a
//! default, so a missing file or a partial file still describes the full
//! four-tool bootstrap followed by `cargo build`.

use crate::error::{BootstrapError, ParseConfigSnafu, ReadConfigSnafu, Result};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// File name looked up in the project directory
pub const CONFIG_FILE_NAME: &str = "bootstrap.toml";

/// The shipped default, written by `envboot init-config`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../bootstrap.default.toml");

/// Bootstrap configuration structure matching bootstrap.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub bootstrap: BootstrapSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BootstrapSection {
    pub privilege: Privilege,
    pub verify_after_install: bool,
    pub extra_path: Vec<String>,
    pub package_manager: PackageManagerSpec,
    pub build: BuildSpec,
    pub tools: Vec<ToolSpec>,
}

impl Default for BootstrapSection {
    fn default() -> Self {
        Self {
            privilege: Privilege::Auto,
            verify_after_install: false,
            extra_path: vec!["~/.cargo/bin".to_string()],
            package_manager: PackageManagerSpec::default(),
            build: BuildSpec::default(),
            tools: default_tools(),
        }
    }
}

/// What a tool is for in the build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolRole {
    ToolchainManager,
    PackageBuildDriver,
    Compiler,
    MacroPreprocessor,
}

impl fmt::Display for ToolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ToolchainManager => "toolchain-manager",
            Self::PackageBuildDriver => "package-build-driver",
            Self::Compiler => "compiler",
            Self::MacroPreprocessor => "macro-preprocessor",
        };
        f.write_str(s)
    }
}

/// One prerequisite: the binary that proves it is present and how to get it
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub role: ToolRole,
    pub binary: String,
    #[serde(default = "default_version_args")]
    pub version_args: Vec<String>,
    /// Format: ">=1.0.0"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub install: InstallMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InstallMethod {
    /// Installed through the system package manager
    Package { packages: Vec<String> },
    /// Fetched over HTTPS and piped into a shell
    Script {
        url: String,
        #[serde(default = "default_tls")]
        tls: String,
        #[serde(default = "default_shell")]
        shell: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageManagerSpec {
    pub program: String,
    pub update_args: Vec<String>,
    pub install_args: Vec<String>,
    /// Run `update_args` once before the first package install
    pub refresh: bool,
    /// Downloader used by script installs
    pub fetcher: String,
}

impl Default for PackageManagerSpec {
    fn default() -> Self {
        Self {
            program: "apt-get".to_string(),
            update_args: vec!["update".to_string()],
            install_args: vec!["install".to_string(), "-y".to_string()],
            refresh: true,
            fetcher: "curl".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self {
            program: "cargo".to_string(),
            args: vec!["build".to_string()],
        }
    }
}

impl BuildSpec {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Whether package-manager commands run under sudo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// sudo unless the effective uid is already 0
    Auto,
    Sudo,
    None,
}

impl Privilege {
    /// Resolve `Auto` against the current process
    pub fn use_sudo(self) -> bool {
        match self {
            Self::Auto => !running_as_root(),
            Self::Sudo => true,
            Self::None => false,
        }
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "sudo" => Ok(Self::Sudo),
            "none" => Ok(Self::None),
            other => Err(format!("unknown privilege '{other}' (expected auto, sudo or none)")),
        }
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

fn default_version_args() -> Vec<String> {
    vec!["--version".to_string()]
}

fn default_tls() -> String {
    "1.2".to_string()
}

fn default_shell() -> String {
    "sh".to_string()
}

fn package_tool(name: &str, role: ToolRole, binary: &str, packages: &[&str]) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        role,
        binary: binary.to_string(),
        version_args: default_version_args(),
        version: None,
        install: InstallMethod::Package {
            packages: packages.iter().map(|p| (*p).to_string()).collect(),
        },
    }
}

/// rustup, build-essential, gcc with the GMP/MPFR headers, m4
pub fn default_tools() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "rustup".to_string(),
            role: ToolRole::ToolchainManager,
            binary: "rustup".to_string(),
            version_args: default_version_args(),
            version: None,
            install: InstallMethod::Script {
                url: "https://sh.rustup.rs".to_string(),
                tls: default_tls(),
                shell: default_shell(),
                args: vec!["-y".to_string()],
            },
        },
        package_tool(
            "build-essential",
            ToolRole::PackageBuildDriver,
            "make",
            &["build-essential"],
        ),
        package_tool(
            "gcc",
            ToolRole::Compiler,
            "gcc",
            &["gcc", "libgmp-dev", "libmpfr-dev"],
        ),
        package_tool("m4", ToolRole::MacroPreprocessor, "m4", &["m4"]),
    ]
}

impl BootstrapConfig {
    /// Load bootstrap config from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context(ReadConfigSnafu { path })?;
        let config = Self::parse(&content).context(ParseConfigSnafu { path })?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Pick the config for a run: an explicit path must exist, otherwise
    /// `<project_dir>/bootstrap.toml` is used when present and the built-in
    /// defaults when not. Returns the file that was read, if any.
    pub fn discover(project_dir: &Path, explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let candidate = project_dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "using project bootstrap config");
            return Ok((Self::load(&candidate)?, Some(candidate)));
        }

        tracing::debug!("no bootstrap.toml found, using built-in defaults");
        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<()> {
        let section = &self.bootstrap;
        let invalid = |message: String| Err(BootstrapError::InvalidConfig { message });

        if section.build.program.trim().is_empty() {
            return invalid("build.program must not be empty".to_string());
        }
        if section.package_manager.program.trim().is_empty() {
            return invalid("package_manager.program must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for tool in &section.tools {
            if !seen.insert(tool.name.as_str()) {
                return invalid(format!("tool '{}' is listed more than once", tool.name));
            }
            if tool.binary.trim().is_empty() {
                return invalid(format!("tool '{}' has an empty binary", tool.name));
            }
            if let Some(requirement) = &tool.version {
                if crate::probe::parse_requirement(requirement).is_none() {
                    return invalid(format!(
                        "tool '{}' has an unparseable version requirement '{requirement}'",
                        tool.name
                    ));
                }
            }
            match &tool.install {
                InstallMethod::Package { packages } if packages.is_empty() => {
                    return invalid(format!("tool '{}' lists no packages", tool.name));
                }
                InstallMethod::Script { url, tls, .. } => {
                    if !url.starts_with("https://") {
                        return invalid(format!(
                            "tool '{}' install url must use https: {url}",
                            tool.name
                        ));
                    }
                    if !matches!(tls.as_str(), "1" | "1.0" | "1.1" | "1.2" | "1.3") {
                        return invalid(format!("tool '{}' has unknown tls version {tls}", tool.name));
                    }
                }
                InstallMethod::Package { .. } => {}
            }
        }

        Ok(())
    }

    /// `extra_path` entries with `~` expanded, in search order
    pub fn extra_path(&self) -> Vec<PathBuf> {
        self.bootstrap
            .extra_path
            .iter()
            .map(|entry| PathBuf::from(shellexpand::tilde(entry).as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_template_matches_defaults() {
        let parsed = BootstrapConfig::parse(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed, BootstrapConfig::default());
        parsed.validate().unwrap();
    }

    #[test]
    fn test_empty_file_means_defaults() {
        let parsed = BootstrapConfig::parse("").unwrap();
        assert_eq!(parsed.bootstrap.tools.len(), 4);
        assert_eq!(parsed.bootstrap.build.command_line(), "cargo build");
    }

    #[test]
    fn test_default_tool_order_follows_roles() {
        let roles: Vec<ToolRole> = default_tools().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![
                ToolRole::ToolchainManager,
                ToolRole::PackageBuildDriver,
                ToolRole::Compiler,
                ToolRole::MacroPreprocessor,
            ]
        );
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let parsed = BootstrapConfig::parse(
            r#"
[bootstrap]
privilege = "none"

[bootstrap.build]
program = "make"
args = ["all"]
"#,
        )
        .unwrap();

        assert_eq!(parsed.bootstrap.privilege, Privilege::None);
        assert_eq!(parsed.bootstrap.build.command_line(), "make all");
        assert_eq!(parsed.bootstrap.package_manager.program, "apt-get");
        assert_eq!(parsed.bootstrap.tools.len(), 4);
    }

    #[test]
    fn test_script_install_defaults() {
        let parsed = BootstrapConfig::parse(
            r#"
[[bootstrap.tools]]
name = "rustup"
role = "toolchain-manager"
binary = "rustup"
install = { kind = "script", url = "https://sh.rustup.rs" }
"#,
        )
        .unwrap();

        let tool = &parsed.bootstrap.tools[0];
        assert_eq!(tool.version_args, vec!["--version".to_string()]);
        assert_eq!(
            tool.install,
            InstallMethod::Script {
                url: "https://sh.rustup.rs".to_string(),
                tls: "1.2".to_string(),
                shell: "sh".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_validate_rejects_plain_http_script() {
        let mut config = BootstrapConfig::default();
        config.bootstrap.tools[0].install = InstallMethod::Script {
            url: "http://sh.rustup.rs".to_string(),
            tls: "1.2".to_string(),
            shell: "sh".to_string(),
            args: vec![],
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must use https"));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty_packages() {
        let mut config = BootstrapConfig::default();
        config.bootstrap.tools.push(config.bootstrap.tools[3].clone());
        assert!(config.validate().unwrap_err().to_string().contains("more than once"));

        let mut config = BootstrapConfig::default();
        config.bootstrap.tools[3].install = InstallMethod::Package { packages: vec![] };
        assert!(config.validate().unwrap_err().to_string().contains("lists no packages"));
    }

    #[test]
    fn test_validate_rejects_bad_version_requirement() {
        let mut config = BootstrapConfig::default();
        config.bootstrap.tools[2].version = Some(">=eleven".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_privilege_from_str() {
        assert_eq!("SUDO".parse::<Privilege>().unwrap(), Privilege::Sudo);
        assert_eq!("none".parse::<Privilege>().unwrap(), Privilege::None);
        assert!("root".parse::<Privilege>().is_err());
        assert!(Privilege::Sudo.use_sudo());
        assert!(!Privilege::None.use_sudo());
    }

    #[test]
    fn test_extra_path_expands_tilde() {
        let config = BootstrapConfig::default();
        let paths = config.extra_path();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].to_string_lossy().ends_with(".cargo/bin"));
        assert!(!paths[0].to_string_lossy().starts_with('~'));
    }

    #[test]
    fn test_discover_prefers_project_file() {
        let dir = tempfile::tempdir().unwrap();
        let (config, used) = BootstrapConfig::discover(dir.path(), None).unwrap();
        assert!(used.is_none());
        assert_eq!(config, BootstrapConfig::default());

        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[bootstrap.build]\nprogram = \"true\"\nargs = []\n",
        )
        .unwrap();
        let (config, used) = BootstrapConfig::discover(dir.path(), None).unwrap();
        assert_eq!(used, Some(dir.path().join(CONFIG_FILE_NAME)));
        assert_eq!(config.bootstrap.build.program, "true");
    }

    #[test]
    fn test_discover_explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        let err = BootstrapConfig::discover(dir.path(), Some(&missing)).unwrap_err();
        assert!(matches!(err, BootstrapError::ReadConfig { .. }));
    }
}
