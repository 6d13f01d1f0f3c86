//! Run report: one entry per step, in execution order
//!
//! Rendered for the operator (human), or serialised as JSON / TOML for
//! tooling and for `--report` files.

use crate::config::ToolRole;
use crate::error::{BootstrapError, Result, WriteReportSnafu};
use serde::Serialize;
use snafu::ResultExt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// ensure every tool, then build
    Run,
    /// probe only
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Ensure,
    Build,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Resolvable on PATH; the version banner was reported
    Present {
        path: PathBuf,
        version: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        requirement: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        meets_requirement: Option<bool>,
    },
    /// Probe-only run found nothing
    Missing,
    /// Install commands succeeded. `verified` is set only when re-probing
    /// after install is enabled.
    Installed {
        #[serde(skip_serializing_if = "Option::is_none")]
        verified: Option<bool>,
    },
    InstallFailed { reason: String },
    InstallSkipped,
    InstallPlanned { commands: Vec<String> },
    Built,
    BuildFailed {
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
        reason: String,
    },
    BuildPlanned { command: String },
}

impl StepOutcome {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// An install command was actually executed for this step
    pub fn is_install_attempt(&self) -> bool {
        matches!(self, Self::Installed { .. } | Self::InstallFailed { .. })
    }

    pub fn is_build_invocation(&self) -> bool {
        matches!(
            self,
            Self::Built | Self::BuildFailed { .. } | Self::BuildPlanned { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: StepKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<ToolRole>,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Summary {
    pub version_reports: usize,
    pub install_attempts: usize,
    pub install_failures: usize,
    pub missing: usize,
    pub build_invocations: usize,
    pub exit_code: i32,
}

/// Bootstrap report encompassing all steps
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub mode: RunMode,
    pub project_dir: PathBuf,
    pub summary: Summary,
    pub steps: Vec<StepReport>,
}

impl BootstrapReport {
    pub fn new(mode: RunMode, project_dir: PathBuf, steps: Vec<StepReport>) -> Self {
        let summary = summarize(mode, &steps);
        Self {
            timestamp: chrono::Utc::now(),
            mode,
            project_dir,
            summary,
            steps,
        }
    }

    pub fn version_reports(&self) -> usize {
        self.summary.version_reports
    }

    pub fn install_attempts(&self) -> usize {
        self.summary.install_attempts
    }

    pub fn build_invocations(&self) -> usize {
        self.summary.build_invocations
    }

    /// 0 unless the build failed (run) or a tool is missing (check)
    pub fn exit_code(&self) -> i32 {
        self.summary.exit_code
    }

    /// Tools that were not on PATH when probed
    pub fn missing_tools(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.step == StepKind::Ensure && !s.outcome.is_present())
            .filter_map(|s| s.tool.as_deref())
            .collect()
    }
}

fn summarize(mode: RunMode, steps: &[StepReport]) -> Summary {
    let count = |pred: fn(&StepOutcome) -> bool| steps.iter().filter(|s| pred(&s.outcome)).count();

    let build_exit = steps.iter().find_map(|s| match &s.outcome {
        // Keep the build's own status when it has a usable one
        StepOutcome::BuildFailed { code, .. } => Some(code.filter(|c| *c != 0).unwrap_or(1)),
        _ => None,
    });
    let missing = steps
        .iter()
        .filter(|s| s.step == StepKind::Ensure && !s.outcome.is_present())
        .count();

    let exit_code = match mode {
        RunMode::Run => build_exit.unwrap_or(0),
        RunMode::Check => i32::from(missing > 0),
    };

    Summary {
        version_reports: count(StepOutcome::is_present),
        install_attempts: count(StepOutcome::is_install_attempt),
        install_failures: count(|o| matches!(o, StepOutcome::InstallFailed { .. })),
        missing,
        build_invocations: count(StepOutcome::is_build_invocation),
        exit_code,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Human,
    Json,
    Toml,
}

impl ReportFormat {
    fn name(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }

    /// `.json` files get JSON, everything else TOML
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(format!("unknown report format '{other}' (expected human, json or toml)")),
        }
    }
}

pub fn render(report: &BootstrapReport, format: ReportFormat) -> Result<String> {
    let failed = |message: String| BootstrapError::RenderReport {
        format: format.name().to_string(),
        message,
    };
    match format {
        ReportFormat::Human => Ok(render_human(report)),
        ReportFormat::Json => serde_json::to_string_pretty(report).map_err(|e| failed(e.to_string())),
        ReportFormat::Toml => toml::to_string_pretty(report).map_err(|e| failed(e.to_string())),
    }
}

/// Write the report as JSON or TOML depending on the file extension
pub fn write_report(report: &BootstrapReport, path: &Path) -> Result<()> {
    let content = render(report, ReportFormat::for_path(path))?;

    // Create parent directory if needed
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(WriteReportSnafu { path })?;
    }
    fs::write(path, content).context(WriteReportSnafu { path })?;
    Ok(())
}

fn step_label(step: &StepReport) -> String {
    match (&step.tool, step.role) {
        (Some(tool), Some(role)) => format!("{tool} [{role}]"),
        (Some(tool), None) => tool.clone(),
        _ => "build".to_string(),
    }
}

/// Operator-facing rendering
pub fn render_human(report: &BootstrapReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail
    let _ = render_human_into(&mut out, report);
    out
}

fn render_human_into(out: &mut String, report: &BootstrapReport) -> std::fmt::Result {
    writeln!(out, "🥾 envboot report")?;
    writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
    writeln!(out, "Generated: {}", report.timestamp.to_rfc3339())?;
    writeln!(out, "Project:   {}", report.project_dir.display())?;
    writeln!(out)?;

    writeln!(out, "📦 Prerequisites:")?;
    for step in report.steps.iter().filter(|s| s.step == StepKind::Ensure) {
        let label = step_label(step);
        match &step.outcome {
            StepOutcome::Present {
                version,
                requirement,
                meets_requirement,
                ..
            } => {
                if *meets_requirement == Some(false) {
                    let requirement = requirement.as_deref().unwrap_or("?");
                    writeln!(out, "  ⚠️  {label} {version} (requires {requirement})")?;
                } else {
                    writeln!(out, "  ✅ {label} {version}")?;
                }
            }
            StepOutcome::Missing => writeln!(out, "  ❌ {label} not installed")?,
            StepOutcome::Installed { verified } => match verified {
                Some(false) => writeln!(out, "  ⚠️  {label} installed, but still not on PATH")?,
                _ => writeln!(out, "  🔧 {label} installed")?,
            },
            StepOutcome::InstallFailed { reason } => {
                writeln!(out, "  ❌ {label} install failed: {reason}")?;
            }
            StepOutcome::InstallSkipped => {
                writeln!(out, "  ⏭️  {label} not installed (install skipped)")?;
            }
            StepOutcome::InstallPlanned { commands } => {
                writeln!(out, "  📝 {label} would install:")?;
                for command in commands {
                    writeln!(out, "       {command}")?;
                }
            }
            _ => {}
        }
    }

    if let Some(build) = report.steps.iter().find(|s| s.step == StepKind::Build) {
        writeln!(out)?;
        writeln!(out, "🔨 Build:")?;
        match &build.outcome {
            StepOutcome::Built => writeln!(out, "  ✅ succeeded")?,
            StepOutcome::BuildFailed {
                command, reason, ..
            } => writeln!(out, "  ❌ `{command}` failed: {reason}")?,
            StepOutcome::BuildPlanned { command } => writeln!(out, "  📝 would run: {command}")?,
            _ => {}
        }
    }

    let s = &report.summary;
    writeln!(out)?;
    writeln!(
        out,
        "Summary: {} version reports, {} install attempts ({} failed), {} build invocations",
        s.version_reports, s.install_attempts, s.install_failures, s.build_invocations
    )?;

    match report.mode {
        RunMode::Run if s.exit_code == 0 => writeln!(out, "✅ Bootstrap complete!")?,
        RunMode::Run => writeln!(out, "❌ Build failed (exit code {})", s.exit_code)?,
        RunMode::Check if s.missing == 0 => writeln!(out, "✅ All prerequisites present!")?,
        RunMode::Check => writeln!(out, "⚠️  {} prerequisites are missing", s.missing)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure(index: usize, tool: &str, role: ToolRole, outcome: StepOutcome) -> StepReport {
        StepReport {
            index,
            step: StepKind::Ensure,
            tool: Some(tool.to_string()),
            role: Some(role),
            outcome,
        }
    }

    fn build(index: usize, outcome: StepOutcome) -> StepReport {
        StepReport {
            index,
            step: StepKind::Build,
            tool: None,
            role: None,
            outcome,
        }
    }

    fn present(version: &str) -> StepOutcome {
        StepOutcome::Present {
            path: PathBuf::from("/usr/bin/tool"),
            version: version.to_string(),
            requirement: None,
            meets_requirement: None,
        }
    }

    fn sample(build_outcome: StepOutcome) -> BootstrapReport {
        BootstrapReport::new(
            RunMode::Run,
            PathBuf::from("/src/pyrs"),
            vec![
                ensure(0, "rustup", ToolRole::ToolchainManager, present("rustup 1.27.1")),
                ensure(
                    1,
                    "build-essential",
                    ToolRole::PackageBuildDriver,
                    StepOutcome::Installed { verified: None },
                ),
                ensure(
                    2,
                    "gcc",
                    ToolRole::Compiler,
                    StepOutcome::InstallFailed {
                        reason: "exit status 100".to_string(),
                    },
                ),
                ensure(3, "m4", ToolRole::MacroPreprocessor, StepOutcome::Installed { verified: None }),
                build(4, build_outcome),
            ],
        )
    }

    #[test]
    fn test_summary_counts() {
        let report = sample(StepOutcome::Built);
        assert_eq!(report.version_reports(), 1);
        assert_eq!(report.install_attempts(), 3);
        assert_eq!(report.summary.install_failures, 1);
        assert_eq!(report.build_invocations(), 1);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.missing_tools(), vec!["build-essential", "gcc", "m4"]);
    }

    #[test]
    fn test_build_failure_sets_exit_code() {
        let report = sample(StepOutcome::BuildFailed {
            command: "cargo build".to_string(),
            code: Some(101),
            reason: "exit status 101".to_string(),
        });
        assert_eq!(report.exit_code(), 101);

        let killed = sample(StepOutcome::BuildFailed {
            command: "cargo build".to_string(),
            code: None,
            reason: "terminated by signal".to_string(),
        });
        assert_eq!(killed.exit_code(), 1);
    }

    #[test]
    fn test_check_mode_exit_code_tracks_missing() {
        let report = BootstrapReport::new(
            RunMode::Check,
            PathBuf::from("."),
            vec![
                ensure(0, "rustup", ToolRole::ToolchainManager, present("rustup 1.27.1")),
                ensure(1, "m4", ToolRole::MacroPreprocessor, StepOutcome::Missing),
            ],
        );
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.build_invocations(), 0);
        assert!(render_human(&report).contains("1 prerequisites are missing"));
    }

    #[test]
    fn test_json_shape() {
        let report = sample(StepOutcome::Built);
        let json: serde_json::Value =
            serde_json::from_str(&render(&report, ReportFormat::Json).unwrap()).unwrap();

        assert_eq!(json["mode"], "run");
        assert_eq!(json["summary"]["install_attempts"], 3);
        assert_eq!(json["steps"][0]["status"], "present");
        assert_eq!(json["steps"][0]["role"], "toolchain-manager");
        assert_eq!(json["steps"][2]["status"], "install_failed");
        assert_eq!(json["steps"][4]["step"], "build");
        assert!(json["steps"][4].get("tool").is_none());

        let stamp = json["timestamp"].as_str().unwrap();
        let parsed = chrono::DateTime::parse_from_rfc3339(stamp).unwrap();
        assert_eq!(parsed, report.timestamp);
    }

    #[test]
    fn test_toml_render_and_write() {
        let report = sample(StepOutcome::Built);
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("reports/bootstrap.toml");
        write_report(&report, &toml_path).unwrap();
        let content = fs::read_to_string(&toml_path).unwrap();
        let parsed: toml::Table = toml::from_str(&content).unwrap();
        assert_eq!(parsed["mode"].as_str(), Some("run"));

        let json_path = dir.path().join("bootstrap.json");
        write_report(&report, &json_path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(json["summary"]["build_invocations"], 1);
    }

    #[test]
    fn test_human_rendering() {
        let text = render_human(&sample(StepOutcome::Built));
        assert!(text.contains("✅ rustup [toolchain-manager] rustup 1.27.1"));
        assert!(text.contains("❌ gcc [compiler] install failed: exit status 100"));
        assert!(text.contains("Bootstrap complete"));
    }

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::for_path(Path::new("r.json")), ReportFormat::Json);
        assert_eq!(ReportFormat::for_path(Path::new("r.toon")), ReportFormat::Toml);
    }
}
