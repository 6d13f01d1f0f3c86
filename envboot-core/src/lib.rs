//! Core library for envboot
//!
//! Checks that the build prerequisites of a Rust project are on PATH,
//! installs the missing ones, then runs the build:
//! - Tool probing (PATH lookup, version banners)
//! - Auto-installation via the system package manager or a fetched script
//! - A single build invocation
//! - Run reports (human, JSON, TOML)

pub mod config;
pub mod driver;
pub mod error;
pub mod installer;
pub mod probe;
pub mod process;
pub mod report;
pub mod runner;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{BootstrapConfig, BuildSpec, InstallMethod, Privilege, ToolRole, ToolSpec};
pub use driver::{BuildDriver, BuildOutcome, SystemBuildDriver};
pub use error::{BootstrapError, Result};
pub use installer::{InstallOutcome, PackageManager, SystemPackageManager};
pub use probe::{SystemProbe, ToolProbe};
pub use report::{BootstrapReport, ReportFormat, RunMode, StepKind, StepOutcome, StepReport};
pub use runner::{Bootstrapper, RunOptions, Step};

/// Version of the envboot crates
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build a bootstrapper wired to the real host
pub fn system_bootstrapper(
    config: &BootstrapConfig,
    project_dir: std::path::PathBuf,
    dry_run: bool,
) -> Bootstrapper<SystemProbe, SystemPackageManager, SystemBuildDriver> {
    let extra_path = config.extra_path();
    let path_var = process::search_path_var(&extra_path);
    let sudo = config.bootstrap.privilege.use_sudo();

    let probe = SystemProbe::new(extra_path);
    let packages = SystemPackageManager::new(
        config.bootstrap.package_manager.clone(),
        sudo,
        project_dir.clone(),
    )
    .with_path_var(path_var.clone())
    .dry_run(dry_run);
    let driver = SystemBuildDriver::new(project_dir.clone())
        .with_path_var(path_var)
        .dry_run(dry_run);

    Bootstrapper::new(config, project_dir, probe, packages, driver)
}
