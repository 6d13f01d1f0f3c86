//! In-memory host for tests: no PATH, no package manager, no build tool
//!
//! Available to this crate's tests and, through the `test-support`
//! feature, to integration tests.

use crate::config::{BootstrapConfig, BuildSpec, ToolSpec};
use crate::driver::{BuildDriver, BuildOutcome};
use crate::error::{BootstrapError, Result};
use crate::installer::{InstallOutcome, PackageManager};
use crate::probe::ToolProbe;
use crate::runner::Bootstrapper;
use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

const FAKE_BIN: &str = "/fake/bin";

#[derive(Debug, Default)]
pub struct HostState {
    /// binary -> version banner (`None`: version query fails)
    pub binaries: BTreeMap<String, Option<String>>,
    /// Tool names that fail to install
    pub failing_installs: BTreeSet<String>,
    /// A successful install puts the tool's binary on PATH
    pub provisioning: bool,
    pub build_exit: i32,

    /// Every binary looked up, in order
    pub lookups: Vec<String>,
    pub version_queries: usize,
    /// Tool names, one entry per install call
    pub install_attempts: Vec<String>,
    pub builds: usize,
}

/// Cloneable handle; the probe, package manager and build driver it hands
/// out all share one `HostState`
#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tool(self, binary: &str, banner: &str) -> Self {
        self.state
            .borrow_mut()
            .binaries
            .insert(binary.to_string(), Some(banner.to_string()));
        self
    }

    /// On PATH, but `--version` fails
    #[must_use]
    pub fn with_silent_tool(self, binary: &str) -> Self {
        self.state.borrow_mut().binaries.insert(binary.to_string(), None);
        self
    }

    /// Every default tool present
    #[must_use]
    pub fn provisioned() -> Self {
        Self::new()
            .with_tool("rustup", "rustup 1.27.1 (54dd3d00f 2024-04-24)")
            .with_tool("make", "GNU Make 4.3")
            .with_tool("gcc", "gcc (Debian 12.2.0-14) 12.2.0")
            .with_tool("m4", "m4 (GNU M4) 1.4.19")
    }

    #[must_use]
    pub fn failing_install(self, tool: &str) -> Self {
        self.state.borrow_mut().failing_installs.insert(tool.to_string());
        self
    }

    #[must_use]
    pub fn provisioning(self) -> Self {
        self.state.borrow_mut().provisioning = true;
        self
    }

    #[must_use]
    pub fn build_exit(self, code: i32) -> Self {
        self.state.borrow_mut().build_exit = code;
        self
    }

    pub fn state(&self) -> Ref<'_, HostState> {
        self.state.borrow()
    }

    pub fn probe(&self) -> FakeProbe {
        FakeProbe { host: self.clone() }
    }

    pub fn package_manager(&self) -> FakePackageManager {
        FakePackageManager { host: self.clone() }
    }

    pub fn build_driver(&self) -> FakeBuildDriver {
        FakeBuildDriver { host: self.clone() }
    }

    pub fn bootstrapper(
        &self,
        config: &BootstrapConfig,
    ) -> Bootstrapper<FakeProbe, FakePackageManager, FakeBuildDriver> {
        Bootstrapper::new(
            config,
            PathBuf::from("/fake/project"),
            self.probe(),
            self.package_manager(),
            self.build_driver(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct FakeProbe {
    host: FakeHost,
}

impl ToolProbe for FakeProbe {
    fn locate(&self, binary: &str) -> Option<PathBuf> {
        let mut state = self.host.state.borrow_mut();
        state.lookups.push(binary.to_string());
        state
            .binaries
            .contains_key(binary)
            .then(|| Path::new(FAKE_BIN).join(binary))
    }

    fn version(&self, path: &Path, _args: &[String]) -> Option<String> {
        let mut state = self.host.state.borrow_mut();
        state.version_queries += 1;
        let binary = path.file_name()?.to_str()?;
        state.binaries.get(binary).cloned().flatten()
    }
}

#[derive(Debug, Clone)]
pub struct FakePackageManager {
    host: FakeHost,
}

impl PackageManager for FakePackageManager {
    fn install(&mut self, tool: &ToolSpec) -> Result<InstallOutcome> {
        let mut state = self.host.state.borrow_mut();
        state.install_attempts.push(tool.name.clone());

        if state.failing_installs.contains(&tool.name) {
            return Err(BootstrapError::InstallFailed {
                tool: tool.name.clone(),
                reason: "simulated failure".to_string(),
            });
        }
        if state.provisioning {
            let banner = format!("{} 1.0.0", tool.binary);
            state.binaries.insert(tool.binary.clone(), Some(banner));
        }
        Ok(InstallOutcome::Installed)
    }
}

#[derive(Debug, Clone)]
pub struct FakeBuildDriver {
    host: FakeHost,
}

impl BuildDriver for FakeBuildDriver {
    fn build(&mut self, spec: &BuildSpec) -> Result<BuildOutcome> {
        let mut state = self.host.state.borrow_mut();
        state.builds += 1;
        match state.build_exit {
            0 => Ok(BuildOutcome::Succeeded),
            code => Err(BootstrapError::BuildFailed {
                command: spec.command_line(),
                code: Some(code),
                reason: format!("exit status {code}"),
            }),
        }
    }
}
