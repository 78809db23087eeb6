//! Fixture configuration.
//!
//! A [`FixtureConfig`] is built once at process start, either from the
//! environment exported by `oe-init-build-env` or from a TOML file, and is
//! then handed to the fixture. All build-directory paths are derived from it
//! through [`BuildPaths`].

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::errors::{FixtureError, IoContext, Result};

/// Marker appended with the include block during class setup.
pub const INCLUDE_MARKER: &str = "#include added by oe-test";

/// Marker looked for when removing the include block during class teardown.
///
/// This does not match [`INCLUDE_MARKER`], so with the defaults the include
/// block survives class teardown. See `SelftestClass::remove_include`.
pub const REMOVAL_MARKER: &str = "#include added by oe-selftest.py";

/// Environment variable holding the build directory.
pub const BUILDDIR_ENV: &str = "BUILDDIR";

/// Environment variable holding the machine override (`--machine`).
pub const MACHINE_ENV: &str = "CUSTOMMACHINE";

/// How the target machine is overridden for every test.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum MachineOverride {
    /// Use this machine name verbatim.
    Named(String),
    /// Pick a random machine among those available on `BBPATH`.
    Random,
}

impl From<String> for MachineOverride {
    fn from(value: String) -> Self {
        if value == "random" {
            MachineOverride::Random
        } else {
            MachineOverride::Named(value)
        }
    }
}

impl fmt::Display for MachineOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineOverride::Named(name) => f.write_str(name),
            MachineOverride::Random => f.write_str("random"),
        }
    }
}

/// Runtime configuration for the selftest fixture.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FixtureConfig {
    /// Root of the build tree (`$BUILDDIR`).
    pub builddir: PathBuf,
    /// Machine forced for every test, if any.
    pub machine_override: Option<MachineOverride>,
    /// Explicit selftest layer; resolved from `BBLAYERS` when unset.
    pub test_layer: Option<PathBuf>,
    /// Comment line written ahead of the include block in class setup.
    pub include_marker: String,
    /// Comment line class teardown looks for before stripping the block.
    pub removal_marker: String,
    /// Change the process working directory to `builddir` in per-test setup.
    pub change_dir: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            builddir: PathBuf::new(),
            machine_override: None,
            test_layer: None,
            include_marker: INCLUDE_MARKER.to_string(),
            removal_marker: REMOVAL_MARKER.to_string(),
            change_dir: true,
        }
    }
}

impl FixtureConfig {
    /// Configuration rooted at `builddir` with every other field defaulted.
    pub fn new(builddir: impl Into<PathBuf>) -> Self {
        Self {
            builddir: builddir.into(),
            ..Self::default()
        }
    }

    /// Read `BUILDDIR` and `CUSTOMMACHINE` from the environment.
    pub fn from_env() -> Result<Self> {
        let builddir = env::var_os(BUILDDIR_ENV)
            .filter(|v| !v.is_empty())
            .ok_or(FixtureError::BuildDirUnset)?;
        let mut cfg = Self::new(builddir);
        cfg.machine_override = machine_override_from_env();
        Ok(cfg)
    }

    /// Load a TOML configuration file.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).at(path)?;
        Self::from_toml_str(&raw).map_err(|msg| FixtureError::Config {
            path: path.to_path_buf(),
            msg,
        })
    }

    pub(crate) fn from_toml_str(raw: &str) -> std::result::Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    /// Let `BUILDDIR` and `CUSTOMMACHINE` from the environment take
    /// precedence over values loaded from a file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = env::var_os(BUILDDIR_ENV).filter(|v| !v.is_empty()) {
            self.builddir = PathBuf::from(dir);
        }
        if let Some(machine) = machine_override_from_env() {
            self.machine_override = Some(machine);
        }
        self
    }

    pub fn with_machine_override(mut self, machine: MachineOverride) -> Self {
        self.machine_override = Some(machine);
        self
    }

    pub fn with_test_layer(mut self, layer: impl Into<PathBuf>) -> Self {
        self.test_layer = Some(layer.into());
        self
    }

    pub fn with_change_dir(mut self, change_dir: bool) -> Self {
        self.change_dir = change_dir;
        self
    }

    /// Fails with [`FixtureError::BuildDirUnset`] when no build directory
    /// was configured.
    pub fn validate(&self) -> Result<()> {
        if self.builddir.as_os_str().is_empty() {
            return Err(FixtureError::BuildDirUnset);
        }
        Ok(())
    }

    pub fn paths(&self) -> BuildPaths {
        BuildPaths::new(&self.builddir)
    }
}

fn machine_override_from_env() -> Option<MachineOverride> {
    env::var(MACHINE_ENV)
        .ok()
        .filter(|v| !v.is_empty())
        .map(MachineOverride::from)
}

/// Files the fixture touches inside a build directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    pub builddir: PathBuf,
    pub local_conf: PathBuf,
    pub local_conf_backup: PathBuf,
    pub bblayers_conf: PathBuf,
    pub bblayers_backup: PathBuf,
    pub selftest_inc: PathBuf,
    pub bblayers_inc: PathBuf,
    pub machine_inc: PathBuf,
}

impl BuildPaths {
    pub fn new(builddir: &Path) -> Self {
        let conf = builddir.join("conf");
        Self {
            builddir: builddir.to_path_buf(),
            local_conf: conf.join("local.conf"),
            local_conf_backup: conf.join("local.bk"),
            bblayers_conf: conf.join("bblayers.conf"),
            bblayers_backup: conf.join("bblayers.bk"),
            selftest_inc: conf.join("selftest.inc"),
            bblayers_inc: conf.join("bblayers.inc"),
            machine_inc: conf.join("machine.inc"),
        }
    }

    /// Paths every fixture removes in teardown: the generated include files
    /// and both backups.
    pub fn default_cleanup(&self) -> Vec<PathBuf> {
        vec![
            self.selftest_inc.clone(),
            self.bblayers_inc.clone(),
            self.machine_inc.clone(),
            self.local_conf_backup.clone(),
            self.bblayers_backup.clone(),
        ]
    }
}
