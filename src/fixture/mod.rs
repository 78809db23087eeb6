//! The selftest fixture.
//!
//! [`SelftestClass`] wires the include block into the build configuration
//! once per group of tests. [`SelftestFixture`] brackets a single test:
//! [`SelftestFixture::set_up`] backs up (or restores) `local.conf` and
//! `bblayers.conf` and clears stale include files,
//! [`SelftestFixture::tear_down`] runs queued commands and removes tracked
//! paths. Between the two, tests mutate configuration through the helpers in
//! `config_files`.

mod class;
mod config_files;
mod hooks;

pub use class::SelftestClass;
pub use hooks::{FixtureHooks, FnHooks, NoHooks};

use std::env;
use std::mem;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bbvars::{resolve_test_layer, BitbakeVars, BuildVars};
use crate::config::{BuildPaths, FixtureConfig};
use crate::errors::{FixtureError, IoContext, Result};
use crate::fs_op;
use crate::runner::{CommandResult, CommandRunner, ShellRunner};

/// File name of the per-recipe include inside the selftest layer.
pub const RECIPE_INC: &str = "test_recipe.inc";

pub(crate) fn resolve_layer(config: &FixtureConfig, vars: &dyn BuildVars) -> Result<PathBuf> {
    match &config.test_layer {
        Some(layer) => Ok(layer.clone()),
        None => resolve_test_layer(vars),
    }
}

#[derive(Debug, Clone, Copy)]
enum HookPhase {
    SetUp,
    TearDown,
}

/// Per-test fixture state.
pub struct SelftestFixture {
    config: FixtureConfig,
    paths: BuildPaths,
    test_layer: PathBuf,
    runner: Box<dyn CommandRunner>,
    vars: Box<dyn BuildVars>,
    hooks: Option<Box<dyn FixtureHooks>>,
    tear_down_commands: Vec<String>,
    cleanup: Vec<PathBuf>,
}

impl SelftestFixture {
    /// Create a fixture. The selftest layer comes from the configuration or,
    /// failing that, from `BBLAYERS`.
    pub fn new(
        config: FixtureConfig,
        runner: Box<dyn CommandRunner>,
        vars: Box<dyn BuildVars>,
    ) -> Result<Self> {
        config.validate()?;
        let test_layer = resolve_layer(&config, vars.as_ref())?;
        let paths = config.paths();
        let cleanup = paths.default_cleanup();
        Ok(Self {
            config,
            paths,
            test_layer,
            runner,
            vars,
            hooks: None,
            tear_down_commands: Vec::new(),
            cleanup,
        })
    }

    /// Fixture configured from the environment, running commands through
    /// `sh` and querying variables with `bitbake -e`.
    pub fn from_env() -> Result<Self> {
        let config = FixtureConfig::from_env()?;
        Self::new(
            config,
            Box::new(ShellRunner),
            Box::new(BitbakeVars::new(ShellRunner)),
        )
    }

    /// Fixture sharing the configuration and selftest layer of `class`.
    pub fn for_class(
        class: &SelftestClass,
        runner: Box<dyn CommandRunner>,
        vars: Box<dyn BuildVars>,
    ) -> Result<Self> {
        let mut config = class.config().clone();
        if let Some(layer) = class.test_layer() {
            config = config.with_test_layer(layer);
        }
        Self::new(config, runner, vars)
    }

    pub fn with_hooks(mut self, hooks: impl FixtureHooks + 'static) -> Self {
        self.hooks = Some(Box::new(hooks));
        self
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    pub fn test_layer(&self) -> &Path {
        &self.test_layer
    }

    pub fn vars(&self) -> &dyn BuildVars {
        self.vars.as_ref()
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Commands queued for teardown, in order.
    pub fn tear_down_commands(&self) -> &[String] {
        &self.tear_down_commands
    }

    /// Paths removed in teardown.
    pub fn tracked_paths(&self) -> &[PathBuf] {
        &self.cleanup
    }

    /// Prepare the build directory for a test.
    pub fn set_up(&mut self) -> Result<()> {
        if self.config.change_dir {
            env::set_current_dir(&self.paths.builddir).at(&self.paths.builddir)?;
        }

        self.backup_or_restore()?;
        self.remove_stale_includes()?;

        if let Some(machine_override) = self.config.machine_override.clone() {
            let machine = machine_override.resolve(self.vars.as_ref())?;
            self.set_machine_config(&format!("MACHINE ??= \"{}\"\n", machine))?;
            info!("MACHINE: {}", machine);
        }

        self.run_hook(HookPhase::SetUp)
    }

    /// Run queued teardown commands, remove tracked paths and call the
    /// teardown hook.
    ///
    /// Failing commands are logged and never stop the path cleanup. A path
    /// that cannot be removed does not stop the remaining removals or the
    /// hook; its error is returned afterwards and the path stays tracked.
    pub fn tear_down(&mut self) -> Result<()> {
        let commands = mem::take(&mut self.tear_down_commands);
        if !commands.is_empty() {
            let failed: Vec<&str> = commands
                .iter()
                .filter(|cmd| !self.run_tear_down_command(cmd))
                .map(String::as_str)
                .collect();
            if !failed.is_empty() {
                warn!("tearDown commands have failed: {}", failed.join(", "));
                debug!("Trying to move on.");
            }
        }

        let removed = self.remove_tracked_paths();
        let hooked = self.run_hook(HookPhase::TearDown);
        removed.and(hooked)
    }

    /// Queue a shell command to run in teardown.
    pub fn add_command_to_tear_down(&mut self, command: impl Into<String>) {
        let command = command.into();
        debug!("Adding command '{}' to tearDown for this test.", command);
        self.tear_down_commands.push(command);
    }

    /// Remove `path` (file or directory) in teardown.
    pub fn track_for_cleanup(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Adding path '{}' to be cleaned up when test is over", path.display());
        self.cleanup.push(path);
    }

    /// Run `bitbake <args>`, failing on a non-zero exit.
    pub fn bitbake(&self, args: &str) -> Result<CommandResult> {
        self.runner.run(&format!("bitbake {}", args), false)
    }

    fn backup_or_restore(&self) -> Result<()> {
        let p = &self.paths;
        let pairs = [
            (&p.local_conf_backup, &p.local_conf),
            (&p.bblayers_backup, &p.bblayers_conf),
        ];

        if p.local_conf_backup.is_file() || p.bblayers_backup.is_file() {
            debug!(
                "Found a local.conf and/or bblayers.conf backup from a previously aborted test. \
                 Restoring these files now, but tests should be re-executed from a clean \
                 environment to ensure accurate results."
            );
            for (backup, conf) in pairs {
                match fs_op::copy_file(backup, conf) {
                    Ok(_) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(FixtureError::io(backup.as_path(), e)),
                }
            }
        } else {
            for (backup, conf) in pairs {
                fs_op::copy_file(conf, backup).at(conf)?;
            }
            debug!("Creating local.conf and bblayers.conf backups.");
        }
        Ok(())
    }

    // A failed previous test may have left anything behind in the include
    // files, so every test starts from none of them.
    fn remove_stale_includes(&self) -> Result<()> {
        let p = &self.paths;
        fs_op::remove_file_if_exists(&p.selftest_inc).at(&p.selftest_inc)?;
        fs_op::remove_named_files(&self.test_layer, RECIPE_INC).at(&self.test_layer)?;
        for inc in [&p.bblayers_inc, &p.machine_inc] {
            fs_op::remove_file_if_exists(inc).at(inc)?;
        }
        Ok(())
    }

    // Every tracked path gets a removal attempt; the first failure is
    // returned and the failed paths stay tracked.
    fn remove_tracked_paths(&mut self) -> Result<()> {
        let mut first_err = None;
        let mut kept = Vec::new();
        for path in mem::take(&mut self.cleanup) {
            if let Err(e) = fs_op::remove_path(&path) {
                warn!("could not remove {}: {}", path.display(), e);
                if first_err.is_none() {
                    first_err = Some(FixtureError::io(path.as_path(), e));
                }
                kept.push(path);
            }
        }

        match first_err {
            None => {
                self.cleanup = self.paths.default_cleanup();
                Ok(())
            }
            Some(e) => {
                self.cleanup = kept;
                Err(e)
            }
        }
    }

    fn run_tear_down_command(&self, command: &str) -> bool {
        match self.runner.run(command, true) {
            Ok(result) => result.success(),
            Err(e) => {
                debug!("tearDown command '{}' could not run: {}", command, e);
                false
            }
        }
    }

    fn run_hook(&mut self, phase: HookPhase) -> Result<()> {
        let Some(mut hooks) = self.hooks.take() else {
            return Ok(());
        };
        let result = match phase {
            HookPhase::SetUp => hooks.set_up_local(self),
            HookPhase::TearDown => hooks.tear_down_local(self),
        };
        self.hooks = Some(hooks);
        result
    }
}

impl std::fmt::Debug for SelftestFixture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelftestFixture")
            .field("config", &self.config)
            .field("test_layer", &self.test_layer)
            .field("tear_down_commands", &self.tear_down_commands)
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}
