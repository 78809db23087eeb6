//! Class-level fixture state: the include block wired into `local.conf` and
//! `bblayers.conf` for the lifetime of a group of tests.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::bbvars::BuildVars;
use crate::config::{BuildPaths, FixtureConfig};
use crate::errors::{IoContext, Result};
use crate::fixture::{resolve_layer, RECIPE_INC};
use crate::fs_op;

fn local_conf_block(marker: &str) -> String {
    format!("\n{}\ninclude machine.inc\ninclude selftest.inc", marker)
}

fn bblayers_block(marker: &str) -> String {
    format!("\n{}\ninclude bblayers.inc", marker)
}

/// Set up and tear down the include directives shared by every test of a
/// class.
#[derive(Debug, Clone)]
pub struct SelftestClass {
    config: FixtureConfig,
    paths: BuildPaths,
    test_layer: Option<PathBuf>,
}

impl SelftestClass {
    pub fn new(config: FixtureConfig, test_layer: impl Into<PathBuf>) -> Result<Self> {
        config.validate()?;
        let paths = config.paths();
        Ok(Self {
            config,
            paths,
            test_layer: Some(test_layer.into()),
        })
    }

    /// Class state that only manages the build directory. Recipe includes
    /// in the selftest layer are left alone by
    /// [`SelftestClass::remove_inc_files`].
    pub fn without_test_layer(config: FixtureConfig) -> Result<Self> {
        config.validate()?;
        let paths = config.paths();
        Ok(Self {
            config,
            paths,
            test_layer: None,
        })
    }

    /// Build the class state, locating the selftest layer through `vars`
    /// unless the configuration names one.
    pub fn resolve(config: FixtureConfig, vars: &dyn BuildVars) -> Result<Self> {
        let layer = resolve_layer(&config, vars)?;
        Self::new(config, layer)
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn paths(&self) -> &BuildPaths {
        &self.paths
    }

    pub fn test_layer(&self) -> Option<&Path> {
        self.test_layer.as_deref()
    }

    pub fn set_up_class(&self) -> Result<()> {
        self.add_include()
    }

    pub fn tear_down_class(&self) -> Result<()> {
        self.remove_include()?;
        self.remove_inc_files()
    }

    /// Append the include block to `local.conf` and `bblayers.conf` unless
    /// the include marker is already there.
    pub fn add_include(&self) -> Result<()> {
        let marker = &self.config.include_marker;
        let targets = [
            (&self.paths.local_conf, local_conf_block(marker), "selftest.inc"),
            (&self.paths.bblayers_conf, bblayers_block(marker), "bblayers.inc"),
        ];
        for (path, block, include) in targets {
            let content = fs_op::read_file(path).at(path)?;
            if content.contains(marker.as_str()) {
                debug!("{} already includes {}", path.display(), include);
                continue;
            }
            info!("Adding: \"include {}\" in {}", include, path.display());
            fs_op::append_file(path, &block).at(path)?;
        }
        Ok(())
    }

    /// Strip the include block from both configuration files when the
    /// removal marker is found.
    ///
    /// With the default markers the removal marker never matches what
    /// [`SelftestClass::add_include`] wrote, so the block stays and a
    /// warning is logged instead.
    pub fn remove_include(&self) -> Result<()> {
        let marker = &self.config.removal_marker;
        let targets = [
            (&self.paths.local_conf, local_conf_block(marker)),
            (&self.paths.bblayers_conf, bblayers_block(marker)),
        ];
        for (path, block) in targets {
            let content = fs_op::read_file(path).at(path)?;
            if content.contains(marker.as_str()) {
                info!("Removing the include from {}", path.display());
                fs_op::remove_from_file(path, &block).at(path)?;
            } else if content.contains(self.config.include_marker.as_str()) {
                warn!(
                    "{} keeps its selftest include block: teardown looks for {:?} but setup wrote {:?}",
                    path.display(),
                    marker,
                    self.config.include_marker
                );
            }
        }
        Ok(())
    }

    /// Delete every generated include file, including recipe includes in
    /// the test layer. Files that are already gone are skipped.
    pub fn remove_inc_files(&self) -> Result<()> {
        let p = &self.paths;
        fs_op::remove_file_if_exists(&p.selftest_inc).at(&p.selftest_inc)?;
        match &self.test_layer {
            Some(layer) => {
                for removed in fs_op::remove_named_files(layer, RECIPE_INC).at(layer)? {
                    debug!("removed {}", removed.display());
                }
            }
            None => debug!("no selftest layer configured, skipping {} files", RECIPE_INC),
        }
        for inc in [&p.bblayers_inc, &p.machine_inc] {
            fs_op::remove_file_if_exists(inc).at(inc)?;
        }
        Ok(())
    }

    /// Put back `local.conf` and `bblayers.conf` from the backups an aborted
    /// run left behind, then delete the backups. Returns how many files were
    /// restored.
    pub fn restore_backups(&self) -> Result<usize> {
        let p = &self.paths;
        let mut restored = 0;
        for (backup, conf) in [
            (&p.local_conf_backup, &p.local_conf),
            (&p.bblayers_backup, &p.bblayers_conf),
        ] {
            if !backup.is_file() {
                continue;
            }
            fs_op::copy_file(backup, conf).at(backup)?;
            fs_op::remove_file_if_exists(backup).at(backup)?;
            info!("Restored {} from {}", conf.display(), backup.display());
            restored += 1;
        }
        Ok(restored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{INCLUDE_MARKER, REMOVAL_MARKER};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn build_tree() -> (TempDir, SelftestClass) {
        let td = tempdir().expect("tempdir");
        let conf = td.path().join("build/conf");
        fs::create_dir_all(&conf).expect("mkdir conf");
        fs::write(conf.join("local.conf"), "MACHINE ??= \"qemux86-64\"\n").expect("local.conf");
        fs::write(conf.join("bblayers.conf"), "BBLAYERS ?= \"/srv/poky/meta\"\n").expect("bblayers.conf");
        let layer = td.path().join("meta-selftest");
        fs::create_dir_all(layer.join("recipes-test")).expect("mkdir layer");
        let class = SelftestClass::new(FixtureConfig::new(td.path().join("build")), layer).expect("class");
        (td, class)
    }

    #[test]
    fn add_include_is_idempotent() {
        let (_td, class) = build_tree();
        class.set_up_class().expect("first");
        class.set_up_class().expect("second");

        let local = fs::read_to_string(&class.paths().local_conf).expect("read");
        let layers = fs::read_to_string(&class.paths().bblayers_conf).expect("read");
        assert_eq!(local.matches(INCLUDE_MARKER).count(), 1);
        assert_eq!(layers.matches(INCLUDE_MARKER).count(), 1);
        assert!(local.ends_with("include machine.inc\ninclude selftest.inc\n"));
        assert!(layers.ends_with("include bblayers.inc\n"));
    }

    #[test]
    fn default_markers_leave_include_in_place() {
        let (_td, class) = build_tree();
        class.set_up_class().expect("setup");
        let before = fs::read_to_string(&class.paths().local_conf).expect("read");
        class.remove_include().expect("remove");
        let after = fs::read_to_string(&class.paths().local_conf).expect("read");
        assert_eq!(before, after);
    }

    #[test]
    fn matching_removal_marker_strips_block() {
        let (td, _) = build_tree();
        let mut cfg = FixtureConfig::new(td.path().join("build"));
        cfg.include_marker = REMOVAL_MARKER.to_string();
        let class = SelftestClass::new(cfg, td.path().join("meta-selftest")).expect("class");

        class.add_include().expect("add");
        class.remove_include().expect("remove");
        assert_eq!(
            fs::read_to_string(&class.paths().local_conf).expect("read"),
            "MACHINE ??= \"qemux86-64\"\n"
        );
        assert_eq!(
            fs::read_to_string(&class.paths().bblayers_conf).expect("read"),
            "BBLAYERS ?= \"/srv/poky/meta\"\n"
        );
    }

    #[cfg(unix)]
    #[test]
    fn include_round_trip_keeps_conf_mode() {
        use std::os::unix::fs::PermissionsExt;

        let (td, _) = build_tree();
        let mut cfg = FixtureConfig::new(td.path().join("build"));
        cfg.removal_marker = INCLUDE_MARKER.to_string();
        let class = SelftestClass::new(cfg, td.path().join("meta-selftest")).expect("class");
        let local = &class.paths().local_conf;
        fs::set_permissions(local, fs::Permissions::from_mode(0o600)).expect("chmod");

        class.add_include().expect("add");
        class.remove_include().expect("remove");

        let mode = fs::metadata(local).expect("stat").permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(fs::read_to_string(local).expect("read"), "MACHINE ??= \"qemux86-64\"\n");
    }

    #[test]
    fn remove_inc_files_clears_generated_files() {
        let (_td, class) = build_tree();
        let p = class.paths().clone();
        for inc in [&p.selftest_inc, &p.bblayers_inc] {
            fs::write(inc, "X = \"1\"\n").expect("write inc");
        }
        let recipe_inc = class
            .test_layer()
            .expect("layer")
            .join("recipes-test/aspell")
            .join(RECIPE_INC);
        fs::create_dir_all(recipe_inc.parent().expect("parent")).expect("mkdir");
        fs::write(&recipe_inc, "PR = \"r1\"\n").expect("write recipe inc");

        class.tear_down_class().expect("teardown");
        assert!(!p.selftest_inc.exists());
        assert!(!p.bblayers_inc.exists());
        assert!(!p.machine_inc.exists());
        assert!(!recipe_inc.exists());
    }

    #[test]
    fn missing_local_conf_is_error() {
        let td = tempdir().expect("tempdir");
        let class = SelftestClass::new(FixtureConfig::new(td.path()), td.path()).expect("class");
        assert!(class.add_include().is_err());
    }

    #[test]
    fn restore_backups_puts_originals_back() {
        let (_td, class) = build_tree();
        let p = class.paths().clone();
        fs::write(&p.local_conf_backup, "ORIGINAL = \"1\"\n").expect("backup");
        fs::write(&p.local_conf, "MUTATED = \"1\"\n").expect("mutate");

        assert_eq!(class.restore_backups().expect("restore"), 1);
        assert_eq!(fs::read_to_string(&p.local_conf).expect("read"), "ORIGINAL = \"1\"\n");
        assert!(!p.local_conf_backup.exists());
        assert_eq!(class.restore_backups().expect("nothing left"), 0);
    }

    #[test]
    fn without_layer_still_cleans_build_dir() {
        let (td, _) = build_tree();
        let class = SelftestClass::without_test_layer(FixtureConfig::new(td.path().join("build")))
            .expect("class");
        fs::write(&class.paths().machine_inc, "MACHINE ??= \"qemuarm\"\n").expect("machine.inc");
        class.remove_inc_files().expect("clean");
        assert!(!class.paths().machine_inc.exists());
        assert!(class.test_layer().is_none());
    }
}
