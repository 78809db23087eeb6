//! Helpers tests use to mutate build configuration.
//!
//! General settings go to `conf/selftest.inc`, layer settings to
//! `conf/bblayers.inc`, the machine to `conf/machine.inc` and per-recipe
//! settings to `<meta-selftest>/recipes-test/<recipe>/test_recipe.inc`.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{IoContext, Result};
use crate::fixture::{SelftestFixture, RECIPE_INC};
use crate::fs_op;

#[derive(Debug, Clone, Copy)]
enum Edit {
    Write,
    Append,
    Remove,
}

fn edit_file(path: &Path, data: &str, edit: Edit) -> Result<()> {
    let res = match edit {
        Edit::Write => {
            debug!("Writing to: {}\n{}\n", path.display(), data);
            fs_op::write_file(path, data)
        }
        Edit::Append => {
            debug!("Appending to: {}\n{}\n", path.display(), data);
            fs_op::append_file(path, data)
        }
        Edit::Remove => {
            debug!("Removing from: {}\n{}\n", path.display(), data);
            fs_op::remove_from_file(path, data)
        }
    };
    res.at(path)
}

impl SelftestFixture {
    /// Path of the include file for `recipe` in the selftest layer.
    pub fn recipe_inc_path(&self, recipe: &str) -> PathBuf {
        self.test_layer
            .join("recipes-test")
            .join(recipe)
            .join(RECIPE_INC)
    }

    /// Replace `conf/selftest.inc` with `data`.
    pub fn write_config(&self, data: &str) -> Result<()> {
        edit_file(&self.paths.selftest_inc, data, Edit::Write)?;
        self.warn_machine_overridden(data);
        Ok(())
    }

    /// Append `data` to `conf/selftest.inc`.
    pub fn append_config(&self, data: &str) -> Result<()> {
        edit_file(&self.paths.selftest_inc, data, Edit::Append)?;
        self.warn_machine_overridden(data);
        Ok(())
    }

    /// Remove the lines of `data` from `conf/selftest.inc`.
    pub fn remove_config(&self, data: &str) -> Result<()> {
        edit_file(&self.paths.selftest_inc, data, Edit::Remove)
    }

    pub fn write_recipeinc(&self, recipe: &str, data: &str) -> Result<()> {
        edit_file(&self.recipe_inc_path(recipe), data, Edit::Write)
    }

    pub fn append_recipeinc(&self, recipe: &str, data: &str) -> Result<()> {
        edit_file(&self.recipe_inc_path(recipe), data, Edit::Append)
    }

    pub fn remove_recipeinc(&self, recipe: &str, data: &str) -> Result<()> {
        edit_file(&self.recipe_inc_path(recipe), data, Edit::Remove)
    }

    /// Delete the include file of `recipe`; a missing file is fine.
    pub fn delete_recipeinc(&self, recipe: &str) -> Result<()> {
        let inc = self.recipe_inc_path(recipe);
        debug!("Deleting file: {}", inc.display());
        fs_op::remove_file_if_exists(&inc).at(&inc)?;
        Ok(())
    }

    pub fn write_bblayers_config(&self, data: &str) -> Result<()> {
        edit_file(&self.paths.bblayers_inc, data, Edit::Write)
    }

    pub fn append_bblayers_config(&self, data: &str) -> Result<()> {
        edit_file(&self.paths.bblayers_inc, data, Edit::Append)
    }

    pub fn remove_bblayers_config(&self, data: &str) -> Result<()> {
        edit_file(&self.paths.bblayers_inc, data, Edit::Remove)
    }

    /// Replace `conf/machine.inc` with `data`.
    pub fn set_machine_config(&self, data: &str) -> Result<()> {
        edit_file(&self.paths.machine_inc, data, Edit::Write)
    }

    // machine.inc is included before selftest.inc and uses `??=`, so a
    // MACHINE set by the test wins over the --machine override. Report what
    // bitbake actually ends up with.
    fn warn_machine_overridden(&self, data: &str) {
        if self.config.machine_override.is_none() || !data.contains("MACHINE") {
            return;
        }
        match self.vars.get_var("MACHINE") {
            Ok(machine) => warn!("MACHINE overridden: {}", machine.unwrap_or_default()),
            Err(e) => warn!("MACHINE overridden (could not query the effective value: {})", e),
        }
    }
}
