//! Machine discovery and the `--machine` override.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::debug;

use crate::bbvars::{require_var, BuildVars};
use crate::config::MachineOverride;
use crate::errors::{FixtureError, IoContext, Result};

/// Machine names defined by `<layer>/conf/machine/*.conf`.
///
/// A layer without a machine directory contributes nothing.
pub fn machines_in_layer(layer: &Path) -> Result<Vec<String>> {
    let dir = layer.join("conf").join("machine");
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(FixtureError::io(dir, e)),
    };

    let mut machines = Vec::new();
    for entry in entries {
        let path = entry.at(&dir)?.path();
        let hidden = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().starts_with('.'));
        if hidden || !path.extension().is_some_and(|ext| ext == "conf") || !path.is_file() {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            machines.push(stem.to_string_lossy().into_owned());
        }
    }
    machines.sort();
    Ok(machines)
}

/// Every machine available on `BBPATH`, de-duplicated and sorted.
///
/// An empty `BBPATH` entry stands for the current directory.
pub fn available_machines(vars: &dyn BuildVars) -> Result<Vec<String>> {
    let bbpath = require_var(vars, "BBPATH")?;
    let mut machines = BTreeSet::new();
    for layer in bbpath.split(':') {
        let layer = if layer.is_empty() { "." } else { layer };
        let found = machines_in_layer(Path::new(layer))?;
        debug!("{} machine(s) in {}", found.len(), layer);
        machines.extend(found);
    }
    Ok(machines.into_iter().collect())
}

impl MachineOverride {
    /// Turn the override into a concrete machine name using the thread RNG
    /// for random selection.
    pub fn resolve(&self, vars: &dyn BuildVars) -> Result<String> {
        self.resolve_with(vars, &mut rand::rng())
    }

    /// Like [`MachineOverride::resolve`] with an explicit RNG.
    pub fn resolve_with<R: Rng + ?Sized>(&self, vars: &dyn BuildVars, rng: &mut R) -> Result<String> {
        match self {
            MachineOverride::Named(name) => Ok(name.clone()),
            MachineOverride::Random => {
                let machines = available_machines(vars)?;
                machines.choose(rng).cloned().ok_or(FixtureError::NoMachines)
            }
        }
    }
}
