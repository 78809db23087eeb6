//! Build variable lookup.
//!
//! [`BitbakeVars`] asks `bitbake -e` for the fully expanded datastore and
//! picks the requested variables out of its output. Nothing is cached: the
//! fixture rewrites configuration between queries and expects fresh values.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::errors::{FixtureError, Result};
use crate::fs_op::path::expand_tilde;
use crate::runner::CommandRunner;

/// Resolves named build variables.
pub trait BuildVars {
    /// Value of `name`, or `None` when the variable is unset.
    fn get_var(&self, name: &str) -> Result<Option<String>> {
        let mut vars = self.get_vars(&[name])?;
        Ok(vars.remove(name))
    }

    /// Values for several variables in one query. Unset variables are
    /// absent from the returned map.
    fn get_vars(&self, names: &[&str]) -> Result<HashMap<String, String>>;
}

impl<V: BuildVars + ?Sized> BuildVars for &V {
    fn get_vars(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        (**self).get_vars(names)
    }
}

impl<V: BuildVars + ?Sized> BuildVars for Box<V> {
    fn get_vars(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        (**self).get_vars(names)
    }
}

/// Like [`BuildVars::get_var`] but an unset variable is an error.
pub fn require_var(vars: &dyn BuildVars, name: &str) -> Result<String> {
    vars.get_var(name)?
        .ok_or_else(|| FixtureError::MissingVariable(name.to_string()))
}

/// Queries variables by running `bitbake -e` through a [`CommandRunner`].
#[derive(Debug, Clone, Default)]
pub struct BitbakeVars<R> {
    runner: R,
    target: Option<String>,
}

impl<R: CommandRunner> BitbakeVars<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            target: None,
        }
    }

    /// Query the datastore of `target` (`bitbake -e <target>`) instead of
    /// the global one.
    pub fn for_target(runner: R, target: impl Into<String>) -> Self {
        Self {
            runner,
            target: Some(target.into()),
        }
    }

    fn command(&self) -> String {
        match &self.target {
            Some(t) => format!("bitbake -e {}", t),
            None => "bitbake -e".to_string(),
        }
    }
}

impl<R: CommandRunner> BuildVars for BitbakeVars<R> {
    fn get_vars(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        let cmd = self.command();
        debug!("querying {:?} with `{}`", names, cmd);
        let result = self.runner.run(&cmd, false)?;
        Ok(parse_bitbake_env(&result.output, names))
    }
}

fn var_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^(?:export )?(?P<var>\w+(?:_.*)?)="(?P<value>.*)"$"#)
            .expect("static regex is valid")
    })
}

fn unset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^unset (?P<var>\w+)$").expect("static regex is valid"))
}

/// Extract `names` from `bitbake -e` output.
///
/// Assignments look like `VAR="value"` (optionally prefixed with `export`).
/// Unexported variables appear as `unset VAR` preceded by a `#   "value"`
/// comment carrying the value. Empty values count as unset.
pub fn parse_bitbake_env(output: &str, names: &[&str]) -> HashMap<String, String> {
    let mut wanted: BTreeSet<&str> = names.iter().copied().collect();
    let mut values = HashMap::new();
    let mut lastline = "";

    for line in output.lines() {
        if wanted.is_empty() {
            break;
        }
        let found = if let Some(caps) = var_re().captures(line) {
            Some((caps["var"].to_string(), caps["value"].to_string()))
        } else if let Some(caps) = unset_re().captures(line) {
            lastline
                .strip_prefix("#   \"")
                .and_then(|rest| rest.split('"').next())
                .map(|v| (caps["var"].to_string(), v.to_string()))
        } else {
            None
        };

        if let Some((var, value)) = found {
            if !value.is_empty() && wanted.remove(var.as_str()) {
                values.insert(var, value);
            }
        }
        lastline = line;
    }
    values
}

/// Fixed variable map for callers that have no build tool to ask.
#[derive(Debug, Clone, Default)]
pub struct StaticVars {
    vars: HashMap<String, String>,
}

impl StaticVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl BuildVars for StaticVars {
    fn get_vars(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        Ok(names
            .iter()
            .filter_map(|n| self.vars.get(*n).map(|v| (n.to_string(), v.clone())))
            .collect())
    }
}

/// Locate the `meta-selftest` layer among `BBLAYERS`.
pub fn resolve_test_layer(vars: &dyn BuildVars) -> Result<PathBuf> {
    let layers = vars.get_var("BBLAYERS")?.unwrap_or_default();
    layers
        .split_whitespace()
        .filter_map(expand_tilde)
        .find(|layer| layer.to_string_lossy().contains("/meta-selftest") && layer.is_dir())
        .ok_or(FixtureError::TestLayerNotFound)
}
