//! Build-directory fixture for BitBake selftest cases.
//!
//! A selftest class calls [`SelftestClass::set_up_class`] once to wire
//! `selftest.inc`, `machine.inc` and `bblayers.inc` into the build
//! configuration, then brackets every test with
//! [`SelftestFixture::set_up`] / [`SelftestFixture::tear_down`].

pub mod bbvars;
pub mod config;
pub mod errors;
pub mod fixture;
pub mod fs_op;
pub mod logging;
pub mod machines;
pub mod runner;

pub use crate::bbvars::{BitbakeVars, BuildVars, StaticVars};
pub use crate::config::{BuildPaths, FixtureConfig, MachineOverride};
pub use crate::errors::{FixtureError, Result};
pub use crate::fixture::{FixtureHooks, FnHooks, NoHooks, SelftestClass, SelftestFixture};
pub use crate::machines::available_machines;
pub use crate::runner::{CommandResult, CommandRunner, ShellRunner};
