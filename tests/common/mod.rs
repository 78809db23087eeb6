// Shared helpers for the integration tests: a throwaway build directory
// with a meta-selftest layer, and command runner / variable doubles.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::io;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use assert_fs::TempDir;
use selftest_fixture::{
    BuildVars, CommandResult, CommandRunner, FixtureConfig, FixtureError, Result, StaticVars,
};

/// Serialises tests that change the process working directory.
pub static TEST_CWD_LOCK: Mutex<()> = Mutex::new(());

pub const LOCAL_CONF: &str = "DISTRO ?= \"poky\"\nMACHINE ??= \"qemux86-64\"\n";
pub const BBLAYERS_CONF: &str = "BBPATH = \"${TOPDIR}\"\nBBLAYERS ?= \"/srv/poky/meta\"\n";

/// A fake build tree:
///
/// ```text
/// <tmp>/build/conf/{local.conf,bblayers.conf}
/// <tmp>/meta-selftest/recipes-test/<recipe>/
/// <tmp>/meta-selftest/conf/machine/*.conf
/// <tmp>/meta-bsp/conf/machine/*.conf
/// ```
pub struct BuildTree {
    pub dir: TempDir,
    pub builddir: PathBuf,
    pub layer: PathBuf,
    pub bsp: PathBuf,
}

impl BuildTree {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let builddir = dir.path().join("build");
        let layer = dir.path().join("meta-selftest");
        let bsp = dir.path().join("meta-bsp");

        fs::create_dir_all(builddir.join("conf")).expect("mkdir conf");
        fs::write(builddir.join("conf/local.conf"), LOCAL_CONF).expect("local.conf");
        fs::write(builddir.join("conf/bblayers.conf"), BBLAYERS_CONF).expect("bblayers.conf");

        for recipe in ["aspell", "emptytest", "xcursor-transparent-theme"] {
            fs::create_dir_all(layer.join("recipes-test").join(recipe)).expect("mkdir recipe");
        }
        write_machines(&layer, &["qemux86-64"]);
        write_machines(&bsp, &["intel-corei7-64", "genericarm64"]);

        Self {
            dir,
            builddir,
            layer,
            bsp,
        }
    }

    pub fn conf(&self, name: &str) -> PathBuf {
        self.builddir.join("conf").join(name)
    }

    pub fn read_conf(&self, name: &str) -> String {
        fs::read_to_string(self.conf(name)).expect("read conf file")
    }

    pub fn config(&self) -> FixtureConfig {
        FixtureConfig::new(&self.builddir)
            .with_test_layer(&self.layer)
            .with_change_dir(false)
    }

    /// Variables a real `bitbake -e` would report for this tree.
    pub fn vars(&self) -> StaticVars {
        StaticVars::new()
            .with("BBPATH", format!("{}:{}", self.layer.display(), self.bsp.display()))
            .with("BBLAYERS", format!("/srv/poky/meta {}", self.layer.display()))
            .with("MACHINE", "qemux86-64")
    }

    pub fn machines(&self) -> Vec<&'static str> {
        vec!["genericarm64", "intel-corei7-64", "qemux86-64"]
    }
}

fn write_machines(layer: &Path, machines: &[&str]) {
    let dir = layer.join("conf/machine");
    fs::create_dir_all(&dir).expect("mkdir machine dir");
    for m in machines {
        fs::write(dir.join(format!("{}.conf", m)), "#@TYPE: Machine\n").expect("machine conf");
    }
}

/// Records every command and answers with a canned status per command.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    pub seen: Rc<RefCell<Vec<String>>>,
    statuses: HashMap<String, i32>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, command: &str, status: i32) -> Self {
        self.statuses.insert(command.to_string(), status);
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.seen.borrow().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &str, ignore_status: bool) -> Result<CommandResult> {
        self.seen.borrow_mut().push(command.to_string());
        let status = self.statuses.get(command).copied().unwrap_or(0);
        if status != 0 && !ignore_status {
            return Err(FixtureError::CommandFailed {
                command: command.to_string(),
                status,
                output: String::new(),
            });
        }
        Ok(CommandResult {
            command: command.to_string(),
            status,
            output: String::new(),
        })
    }
}

/// Counts lookups so tests can check when the fixture queries bitbake.
#[derive(Clone)]
pub struct CountingVars {
    inner: StaticVars,
    pub lookups: Rc<RefCell<Vec<String>>>,
}

impl CountingVars {
    pub fn new(inner: StaticVars) -> Self {
        Self {
            inner,
            lookups: Rc::default(),
        }
    }
}

impl BuildVars for CountingVars {
    fn get_vars(&self, names: &[&str]) -> Result<HashMap<String, String>> {
        self.lookups
            .borrow_mut()
            .extend(names.iter().map(|n| n.to_string()));
        self.inner.get_vars(names)
    }
}

/// Buffer the formatted events emitted while `f` runs on this thread.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buf = LogBuffer::default();
    let writer = buf.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buf.0.lock().unwrap_or_else(|e| e.into_inner())).into_owned();
    (out, logs)
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
