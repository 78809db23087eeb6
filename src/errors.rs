use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the fixture, its file helpers and the build tool
/// collaborators.
#[derive(Error, Debug)]
pub enum FixtureError {
    /// Underlying IO error annotated with the path being operated on.
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A command exited with a non-zero status and the caller did not ask
    /// to ignore it.
    #[error("command `{command}` exited with status {status}: {output}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },

    /// The command could not be started at all.
    #[error("failed to run `{command}`: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A build variable the fixture depends on is not set.
    #[error("build variable `{0}` is not set")]
    MissingVariable(String),

    /// No layer on `BBLAYERS` looks like the selftest layer.
    #[error("could not find the meta-selftest layer in BBLAYERS")]
    TestLayerNotFound,

    /// Random machine selection was requested but `BBPATH` offers none.
    #[error("no machines found on BBPATH")]
    NoMachines,

    /// `BUILDDIR` is not set in the environment.
    #[error("BUILDDIR is not set; source the build environment first")]
    BuildDirUnset,

    /// Invalid configuration file.
    #[error("invalid configuration in `{path}`: {msg}")]
    Config { path: PathBuf, msg: String },
}

impl FixtureError {
    /// Attach `path` to an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FixtureError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = FixtureError> = std::result::Result<T, E>;

/// Extension for attaching a path to `std::io::Result` values.
pub(crate) trait IoContext<T> {
    fn at(self, path: &std::path::Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| FixtureError::io(path, e))
    }
}
