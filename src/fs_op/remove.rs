use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Lightweight classification of a filesystem path's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// The path does not exist.
    NotFound,
    /// The path exists and is a directory.
    Directory,
    /// The path exists and is a regular file.
    File,
    /// Anything else (socket, FIFO, dangling symlink, ...).
    Other,
}

impl PathType {
    /// Classify `path` without following a final symlink.
    pub fn of<P: AsRef<Path>>(path: P) -> Self {
        match fs::symlink_metadata(path.as_ref()) {
            Err(_) => PathType::NotFound,
            Ok(md) if md.is_dir() => PathType::Directory,
            Ok(md) if md.is_file() => PathType::File,
            Ok(_) => PathType::Other,
        }
    }
}

/// Remove a file or directory at `path`.
///
/// Directories are removed recursively. A path that does not exist is a
/// no-op so tracked paths that a test never created are skipped quietly.
pub fn remove_path(path: impl AsRef<Path>) -> io::Result<()> {
    let p = path.as_ref();
    match PathType::of(p) {
        PathType::NotFound => Ok(()),
        PathType::Directory => fs::remove_dir_all(p),
        PathType::File | PathType::Other => fs::remove_file(p),
    }
}

/// Remove a single file, treating `NotFound` as success.
///
/// Returns whether a file was actually removed. Every other error kind is
/// propagated unchanged.
pub fn remove_file_if_exists(path: impl AsRef<Path>) -> io::Result<bool> {
    match fs::remove_file(path.as_ref()) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Walk `root` and delete every regular file named `file_name`.
///
/// Returns the removed paths. A missing `root` yields an empty list.
pub fn remove_named_files(root: &Path, file_name: &str) -> io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        // Entries that vanish mid-walk (or a missing root) are already gone.
        let entry = match entry.map_err(io::Error::from) {
            Ok(entry) => entry,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if entry.file_type().is_file() && entry.file_name() == file_name {
            if remove_file_if_exists(entry.path())? {
                removed.push(entry.into_path());
            }
        }
    }
    Ok(removed)
}
