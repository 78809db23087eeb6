//! Line-oriented helpers for BitBake configuration fragments.
//!
//! Written data is normalised to end in exactly one newline so repeated
//! appends produce one statement per line.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::helpers::{atomic_write, ensure_parent_exists};

fn normalise(data: &str) -> String {
    let mut out = data.trim_end().to_string();
    out.push('\n');
    out
}

/// Read the whole file into a string.
pub fn read_file(path: &Path) -> io::Result<String> {
    fs::read_to_string(path)
}

/// Replace the content of `path` with `data`.
pub fn write_file(path: &Path, data: &str) -> io::Result<()> {
    atomic_write(path, normalise(data).as_bytes())
}

/// Append `data` to `path`, creating the file when it does not exist.
pub fn append_file(path: &Path, data: &str) -> io::Result<()> {
    ensure_parent_exists(path)?;
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.write_all(normalise(data).as_bytes())
}

/// Remove the lines of `data` from `path`.
///
/// For every line of `data` the first matching line of the file is dropped;
/// lines that do not occur are ignored. A missing file is a no-op.
pub fn remove_from_file(path: &Path, data: &str) -> io::Result<()> {
    let content = match read_file(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let mut lines: Vec<&str> = content.trim().lines().collect();
    for line in data.trim().lines() {
        if let Some(pos) = lines.iter().position(|l| *l == line) {
            lines.remove(pos);
        }
    }
    write_file(path, &lines.join("\n"))
}
