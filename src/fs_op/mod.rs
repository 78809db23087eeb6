//! Filesystem primitives used by the fixture.
//!
//! These helpers return `std::io::Result` and know nothing about build
//! directories; the fixture layer attaches path context and decides which
//! failures are expected.

pub mod helpers;
pub mod path;
pub mod remove;
pub mod text;

pub use helpers::{atomic_write, copy_file, ensure_parent_exists};
pub use remove::{remove_file_if_exists, remove_named_files, remove_path, PathType};
pub use text::{append_file, read_file, remove_from_file, write_file};
