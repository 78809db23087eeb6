use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use fs_extra::error::ErrorKind as CopyErrorKind;
use fs_extra::file::{copy as fs_extra_copy, CopyOptions};

/// Ensure parent directory exists for a path.
pub fn ensure_parent_exists(p: &Path) -> io::Result<()> {
    if let Some(parent) = p.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write `data` to `target` atomically by writing to a temporary file in the
/// same directory and then renaming into place, so the build tool never
/// parses a half-written configuration file.
///
/// A symlinked `target` is written through to the file it points at, and an
/// existing file keeps its permissions.
pub fn atomic_write(target: &Path, data: &[u8]) -> io::Result<()> {
    let target = match fs::canonicalize(target) {
        Ok(resolved) => resolved,
        Err(e) if e.kind() == io::ErrorKind::NotFound => target.to_path_buf(),
        Err(e) => return Err(e),
    };
    let Some(dir) = target.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return fs::write(&target, data);
    };
    fs::create_dir_all(dir)?;
    let permissions = match fs::metadata(&target) {
        Ok(md) => Some(md.permissions()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(e),
    };

    // pid + sequence keeps names unique across processes and rapid calls.
    static NEXT_WRITE_ID: AtomicU64 = AtomicU64::new(0);
    let seq = NEXT_WRITE_ID.fetch_add(1, Ordering::Relaxed);
    let tmp = dir.join(format!(".tmp_atomic_write.{:x}.{:x}", std::process::id(), seq));

    let written = fs::write(&tmp, data).and_then(|()| match permissions {
        Some(perm) => fs::set_permissions(&tmp, perm),
        None => Ok(()),
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    match fs::rename(&tmp, &target) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}

/// Copy a single file from `src` to `dst`, overwriting `dst`.
///
/// A missing `src` surfaces as `io::ErrorKind::NotFound` so callers can
/// tell expected absence apart from real failures.
pub fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    ensure_parent_exists(dst)?;
    let mut options = CopyOptions::new();
    options.overwrite = true;
    options.buffer_size = 64 * 1024;
    fs_extra_copy(src, dst, &options).map_err(|e| {
        let msg = e.to_string();
        match e.kind {
            CopyErrorKind::Io(inner) => inner,
            CopyErrorKind::NotFound => io::Error::new(io::ErrorKind::NotFound, msg),
            CopyErrorKind::PermissionDenied => io::Error::new(io::ErrorKind::PermissionDenied, msg),
            _ => io::Error::other(msg),
        }
    })
}
