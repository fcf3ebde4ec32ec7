//! Durable file writes.
//!
//! A write survives a crash only once the file is synced, and a rename only
//! once the directory holding it is synced. The helpers here do both.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writes `bytes` to `path`, replacing any previous contents, and syncs the
/// file before returning.
pub fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Renames `from` over `to` and syncs the destination directory so the
/// rename itself is durable.
///
/// # Errors
///
/// Returns an error if the rename fails or the directory cannot be synced.
/// On error `to` holds either its old contents or the new ones.
pub fn replace_synced(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::rename(from, to)?;
    match to.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => sync_dir(dir),
        _ => sync_dir(Path::new(".")),
    }
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}
