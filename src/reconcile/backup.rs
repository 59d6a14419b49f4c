//! Timestamped backups of the working document.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// Timestamp format used in backup names (sortable, second granularity)
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `<working>.bak_<YYYYMMDD_HHMMSS>`
pub fn backup_path(working: &Path, at: NaiveDateTime) -> PathBuf {
    with_suffix(working, &format!(".bak_{}", at.format(BACKUP_TIMESTAMP_FORMAT)))
}

/// First unused backup name for `working` at `at`.
///
/// When the timestamped name is taken, `_1`, `_2`, ... is appended.
pub fn next_backup_path(working: &Path, at: NaiveDateTime) -> PathBuf {
    let base = backup_path(working, at);
    let mut candidate = base.clone();
    let mut n = 1u32;
    while candidate.exists() {
        candidate = with_suffix(&base, &format!("_{}", n));
        n += 1;
    }
    candidate
}

/// Copy `working` to a fresh backup path and return it. Existing backups
/// are never overwritten.
pub fn create_backup(working: &Path, at: NaiveDateTime) -> io::Result<PathBuf> {
    let candidate = next_backup_path(working, at);
    fs::copy(working, &candidate)?;
    Ok(candidate)
}

/// Existing backups of `working`, oldest first.
pub fn list_backups(working: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(name) = working.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}.bak_", name);
    let dir = crate::atomic::parent_dir(working);

    let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .collect();
    backups.sort();
    Ok(backups)
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
