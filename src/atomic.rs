//! Write-new-then-rename file replacement.

use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Replace `path` with `contents` so readers see either the old file or the
/// complete new one, never a truncated mix.
///
/// The temporary file is created next to `path` (same filesystem, so the
/// rename is atomic) and is removed if anything fails before the rename.
pub fn write_atomic(path: &Path, contents: &[u8], permissions: Option<Permissions>) -> io::Result<()> {
    let dir = parent_dir(path);
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    if let Some(perms) = permissions {
        fs::set_permissions(temp.path(), perms)?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Directory that will hold `path`, treating a bare file name as `.`.
pub fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Whether the file carries any executable bit.
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = fs::metadata(path) {
            return metadata.permissions().mode() & 0o111 != 0;
        }
    }
    false
}
