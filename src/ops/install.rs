//! Installing and updating the `sbot` executable itself.

use std::fs::{self, Permissions};
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::atomic::write_atomic;
use crate::update::{
    AppliedUpdate, ArtifactDigest, StagedUpdate, UpdateCheck, UpdateChecker, UpdateError,
    UpdateStatus,
};

use super::{place_elevated, OpsContext, OpsError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelfInstallOutcome {
    AlreadyCurrent { digest: ArtifactDigest },
    Installed { path: PathBuf, digest: ArtifactDigest },
}

/// Copy `source` (normally the running executable) to the configured
/// `bin_path` with mode 0755.
pub fn self_install(ctx: &OpsContext, source: &Path) -> Result<SelfInstallOutcome, OpsError> {
    let target = &ctx.config.bin_path;
    let digest = ArtifactDigest::of_file(source).map_err(|e| OpsError::io(source, e))?;

    if target.is_file() {
        let current = ArtifactDigest::of_file(target).map_err(|e| OpsError::io(target, e))?;
        if current == digest {
            return Ok(SelfInstallOutcome::AlreadyCurrent { digest });
        }
    }

    let bytes = fs::read(source).map_err(|e| OpsError::io(source, e))?;
    match write_atomic(target, &bytes, executable_permissions()) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied && ctx.privilege.can_elevate() => {
            info!(target = %target.display(), "bin dir not writable, installing elevated");
            place_elevated(ctx, source, target, 0o755)?;
        }
        Err(e) => return Err(OpsError::io(target, e)),
    }

    info!(target = %target.display(), digest = digest.short(), "sbot installed");
    Ok(SelfInstallOutcome::Installed {
        path: target.clone(),
        digest,
    })
}

#[cfg(unix)]
fn executable_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn executable_permissions() -> Option<Permissions> {
    None
}

/// Compare the installed executable with the published one.
pub fn check_update(ctx: &OpsContext) -> UpdateStatus {
    UpdateChecker::new(ctx.fetcher).check(&ctx.config.update_url, &ctx.config.bin_path)
}

/// Like `check_update`, but keeps the fetched copy for `apply_update`.
pub fn stage_update(ctx: &OpsContext) -> Result<UpdateCheck, UpdateError> {
    UpdateChecker::new(ctx.fetcher).stage(&ctx.config.update_url, &ctx.config.bin_path)
}

/// Swap in a staged update, going through elevated commands when the
/// executable's directory is not writable and the host allows it.
pub fn apply_update(ctx: &OpsContext, staged: StagedUpdate) -> Result<AppliedUpdate, OpsError> {
    if !ctx.privilege.can_elevate() {
        return Ok(staged.apply()?);
    }
    staged.apply_or_else(|staged, mode| {
        info!(target = %staged.target().display(), "bin dir not writable, updating elevated");
        place_elevated(ctx, staged.staged_path(), staged.target(), mode)
    })
}
