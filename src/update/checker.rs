//! Self-update integrity check
//!
//! 1. Fetch the remote reference artifact into the system temp directory
//! 2. Require the local artifact to exist
//! 3. Hash both with SHA-256 and compare the full digests
//! 4. On mismatch, optionally copy the fetched file next to the local
//!    artifact and rename it over it, carrying over the local permission bits
//!
//! Checking only reads the artifact's directory. The fetched copy is removed
//! on every path that does not apply it.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::digest::ArtifactDigest;
use super::fetch::{DefaultFetcher, FetchError, Fetcher};
use crate::atomic::parent_dir;

/// Update check errors
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("local artifact not found: {0}")]
    LocalArtifactMissing(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl UpdateError {
    fn io(path: &Path, source: io::Error) -> Self {
        UpdateError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether the failure was a permission denial on the filesystem
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, UpdateError::Io { source, .. } if source.kind() == io::ErrorKind::PermissionDenied)
    }
}

/// Outcome of a check, reported rather than raised.
#[derive(Debug)]
pub enum UpdateStatus {
    UpToDate {
        digest: ArtifactDigest,
    },
    UpdateAvailable {
        local: ArtifactDigest,
        remote: ArtifactDigest,
    },
    Error(UpdateError),
}

impl UpdateStatus {
    /// One-line description for the operator
    pub fn describe(&self) -> String {
        match self {
            UpdateStatus::UpToDate { digest } => format!("up to date ({})", digest.short()),
            UpdateStatus::UpdateAvailable { local, remote } => format!(
                "update available: {} -> {}",
                local.short(),
                remote.short()
            ),
            UpdateStatus::Error(e) => format!("update check failed: {}", e),
        }
    }

    /// JSON form for scripting
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            UpdateStatus::UpToDate { digest } => serde_json::json!({
                "status": "up_to_date",
                "digest": digest,
            }),
            UpdateStatus::UpdateAvailable { local, remote } => serde_json::json!({
                "status": "update_available",
                "local": local,
                "remote": remote,
            }),
            UpdateStatus::Error(e) => serde_json::json!({
                "status": "error",
                "error": e.to_string(),
            }),
        }
    }
}

/// Result of `UpdateChecker::stage`
#[derive(Debug)]
pub enum UpdateCheck {
    UpToDate(ArtifactDigest),
    Available(StagedUpdate),
}

/// A fetched artifact that differs from the installed one.
///
/// Dropping it without calling `apply` deletes the fetched copy.
#[derive(Debug)]
pub struct StagedUpdate {
    target: PathBuf,
    local: ArtifactDigest,
    remote: ArtifactDigest,
    staged: NamedTempFile,
}

/// Digests before and after an applied update
#[derive(Debug, Clone, Serialize)]
pub struct AppliedUpdate {
    pub target: PathBuf,
    pub previous: ArtifactDigest,
    pub current: ArtifactDigest,
}

impl StagedUpdate {
    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn local_digest(&self) -> &ArtifactDigest {
        &self.local
    }

    pub fn remote_digest(&self) -> &ArtifactDigest {
        &self.remote
    }

    /// Fetched copy, outside the artifact's directory
    pub fn staged_path(&self) -> &Path {
        self.staged.path()
    }

    /// Permission bits of the installed artifact
    pub fn target_mode(&self) -> Result<u32, UpdateError> {
        let metadata = fs::metadata(&self.target)
            .map_err(|_| UpdateError::LocalArtifactMissing(self.target.clone()))?;
        Ok(mode_of(&metadata))
    }

    /// Replace the local artifact with the fetched one.
    ///
    /// The fetched bytes are copied to a temporary file next to the target,
    /// given the target's permissions, synced, then renamed over it, so the
    /// target is never empty or partial.
    pub fn apply(self) -> Result<AppliedUpdate, UpdateError> {
        self.place()?;
        self.finish()
    }

    /// Like `apply`, but hands the placement to `fallback` when the target's
    /// directory cannot be written. `fallback` gets the staged update and the
    /// mode the new file must carry.
    pub fn apply_or_else<E, G>(self, fallback: G) -> Result<AppliedUpdate, E>
    where
        E: From<UpdateError>,
        G: FnOnce(&StagedUpdate, u32) -> Result<(), E>,
    {
        match self.place() {
            Ok(()) => {}
            Err(e) if e.is_permission_denied() => {
                let mode = self.target_mode()?;
                debug!(target = %self.target.display(), "target not writable, using fallback");
                fallback(&self, mode)?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self.finish()?)
    }

    fn place(&self) -> Result<(), UpdateError> {
        let metadata = fs::metadata(&self.target)
            .map_err(|_| UpdateError::LocalArtifactMissing(self.target.clone()))?;
        let dir = parent_dir(&self.target);

        let mut replacement = NamedTempFile::new_in(dir).map_err(|e| UpdateError::io(dir, e))?;
        let mut source =
            fs::File::open(self.staged.path()).map_err(|e| UpdateError::io(self.staged.path(), e))?;
        io::copy(&mut source, replacement.as_file_mut())
            .map_err(|e| UpdateError::io(replacement.path(), e))?;
        fs::set_permissions(replacement.path(), metadata.permissions())
            .map_err(|e| UpdateError::io(replacement.path(), e))?;
        replacement
            .as_file()
            .sync_all()
            .map_err(|e| UpdateError::io(replacement.path(), e))?;

        replacement
            .persist(&self.target)
            .map_err(|e| UpdateError::io(&self.target, e.error))?;
        Ok(())
    }

    /// Rehash the target once the new bytes are in place.
    fn finish(self) -> Result<AppliedUpdate, UpdateError> {
        let target = self.target;
        let current = ArtifactDigest::of_file(&target).map_err(|e| UpdateError::io(&target, e))?;
        info!(
            target = %target.display(),
            from = self.local.short(),
            to = current.short(),
            "artifact updated"
        );

        Ok(AppliedUpdate {
            target,
            previous: self.local,
            current,
        })
    }
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_metadata: &fs::Metadata) -> u32 {
    0o755
}

/// Compares an installed artifact with a remote reference copy.
pub struct UpdateChecker<F: Fetcher = DefaultFetcher> {
    fetcher: F,
}

impl<F: Fetcher> UpdateChecker<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Check without keeping the fetched copy.
    pub fn check(&self, remote_url: &str, local: &Path) -> UpdateStatus {
        match self.stage(remote_url, local) {
            Ok(UpdateCheck::UpToDate(digest)) => UpdateStatus::UpToDate { digest },
            Ok(UpdateCheck::Available(staged)) => UpdateStatus::UpdateAvailable {
                local: staged.local.clone(),
                remote: staged.remote.clone(),
            },
            Err(e) => UpdateStatus::Error(e),
        }
    }

    /// Fetch and compare, keeping the fetched copy when it differs.
    pub fn stage(&self, remote_url: &str, local: &Path) -> Result<UpdateCheck, UpdateError> {
        let staging_dir = std::env::temp_dir();
        let mut staged = tempfile::Builder::new()
            .prefix("sbot-update-")
            .tempfile_in(&staging_dir)
            .map_err(|e| UpdateError::io(&staging_dir, e))?;

        let bytes = {
            let mut writer = BufWriter::new(staged.as_file_mut());
            let bytes = self.fetcher.fetch(remote_url, &mut writer)?;
            writer.flush().map_err(|e| UpdateError::io(&staging_dir, e))?;
            bytes
        };
        debug!(url = remote_url, bytes, "fetched reference artifact");

        if !local.is_file() {
            return Err(UpdateError::LocalArtifactMissing(local.to_path_buf()));
        }

        let remote =
            ArtifactDigest::of_file(staged.path()).map_err(|e| UpdateError::io(staged.path(), e))?;
        let local_digest = ArtifactDigest::of_file(local).map_err(|e| UpdateError::io(local, e))?;

        if remote == local_digest {
            debug!(digest = local_digest.short(), "artifact up to date");
            return Ok(UpdateCheck::UpToDate(local_digest));
        }

        info!(
            local = local_digest.short(),
            remote = remote.short(),
            "update available"
        );
        Ok(UpdateCheck::Available(StagedUpdate {
            target: local.to_path_buf(),
            local: local_digest,
            remote,
            staged,
        }))
    }
}

impl UpdateChecker<DefaultFetcher> {
    /// Checker using the scheme-dispatching fetcher
    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self::new(DefaultFetcher::new(timeout))
    }
}
