//! Lifecycle operations
//!
//! Thin glue between the installer configuration and the host: each
//! operation builds commands, runs them through the context's runner and
//! reports what happened. The two pieces with real logic live elsewhere
//! (`reconcile` and `update`).

mod compose;
mod configure;
mod deploy;
mod install;
mod runtime;

pub use compose::{logs, restart, start, status, stop, Compose, ComposeFlavor, StatusReport};
pub use configure::configure;
pub use deploy::{deploy, is_deployed, uninstall, DeployOutcome, UninstallReport};
pub use install::{apply_update, check_update, self_install, stage_update, SelfInstallOutcome};
pub use runtime::{install_runtime, RuntimeReport};

use std::io;
use std::path::{Path, PathBuf};

use crate::atomic::parent_dir;
use crate::config::InstallerConfig;
use crate::host::{CommandRunner, CommandSpec, Privilege, RunError};
use crate::reconcile::ReconcileError;
use crate::update::{FetchError, Fetcher, UpdateError};

/// Everything an operation may touch.
pub struct OpsContext<'a> {
    pub config: &'a InstallerConfig,
    /// Decides whether writes denied to this process are retried elevated
    pub privilege: Privilege,
    pub runner: &'a dyn CommandRunner,
    pub fetcher: &'a dyn Fetcher,
}

/// Operation errors
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Docker Compose is not available; install the compose plugin or docker-compose")]
    ComposeUnavailable,

    #[error("no application found in {0}; deploy it first")]
    NotDeployed(PathBuf),

    #[error("{0} exists and is not a git checkout")]
    InstallDirOccupied(PathBuf),

    #[error("no supported package manager found (tried apt-get, dnf, yum, pacman, apk, zypper)")]
    NoPackageManager,

    #[error("refusing to remove {0}")]
    UnsafeRemoval(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl OpsError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        OpsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Put `source` at `target` with `mode` using elevated commands.
///
/// The copy lands on a hidden sibling first and is then renamed over
/// `target`, so readers never see a partial file.
pub(crate) fn place_elevated(
    ctx: &OpsContext,
    source: &Path,
    target: &Path,
    mode: u32,
) -> Result<(), OpsError> {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let sibling = parent_dir(target).join(format!(".{}.sbot-new", name));
    let mode = format!("{:04o}", mode);

    ctx.runner.run(
        &CommandSpec::new("install")
            .args(["-m", mode.as_str()])
            .path_arg(source)
            .path_arg(&sibling)
            .elevated(),
    )?;
    ctx.runner.run(
        &CommandSpec::new("mv")
            .arg("-f")
            .path_arg(&sibling)
            .path_arg(target)
            .elevated(),
    )?;
    Ok(())
}
