//! Environment file reconciliation
//!
//! Produces the working environment file from the shipped template plus the
//! operator's overrides:
//! 1. Validate every override value
//! 2. Parse the template (fails with MissingTemplate when absent)
//! 3. Apply overrides as replace-or-append on the parsed document
//! 4. Back up the existing working file, if any
//! 5. Write the result next to the working file and rename it into place
//!
//! Steps 1-3 produce a `ReconcilePlan` without touching the working
//! directory; `commit` performs 4-5. `commit_or_else` lets the caller take
//! over 4-5 when the directory is not writable by this process.
//!
//! Template keys that are not overridden always carry the template default,
//! never a value left over from an earlier run.

mod backup;
mod credential;
mod overrides;

pub use backup::{
    backup_path, create_backup, list_backups, next_backup_path, BACKUP_TIMESTAMP_FORMAT,
};
pub use credential::{generate_credential, CREDENTIAL_BYTES};
pub use overrides::{
    normalize, parse_flag, FlagValue, OverrideKey, OverrideSet, ValueKind, SUPPORTED_LANGUAGES,
};

use std::fs::{self, Permissions};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use sbot_envfile::{EnvFileError, SetOutcome};
use serde::Serialize;
use tracing::{info, warn};

use crate::atomic::write_atomic;

/// Reconciliation errors
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("template not found: {0}")]
    MissingTemplate(PathBuf),

    #[error("invalid value for {key}: {source}")]
    InvalidOverride {
        key: OverrideKey,
        #[source]
        source: EnvFileError,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ReconcileError {
    /// Whether backing up or writing was refused by the filesystem
    pub fn is_permission_denied(&self) -> bool {
        match self {
            ReconcileError::Backup { source, .. } | ReconcileError::Write { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

/// What a reconciliation run changed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Working file written
    pub working: PathBuf,
    /// Backup of the previous working file, when one existed
    pub backup: Option<PathBuf>,
    /// Env keys whose template line was rewritten
    pub replaced: Vec<String>,
    /// Env keys added because the template lacked them
    pub appended: Vec<String>,
    /// Env keys whose value was generated
    pub generated: Vec<String>,
    /// Values accepted despite looking wrong
    pub warnings: Vec<String>,
}

/// A value ready to be written.
struct Planned {
    key: OverrideKey,
    value: String,
    generated: bool,
}

/// Reconciled contents, validated but not yet written.
#[derive(Debug)]
pub struct ReconcilePlan {
    working: PathBuf,
    contents: String,
    permissions: Option<Permissions>,
    report: ReconcileReport,
}

impl ReconcilePlan {
    pub fn working(&self) -> &Path {
        &self.working
    }

    /// Full text of the new working file
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Mode for the new file: the previous file's, else owner-only
    pub fn mode(&self) -> u32 {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(ref perms) = self.permissions {
                return perms.mode() & 0o7777;
            }
        }
        0o600
    }

    /// Back up the previous working file and write the new one in place.
    pub fn commit(self, now: NaiveDateTime) -> Result<ReconcileReport, ReconcileError> {
        let backup = self.backup(now)?;
        self.write()?;
        Ok(self.finish(backup))
    }

    /// Like `commit`, but when the working directory refuses the backup or
    /// the write, `fallback` gets the plan and the backup path still to be
    /// created (if any) and must finish both.
    pub fn commit_or_else<E, G>(self, now: NaiveDateTime, fallback: G) -> Result<ReconcileReport, E>
    where
        E: From<ReconcileError>,
        G: FnOnce(&ReconcilePlan, Option<&Path>) -> Result<(), E>,
    {
        let mut backup = None;
        let direct = match self.backup(now) {
            Ok(made) => {
                backup = made;
                self.write()
            }
            Err(e) => Err(e),
        };

        match direct {
            Ok(()) => {}
            Err(e) if e.is_permission_denied() => {
                let pending = match backup {
                    None if self.working.exists() => Some(next_backup_path(&self.working, now)),
                    _ => None,
                };
                fallback(&self, pending.as_deref())?;
                if pending.is_some() {
                    backup = pending;
                }
            }
            Err(e) => return Err(e.into()),
        }
        Ok(self.finish(backup))
    }

    fn backup(&self, now: NaiveDateTime) -> Result<Option<PathBuf>, ReconcileError> {
        if !self.working.exists() {
            return Ok(None);
        }
        let backup = create_backup(&self.working, now).map_err(|source| ReconcileError::Backup {
            path: self.working.clone(),
            source,
        })?;
        info!(backup = %backup.display(), "backed up working environment file");
        Ok(Some(backup))
    }

    fn write(&self) -> Result<(), ReconcileError> {
        write_atomic(&self.working, self.contents.as_bytes(), self.permissions.clone()).map_err(
            |source| ReconcileError::Write {
                path: self.working.clone(),
                source,
            },
        )
    }

    fn finish(self, backup: Option<PathBuf>) -> ReconcileReport {
        let report = ReconcileReport {
            backup,
            ..self.report
        };
        info!(
            working = %report.working.display(),
            replaced = report.replaced.len(),
            appended = report.appended.len(),
            "environment file reconciled"
        );
        report
    }
}

/// Reconcile using the current local time for the backup name.
pub fn reconcile(
    template: &Path,
    working: &Path,
    overrides: &OverrideSet,
) -> Result<ReconcileReport, ReconcileError> {
    reconcile_at(template, working, overrides, Local::now().naive_local())
}

/// Reconcile with an explicit backup timestamp.
pub fn reconcile_at(
    template: &Path,
    working: &Path,
    overrides: &OverrideSet,
    now: NaiveDateTime,
) -> Result<ReconcileReport, ReconcileError> {
    plan(template, working, overrides)?.commit(now)
}

/// Validate overrides and build the new working file without writing it.
pub fn plan(
    template: &Path,
    working: &Path,
    overrides: &OverrideSet,
) -> Result<ReconcilePlan, ReconcileError> {
    let mut report = ReconcileReport {
        working: working.to_path_buf(),
        ..Default::default()
    };

    let steps = plan_overrides(overrides, &mut report.warnings)?;

    if !template.is_file() {
        return Err(ReconcileError::MissingTemplate(template.to_path_buf()));
    }
    let text = fs::read_to_string(template).map_err(|source| ReconcileError::Read {
        path: template.to_path_buf(),
        source,
    })?;
    let mut document = sbot_envfile::parse(&text);

    for planned in &steps {
        let env_key = planned.key.env_key();
        let outcome = document
            .set(env_key, &planned.value)
            .map_err(|source| ReconcileError::InvalidOverride {
                key: planned.key,
                source,
            })?;
        match outcome {
            SetOutcome::Replaced { .. } => report.replaced.push(env_key.to_string()),
            SetOutcome::Appended => report.appended.push(env_key.to_string()),
        }
        if planned.generated {
            report.generated.push(env_key.to_string());
        }
    }

    // Keep the previous file's mode (it usually holds secrets)
    let permissions = fs::metadata(working).ok().map(|m| m.permissions());

    Ok(ReconcilePlan {
        working: working.to_path_buf(),
        contents: document.to_string(),
        permissions,
        report,
    })
}

/// Resolve, normalise and validate every override before touching files.
fn plan_overrides(
    overrides: &OverrideSet,
    warnings: &mut Vec<String>,
) -> Result<Vec<Planned>, ReconcileError> {
    let mut plan = Vec::new();

    for key in OverrideKey::ALL {
        let (value, generated) = match overrides.get(key) {
            Some(raw) => {
                let (value, warning) = normalize(key, raw);
                if let Some(warning) = warning {
                    warn!("{}", warning);
                    warnings.push(warning);
                }
                (value, false)
            }
            None if key.kind() == ValueKind::GeneratedSecret => (generate_credential(), true),
            None => continue,
        };

        sbot_envfile::validate_value(key.env_key(), &value)
            .map_err(|source| ReconcileError::InvalidOverride { key, source })?;
        plan.push(Planned {
            key,
            value,
            generated,
        });
    }

    Ok(plan)
}
