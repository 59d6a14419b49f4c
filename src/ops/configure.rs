use std::io::Write;
use std::path::Path;

use chrono::Local;
use tracing::info;

use crate::host::CommandSpec;
use crate::reconcile::{self, OverrideSet, ReconcilePlan, ReconcileReport};

use super::{place_elevated, OpsContext, OpsError};

/// Rebuild the working env file from the template plus `overrides`.
///
/// A checkout cloned with elevated git is owned by root; when the backup or
/// the write is refused and the host can elevate, both go through the
/// runner instead.
pub fn configure(ctx: &OpsContext, overrides: &OverrideSet) -> Result<ReconcileReport, OpsError> {
    let config = ctx.config;
    let plan = reconcile::plan(&config.template_path(), &config.env_path(), overrides)?;
    let now = Local::now().naive_local();

    if !ctx.privilege.can_elevate() {
        return Ok(plan.commit(now)?);
    }
    plan.commit_or_else(now, |plan, backup| write_elevated(ctx, plan, backup))
}

fn write_elevated(
    ctx: &OpsContext,
    plan: &ReconcilePlan,
    backup: Option<&Path>,
) -> Result<(), OpsError> {
    info!(working = %plan.working().display(), "install dir not writable, writing elevated");
    if let Some(backup) = backup {
        ctx.runner.run(
            &CommandSpec::new("cp")
                .arg("-p")
                .path_arg(plan.working())
                .path_arg(backup)
                .elevated(),
        )?;
    }

    // Owner-only temp file outside the install dir
    let mut staged = tempfile::Builder::new()
        .prefix("sbot-env-")
        .tempfile()
        .map_err(|e| OpsError::io(&std::env::temp_dir(), e))?;
    staged
        .write_all(plan.contents().as_bytes())
        .and_then(|()| staged.flush())
        .map_err(|e| OpsError::io(staged.path(), e))?;

    place_elevated(ctx, staged.path(), plan.working(), plan.mode())
}
