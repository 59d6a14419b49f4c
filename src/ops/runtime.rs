//! Container runtime installation.

use std::io::Write;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::host::{CommandSpec, PackageManager};

use super::{OpsContext, OpsError};

/// What `install_runtime` had to do
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeReport {
    pub docker_installed: bool,
    pub git_installed: bool,
    pub daemon_enabled: bool,
}

/// Make sure docker and git are present and the docker daemon is enabled.
pub fn install_runtime(ctx: &OpsContext) -> Result<RuntimeReport, OpsError> {
    let mut report = RuntimeReport::default();

    if ctx.runner.exists("docker") {
        info!("docker already installed");
    } else {
        let script = fetch_install_script(ctx)?;
        info!(url = %ctx.config.docker_install_script_url, "running docker install script");
        ctx.runner
            .run(&CommandSpec::new("sh").path_arg(script.path()).elevated())?;
        report.docker_installed = true;
    }

    if !ctx.runner.exists("git") {
        let manager = PackageManager::detect(ctx.runner).ok_or(OpsError::NoPackageManager)?;
        info!(manager = %manager, "installing git");
        for command in manager.install_commands(&["git"]) {
            ctx.runner.run(&command)?;
        }
        report.git_installed = true;
    }

    if ctx.runner.exists("systemctl") {
        ctx.runner.run(
            &CommandSpec::new("systemctl")
                .args(["enable", "--now", "docker"])
                .elevated(),
        )?;
        report.daemon_enabled = true;
    }

    Ok(report)
}

fn fetch_install_script(ctx: &OpsContext) -> Result<NamedTempFile, OpsError> {
    let temp_dir = std::env::temp_dir();
    let mut script = NamedTempFile::new().map_err(|e| OpsError::io(&temp_dir, e))?;
    ctx.fetcher
        .fetch(&ctx.config.docker_install_script_url, script.as_file_mut())?;
    script
        .as_file_mut()
        .flush()
        .map_err(|e| OpsError::io(script.path(), e))?;
    Ok(script)
}
