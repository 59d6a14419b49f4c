//! Application checkout and removal.

use std::fs;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::InstallerConfig;
use crate::host::CommandSpec;

use super::compose::Compose;
use super::{OpsContext, OpsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutcome {
    Cloned,
    Updated,
}

/// Whether the install dir holds a stack that compose can drive.
pub fn is_deployed(config: &InstallerConfig) -> bool {
    config.compose_path().is_file()
}

/// Clone the repository on first run, fast-forward it afterwards.
pub fn deploy(ctx: &OpsContext) -> Result<DeployOutcome, OpsError> {
    let config = ctx.config;
    let dir = &config.install_dir;

    if dir.join(".git").is_dir() {
        ctx.runner.run(
            &CommandSpec::new("git")
                .arg("-C")
                .path_arg(dir)
                .args(["pull", "--ff-only"])
                .elevated(),
        )?;
        info!(dir = %dir.display(), "repository updated");
        return Ok(DeployOutcome::Updated);
    }

    let occupied = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false);
    if occupied {
        return Err(OpsError::InstallDirOccupied(dir.clone()));
    }

    ctx.runner.run(
        &CommandSpec::new("git")
            .args([
                "clone",
                "--branch",
                config.branch.as_str(),
                config.repo_url.as_str(),
            ])
            .path_arg(dir)
            .elevated(),
    )?;
    info!(dir = %dir.display(), branch = %config.branch, "repository cloned");
    Ok(DeployOutcome::Cloned)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UninstallReport {
    pub stack_removed: bool,
    pub files_removed: bool,
}

/// Tear down containers and volumes, then optionally delete the checkout.
///
/// Compose failures are logged and tolerated so a half-removed install can
/// still be cleaned up.
pub fn uninstall(ctx: &OpsContext, remove_files: bool) -> Result<UninstallReport, OpsError> {
    let config = ctx.config;
    let dir = &config.install_dir;
    let mut report = UninstallReport::default();

    if is_deployed(config) {
        match Compose::detect(ctx) {
            Ok(compose) => {
                match ctx
                    .runner
                    .run(&compose.command(&["down", "--volumes", "--remove-orphans"]))
                {
                    Ok(_) => report.stack_removed = true,
                    Err(e) => warn!(error = %e, "compose down failed, continuing"),
                }
            }
            Err(e) => warn!(error = %e, "skipping container teardown"),
        }
    }

    if remove_files && dir.exists() {
        if !dir.is_absolute() || dir.parent().is_none() {
            return Err(OpsError::UnsafeRemoval(dir.clone()));
        }
        ctx.runner
            .run(&CommandSpec::new("rm").arg("-rf").path_arg(dir).elevated())?;
        report.files_removed = true;
        info!(dir = %dir.display(), "install directory removed");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{CommandOutput, Privilege, RecordingRunner, RunError};
    use crate::ops::test_support::{config_in, deployed};
    use crate::update::FileFetcher;
    use tempfile::TempDir;

    #[test]
    fn test_first_deploy_clones() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        let runner = RecordingRunner::new();
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Root,
            runner: &runner,
            fetcher: &FileFetcher,
        };

        assert_eq!(deploy(&ctx).unwrap(), DeployOutcome::Cloned);
        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "git clone --branch main {} {}",
                config.repo_url,
                config.install_dir.display()
            )]
        );
    }

    #[test]
    fn test_redeploy_pulls() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        deployed(&config);
        let runner = RecordingRunner::new();
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Root,
            runner: &runner,
            fetcher: &FileFetcher,
        };

        assert_eq!(deploy(&ctx).unwrap(), DeployOutcome::Updated);
        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "git -C {} pull --ff-only",
                config.install_dir.display()
            )]
        );
    }

    #[test]
    fn test_occupied_dir_refused() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        fs::create_dir_all(&config.install_dir).unwrap();
        fs::write(config.install_dir.join("notes.txt"), "keep").unwrap();
        let runner = RecordingRunner::new();
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Root,
            runner: &runner,
            fetcher: &FileFetcher,
        };

        assert!(matches!(deploy(&ctx), Err(OpsError::InstallDirOccupied(_))));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_uninstall_tolerates_compose_failure() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        deployed(&config);
        let runner = RecordingRunner::new()
            .with_programs(&["docker"])
            .respond("docker compose version", CommandOutput::ok("v2"))
            .respond("docker compose -f", CommandOutput::failed(1, "no such project"));
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Root,
            runner: &runner,
            fetcher: &FileFetcher,
        };

        let report = uninstall(&ctx, true).unwrap();

        assert!(!report.stack_removed);
        assert!(report.files_removed);
        let last = runner.command_lines().pop().unwrap();
        assert_eq!(last, format!("rm -rf {}", config.install_dir.display()));
    }

    #[test]
    fn test_uninstall_keep_files() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        deployed(&config);
        let runner = RecordingRunner::new()
            .with_programs(&["docker"])
            .respond("docker compose version", CommandOutput::ok("v2"));
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Root,
            runner: &runner,
            fetcher: &FileFetcher,
        };

        let report = uninstall(&ctx, false).unwrap();

        assert!(report.stack_removed);
        assert!(!report.files_removed);
        assert!(runner
            .command_lines()
            .iter()
            .any(|l| l.ends_with("down --volumes --remove-orphans")));
        assert!(config.install_dir.exists());
    }

    #[test]
    fn test_uninstall_without_privilege() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        fs::create_dir_all(&config.install_dir).unwrap();
        let runner = RecordingRunner::with_privilege(Privilege::Unavailable);
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Unavailable,
            runner: &runner,
            fetcher: &FileFetcher,
        };

        assert!(matches!(
            uninstall(&ctx, true),
            Err(OpsError::Run(RunError::PrivilegeRequired { .. }))
        ));
    }
}
