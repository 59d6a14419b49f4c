//! Container stack control through Docker Compose.

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::host::{CommandRunner, CommandSpec};

use super::deploy::is_deployed;
use super::{OpsContext, OpsError};

/// Which compose front-end is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposeFlavor {
    /// `docker compose` (v2 plugin)
    Plugin,
    /// `docker-compose` (standalone v1)
    Standalone,
}

/// Builds compose invocations for the deployed stack
#[derive(Debug, Clone)]
pub struct Compose {
    flavor: ComposeFlavor,
    compose_file: PathBuf,
    project_dir: PathBuf,
}

impl Compose {
    /// Probe for the plugin first, then the standalone binary.
    pub fn detect(ctx: &OpsContext) -> Result<Self, OpsError> {
        let flavor = detect_flavor(ctx.runner).ok_or(OpsError::ComposeUnavailable)?;
        debug!(?flavor, "compose detected");
        Ok(Self {
            flavor,
            compose_file: ctx.config.compose_path(),
            project_dir: ctx.config.install_dir.clone(),
        })
    }

    pub fn flavor(&self) -> ComposeFlavor {
        self.flavor
    }

    /// Elevated compose command against the stack's compose file
    pub fn command(&self, args: &[&str]) -> CommandSpec {
        let base = match self.flavor {
            ComposeFlavor::Plugin => CommandSpec::new("docker").arg("compose"),
            ComposeFlavor::Standalone => CommandSpec::new("docker-compose"),
        };
        base.arg("-f")
            .path_arg(&self.compose_file)
            .args(args.iter().copied())
            .cwd(&self.project_dir)
            .elevated()
    }
}

fn detect_flavor(runner: &dyn CommandRunner) -> Option<ComposeFlavor> {
    let plugin = CommandSpec::new("docker").args(["compose", "version"]);
    if runner.exists("docker") && matches!(runner.output(&plugin), Ok(out) if out.success()) {
        return Some(ComposeFlavor::Plugin);
    }
    if runner.exists("docker-compose") {
        return Some(ComposeFlavor::Standalone);
    }
    None
}

fn deployed_stack(ctx: &OpsContext) -> Result<Compose, OpsError> {
    if !is_deployed(ctx.config) {
        return Err(OpsError::NotDeployed(ctx.config.install_dir.clone()));
    }
    Compose::detect(ctx)
}

/// Build and start the stack in the background.
pub fn start(ctx: &OpsContext) -> Result<(), OpsError> {
    let compose = deployed_stack(ctx)?;
    ctx.runner.run(&compose.command(&["up", "-d", "--build"]))?;
    info!("stack started");
    Ok(())
}

pub fn stop(ctx: &OpsContext) -> Result<(), OpsError> {
    let compose = deployed_stack(ctx)?;
    ctx.runner.run(&compose.command(&["down"]))?;
    info!("stack stopped");
    Ok(())
}

pub fn restart(ctx: &OpsContext) -> Result<(), OpsError> {
    let compose = deployed_stack(ctx)?;
    ctx.runner.run(&compose.command(&["restart"]))?;
    info!("stack restarted");
    Ok(())
}

/// Follow container logs on the terminal until interrupted.
///
/// Ctrl-C ends the follow and returns normally.
pub fn logs(ctx: &OpsContext, tail: u32) -> Result<(), OpsError> {
    let compose = deployed_stack(ctx)?;
    let tail = tail.to_string();
    match ctx
        .runner
        .interactive(&compose.command(&["logs", "-f", "--tail", &tail]))
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_interrupted() => {
            debug!("log follow interrupted");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Deployment state plus the container listing
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub install_dir: PathBuf,
    pub deployed: bool,
    pub env_configured: bool,
    /// `ps` output; absent when nothing is deployed
    pub containers: Option<String>,
}

pub fn status(ctx: &OpsContext) -> Result<StatusReport, OpsError> {
    let config = ctx.config;
    let deployed = is_deployed(config);
    let containers = if deployed {
        let compose = Compose::detect(ctx)?;
        Some(ctx.runner.run(&compose.command(&["ps"]))?.stdout)
    } else {
        None
    };

    Ok(StatusReport {
        install_dir: config.install_dir.clone(),
        deployed,
        env_configured: config.env_path().is_file(),
        containers,
    })
}
