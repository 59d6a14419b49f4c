//! Support bot installer
//!
//! Installs, configures and operates the containerised support bot on a
//! single host. The two pieces with real logic are the environment file
//! reconciler (`reconcile`) and the digest-based self-update check
//! (`update`); everything in `ops` is thin glue around docker, git and the
//! package manager.

pub mod atomic;
pub mod config;
pub mod host;
pub mod logging;
pub mod menu;
pub mod ops;
pub mod reconcile;
pub mod report;
pub mod update;

pub use config::{ConfigError, EffectiveConfig, InstallerConfig};
pub use host::{CommandRunner, Privilege, RecordingRunner, SystemRunner};
pub use ops::{OpsContext, OpsError};
pub use reconcile::{
    reconcile, OverrideKey, OverrideSet, ReconcileError, ReconcilePlan, ReconcileReport,
};
pub use update::{UpdateChecker, UpdateStatus};
