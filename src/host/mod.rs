//! Host-Side Components
//!
//! Everything that touches the machine the bot is installed on:
//! privilege detection, external command execution, interrupt handling
//! and the system package manager.

pub mod interrupt;
pub mod packages;
pub mod privilege;
pub mod runner;

pub use packages::PackageManager;
pub use privilege::Privilege;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, RecordingRunner, RunError, SystemRunner};
