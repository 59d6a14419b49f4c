//! Privilege context for commands that need root.

use std::fmt;

use serde::Serialize;

/// How elevated commands can be run on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Already running as root
    Root,
    /// Not root, but `sudo` is on PATH
    Sudo,
    /// Neither; elevated commands will be refused
    Unavailable,
}

impl Privilege {
    /// Probe the effective uid and PATH.
    pub fn detect() -> Self {
        if effective_root() {
            Privilege::Root
        } else if which::which("sudo").is_ok() {
            Privilege::Sudo
        } else {
            Privilege::Unavailable
        }
    }

    pub fn is_root(&self) -> bool {
        matches!(self, Privilege::Root)
    }

    pub fn can_elevate(&self) -> bool {
        !matches!(self, Privilege::Unavailable)
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Privilege::Root => write!(f, "root"),
            Privilege::Sudo => write!(f, "sudo"),
            Privilege::Unavailable => write!(f, "unprivileged"),
        }
    }
}

#[cfg(unix)]
fn effective_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn effective_root() -> bool {
    false
}
