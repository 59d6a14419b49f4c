//! System package manager detection.

use std::fmt;

use super::runner::{CommandRunner, CommandSpec};

/// Package managers the installer knows how to drive, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Apk,
    Zypper,
}

impl PackageManager {
    pub const ALL: [PackageManager; 6] = [
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Yum,
        PackageManager::Pacman,
        PackageManager::Apk,
        PackageManager::Zypper,
    ];

    /// The executable probed for
    pub fn binary(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Pacman => "pacman",
            PackageManager::Apk => "apk",
            PackageManager::Zypper => "zypper",
        }
    }

    /// First manager present on the host
    pub fn detect(runner: &dyn CommandRunner) -> Option<Self> {
        Self::ALL.into_iter().find(|pm| runner.exists(pm.binary()))
    }

    /// Elevated, non-interactive commands that install `packages`
    pub fn install_commands(&self, packages: &[&str]) -> Vec<CommandSpec> {
        let packages = packages.iter().copied();
        let install = match self {
            PackageManager::Apt => {
                return vec![
                    CommandSpec::new("apt-get").arg("update").elevated(),
                    CommandSpec::new("apt-get")
                        .args(["install", "-y"])
                        .args(packages)
                        .elevated(),
                ]
            }
            PackageManager::Dnf | PackageManager::Yum => {
                CommandSpec::new(self.binary()).args(["install", "-y"])
            }
            PackageManager::Pacman => CommandSpec::new("pacman").args(["-Sy", "--noconfirm"]),
            PackageManager::Apk => CommandSpec::new("apk").args(["add", "--no-cache"]),
            PackageManager::Zypper => {
                CommandSpec::new("zypper").args(["--non-interactive", "install"])
            }
        };
        vec![install.args(packages).elevated()]
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}
