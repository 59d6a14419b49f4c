//! Severity-marked operator messages.

use std::fmt;

use colored::{ColoredString, Colorize};

use crate::ops::{DeployOutcome, RuntimeReport, SelfInstallOutcome, StatusReport, UninstallReport};
use crate::reconcile::ReconcileReport;
use crate::update::{AppliedUpdate, UpdateStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Ok,
    Info,
    Warn,
    Error,
}

impl Severity {
    pub fn tag(&self) -> &'static str {
        match self {
            Severity::Ok => "[OK]",
            Severity::Info => "[INFO]",
            Severity::Warn => "[WARN]",
            Severity::Error => "[ERROR]",
        }
    }

    fn marker(&self) -> ColoredString {
        match self {
            Severity::Ok => self.tag().green().bold(),
            Severity::Info => self.tag().cyan(),
            Severity::Warn => self.tag().yellow().bold(),
            Severity::Error => self.tag().red().bold(),
        }
    }
}

/// One line of operator output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub severity: Severity,
    pub text: String,
}

impl Message {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }

    /// Print with a coloured marker; warnings and errors go to stderr.
    pub fn emit(&self) {
        match self.severity {
            Severity::Ok | Severity::Info => println!("{} {}", self.severity.marker(), self.text),
            Severity::Warn | Severity::Error => {
                eprintln!("{} {}", self.severity.marker(), self.text)
            }
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity.tag(), self.text)
    }
}

pub fn emit_all(messages: &[Message]) {
    for message in messages {
        message.emit();
    }
}

pub fn ok(text: impl Into<String>) {
    Message::new(Severity::Ok, text).emit();
}

pub fn info(text: impl Into<String>) {
    Message::new(Severity::Info, text).emit();
}

pub fn warn(text: impl Into<String>) {
    Message::new(Severity::Warn, text).emit();
}

pub fn error(text: impl Into<String>) {
    Message::new(Severity::Error, text).emit();
}

pub fn reconcile(report: &ReconcileReport) -> Vec<Message> {
    let mut out: Vec<Message> = report
        .warnings
        .iter()
        .map(|w| Message::new(Severity::Warn, w.clone()))
        .collect();
    if let Some(ref backup) = report.backup {
        out.push(Message::new(
            Severity::Info,
            format!("previous file saved as {}", backup.display()),
        ));
    }
    for key in &report.generated {
        out.push(Message::new(
            Severity::Info,
            format!("generated a new {}", key),
        ));
    }
    out.push(Message::new(
        Severity::Ok,
        format!(
            "wrote {} ({} replaced, {} appended)",
            report.working.display(),
            report.replaced.len(),
            report.appended.len()
        ),
    ));
    out
}

pub fn runtime(report: &RuntimeReport) -> Vec<Message> {
    let mut out = vec![if report.docker_installed {
        Message::new(Severity::Ok, "docker installed")
    } else {
        Message::new(Severity::Info, "docker already present")
    }];
    if report.git_installed {
        out.push(Message::new(Severity::Ok, "git installed"));
    }
    if report.daemon_enabled {
        out.push(Message::new(Severity::Ok, "docker service enabled"));
    }
    out
}

pub fn deploy(outcome: DeployOutcome) -> Message {
    match outcome {
        DeployOutcome::Cloned => Message::new(Severity::Ok, "repository cloned"),
        DeployOutcome::Updated => Message::new(Severity::Ok, "repository updated"),
    }
}

pub fn status(report: &StatusReport) -> Vec<Message> {
    let mut out = Vec::new();
    if !report.deployed {
        out.push(Message::new(
            Severity::Warn,
            format!("nothing deployed in {}", report.install_dir.display()),
        ));
        return out;
    }
    out.push(Message::new(
        Severity::Ok,
        format!("deployed in {}", report.install_dir.display()),
    ));
    if !report.env_configured {
        out.push(Message::new(Severity::Warn, "environment not configured yet"));
    }
    if let Some(ref containers) = report.containers {
        out.push(Message::new(Severity::Info, containers.trim_end().to_string()));
    }
    out
}

pub fn uninstall(report: &UninstallReport) -> Vec<Message> {
    let mut out = vec![if report.stack_removed {
        Message::new(Severity::Ok, "containers and volumes removed")
    } else {
        Message::new(Severity::Warn, "no containers were removed")
    }];
    if report.files_removed {
        out.push(Message::new(Severity::Ok, "install directory removed"));
    }
    out
}

pub fn self_install(outcome: &SelfInstallOutcome) -> Message {
    match outcome {
        SelfInstallOutcome::AlreadyCurrent { digest } => Message::new(
            Severity::Info,
            format!("already installed ({})", digest.short()),
        ),
        SelfInstallOutcome::Installed { path, digest } => Message::new(
            Severity::Ok,
            format!("installed {} ({})", path.display(), digest.short()),
        ),
    }
}

pub fn update_status(status: &UpdateStatus) -> Message {
    let severity = match status {
        UpdateStatus::UpToDate { .. } => Severity::Ok,
        UpdateStatus::UpdateAvailable { .. } => Severity::Warn,
        UpdateStatus::Error(_) => Severity::Error,
    };
    Message::new(severity, status.describe())
}

pub fn applied(update: &AppliedUpdate) -> Message {
    Message::new(
        Severity::Ok,
        format!(
            "updated {} ({} -> {})",
            update.target.display(),
            update.previous.short(),
            update.current.short()
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::ArtifactDigest;
    use std::path::PathBuf;

    #[test]
    fn test_plain_rendering() {
        let msg = Message::new(Severity::Warn, "check this");
        assert_eq!(msg.to_string(), "[WARN] check this");
    }

    #[test]
    fn test_reconcile_messages() {
        let report = ReconcileReport {
            working: PathBuf::from("/opt/support-bot/.env"),
            backup: Some(PathBuf::from("/opt/support-bot/.env.bak_20250101_120000")),
            replaced: vec!["BOT_TOKEN".into(), "REDIS_PASSWORD".into()],
            appended: vec![],
            generated: vec!["REDIS_PASSWORD".into()],
            warnings: vec!["BOT_DEV_ID: 'abc' is not an integer".into()],
        };

        let lines: Vec<String> = reconcile(&report).iter().map(|m| m.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "[WARN] BOT_DEV_ID: 'abc' is not an integer",
                "[INFO] previous file saved as /opt/support-bot/.env.bak_20250101_120000",
                "[INFO] generated a new REDIS_PASSWORD",
                "[OK] wrote /opt/support-bot/.env (2 replaced, 0 appended)",
            ]
        );
    }

    #[test]
    fn test_update_status_severity() {
        let status = UpdateStatus::UpToDate {
            digest: ArtifactDigest::of_bytes(b"x"),
        };
        assert_eq!(update_status(&status).severity, Severity::Ok);
    }

    #[test]
    fn test_status_not_deployed() {
        let report = StatusReport {
            install_dir: PathBuf::from("/opt/support-bot"),
            deployed: false,
            env_configured: false,
            containers: None,
        };
        let messages = status(&report);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Warn);
    }
}
