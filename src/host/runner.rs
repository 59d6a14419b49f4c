//! External command execution
//!
//! Abstracts process spawning for testability. Provides:
//! - `CommandRunner` trait: run a command, capture or inherit its output
//! - `SystemRunner`: real processes, wrapping elevated commands in `sudo`
//! - `RecordingRunner`: records commands and replays scripted results

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use tracing::debug;

use super::interrupt::AttachedChild;
use super::privilege::Privilege;

/// A command to run on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Needs root; run through `sudo` when not already root
    pub elevated: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            elevated: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    /// Program and arguments as one line, for messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Command execution errors
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` failed ({}){}", exit_label(.code), stderr_suffix(.stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` needs root; run as root or install sudo")]
    PrivilegeRequired { command: String },
}

impl RunError {
    /// Whether the command ended because of Ctrl-C (signal or exit 130)
    pub fn is_interrupted(&self) -> bool {
        matches!(self, RunError::Failed { code: None | Some(130), .. })
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Runs commands on the host
pub trait CommandRunner: Send + Sync {
    /// Run to completion with captured output. A non-zero exit is not an
    /// error here; see `run`.
    fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError>;

    /// Run attached to the terminal, failing on a non-zero exit
    fn interactive(&self, spec: &CommandSpec) -> Result<(), RunError>;

    /// Whether `program` resolves on PATH
    fn exists(&self, program: &str) -> bool;

    /// Run with captured output, failing on a non-zero exit
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
        let output = self.output(spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(RunError::Failed {
                command: spec.command_line(),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }
}

/// Spawns real processes
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    privilege: Privilege,
}

impl SystemRunner {
    pub fn new(privilege: Privilege) -> Self {
        Self { privilege }
    }

    fn build(&self, spec: &CommandSpec) -> Result<Command, RunError> {
        let mut cmd = match (spec.elevated, self.privilege) {
            (true, Privilege::Sudo) => {
                let mut cmd = Command::new("sudo");
                cmd.arg(&spec.program);
                cmd
            }
            (true, Privilege::Unavailable) => {
                return Err(RunError::PrivilegeRequired {
                    command: spec.command_line(),
                })
            }
            _ => Command::new(&spec.program),
        };
        cmd.args(&spec.args);
        if let Some(ref cwd) = spec.cwd {
            cmd.current_dir(cwd);
        }
        debug!(
            command = %spec.command_line(),
            elevated = spec.elevated,
            privilege = %self.privilege,
            "running"
        );
        Ok(cmd)
    }
}

impl CommandRunner for SystemRunner {
    fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
        let output = self
            .build(spec)?
            .stdin(Stdio::null())
            .output()
            .map_err(|source| RunError::Spawn {
                command: spec.command_line(),
                source,
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn interactive(&self, spec: &CommandSpec) -> Result<(), RunError> {
        let mut cmd = self.build(spec)?;
        let _attached = AttachedChild::enter();
        let status = cmd
            .status()
            .map_err(|source| RunError::Spawn {
                command: spec.command_line(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(RunError::Failed {
                command: spec.command_line(),
                code: status.code(),
                stderr: String::new(),
            })
        }
    }

    fn exists(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

/// In-process runner for tests.
///
/// Every command is recorded. Results come from rules matched by
/// command-line prefix (first rule wins); unmatched commands succeed with
/// empty output.
pub struct RecordingRunner {
    privilege: Privilege,
    programs: Mutex<HashSet<String>>,
    rules: Mutex<Vec<(String, CommandOutput)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl RecordingRunner {
    /// Runner acting as root with no programs on PATH
    pub fn new() -> Self {
        Self::with_privilege(Privilege::Root)
    }

    pub fn with_privilege(privilege: Privilege) -> Self {
        Self {
            privilege,
            programs: Mutex::new(HashSet::new()),
            rules: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Mark programs as present on PATH
    pub fn with_programs(self, programs: &[&str]) -> Self {
        if let Ok(mut known) = self.programs.lock() {
            known.extend(programs.iter().map(|p| p.to_string()));
        }
        self
    }

    /// Answer commands starting with `prefix` with `output`
    pub fn respond(self, prefix: &str, output: CommandOutput) -> Self {
        if let Ok(mut rules) = self.rules.lock() {
            rules.push((prefix.to_string(), output));
        }
        self
    }

    /// Commands received so far
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Command lines received so far
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::command_line).collect()
    }

    fn record(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        if spec.elevated && !self.privilege.can_elevate() {
            return Err(RunError::PrivilegeRequired {
                command: spec.command_line(),
            });
        }

        let line = spec.command_line();
        let scripted = self.rules.lock().ok().and_then(|rules| {
            rules
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix.as_str()))
                .map(|(_, output)| output.clone())
        });
        Ok(scripted.unwrap_or_else(|| CommandOutput::ok("")))
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for RecordingRunner {
    fn output(&self, spec: &CommandSpec) -> Result<CommandOutput, RunError> {
        self.record(spec)
    }

    fn interactive(&self, spec: &CommandSpec) -> Result<(), RunError> {
        let output = self.record(spec)?;
        if output.success() {
            Ok(())
        } else {
            Err(RunError::Failed {
                command: spec.command_line(),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }

    fn exists(&self, program: &str) -> bool {
        self.programs
            .lock()
            .map(|known| known.contains(program))
            .unwrap_or(false)
    }
}
