//! Interactive operator session
//!
//! A select loop over the lifecycle operations. Operation failures are
//! reported and the loop continues; only a broken terminal ends the session
//! early.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;

use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Password, Select};
use tracing::debug;

use crate::ops::{self, OpsContext, OpsError};
use crate::reconcile::{OverrideKey, OverrideSet};
use crate::report::{self, Message, Severity};
use crate::update::UpdateCheck;

/// Lines of history shown before following logs
pub const MENU_LOG_TAIL: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

/// Terminal questions, behind a trait so sessions can be scripted.
pub trait Prompter {
    /// Index of the chosen item; `None` when the operator backs out
    fn select(&self, prompt: &str, items: &[&str]) -> dialoguer::Result<Option<usize>>;
    /// Free text, empty allowed
    fn input(&self, prompt: &str) -> dialoguer::Result<String>;
    /// Hidden text, empty allowed
    fn secret(&self, prompt: &str) -> dialoguer::Result<String>;
    fn confirm(&self, prompt: &str) -> dialoguer::Result<bool>;
}

/// Prompts on the real terminal
pub struct TerminalPrompter {
    theme: ColorfulTheme,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn select(&self, prompt: &str, items: &[&str]) -> dialoguer::Result<Option<usize>> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_opt()
    }

    fn input(&self, prompt: &str) -> dialoguer::Result<String> {
        Input::<String>::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
    }

    fn secret(&self, prompt: &str) -> dialoguer::Result<String> {
        Password::with_theme(&self.theme)
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
    }

    fn confirm(&self, prompt: &str) -> dialoguer::Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
    }
}

/// Menu entries, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    InstallDocker,
    Deploy,
    Configure,
    Start,
    Stop,
    Restart,
    Logs,
    Status,
    CheckUpdate,
    InstallSelf,
    Uninstall,
    Exit,
}

impl MenuAction {
    pub const ALL: [MenuAction; 12] = [
        MenuAction::InstallDocker,
        MenuAction::Deploy,
        MenuAction::Configure,
        MenuAction::Start,
        MenuAction::Stop,
        MenuAction::Restart,
        MenuAction::Logs,
        MenuAction::Status,
        MenuAction::CheckUpdate,
        MenuAction::InstallSelf,
        MenuAction::Uninstall,
        MenuAction::Exit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::InstallDocker => "Install Docker",
            MenuAction::Deploy => "Deploy / update the bot",
            MenuAction::Configure => "Configure environment (.env)",
            MenuAction::Start => "Start",
            MenuAction::Stop => "Stop",
            MenuAction::Restart => "Restart",
            MenuAction::Logs => "Follow logs",
            MenuAction::Status => "Status",
            MenuAction::CheckUpdate => "Check for installer update",
            MenuAction::InstallSelf => "Install sbot to PATH",
            MenuAction::Uninstall => "Uninstall",
            MenuAction::Exit => "Exit",
        }
    }
}

/// Run the select loop until Exit or the operator backs out.
pub fn run(ctx: &OpsContext, prompter: &dyn Prompter) -> Result<(), MenuError> {
    let labels: Vec<&str> = MenuAction::ALL.iter().map(MenuAction::label).collect();

    loop {
        let action = match prompter.select("Support bot", &labels)? {
            Some(index) => MenuAction::ALL
                .get(index)
                .copied()
                .unwrap_or(MenuAction::Exit),
            None => MenuAction::Exit,
        };
        debug!(?action, "menu selection");
        if action == MenuAction::Exit {
            return Ok(());
        }

        match perform(ctx, prompter, action) {
            Ok(messages) => report::emit_all(&messages),
            Err(Outcome::Ops(e)) => report::error(e.to_string()),
            Err(Outcome::Prompt(e)) => return Err(MenuError::Prompt(e)),
        }
    }
}

/// Why an action stopped early
enum Outcome {
    Ops(OpsError),
    Prompt(dialoguer::Error),
}

impl From<OpsError> for Outcome {
    fn from(e: OpsError) -> Self {
        Outcome::Ops(e)
    }
}

impl From<dialoguer::Error> for Outcome {
    fn from(e: dialoguer::Error) -> Self {
        Outcome::Prompt(e)
    }
}

fn perform(
    ctx: &OpsContext,
    prompter: &dyn Prompter,
    action: MenuAction,
) -> Result<Vec<Message>, Outcome> {
    let messages = match action {
        MenuAction::InstallDocker => report::runtime(&ops::install_runtime(ctx)?),
        MenuAction::Deploy => vec![report::deploy(ops::deploy(ctx)?)],
        MenuAction::Configure => {
            let overrides = prompt_overrides(prompter)?;
            report::reconcile(&ops::configure(ctx, &overrides)?)
        }
        MenuAction::Start => {
            ops::start(ctx)?;
            vec![Message::new(Severity::Ok, "bot started")]
        }
        MenuAction::Stop => {
            ops::stop(ctx)?;
            vec![Message::new(Severity::Ok, "bot stopped")]
        }
        MenuAction::Restart => {
            ops::restart(ctx)?;
            vec![Message::new(Severity::Ok, "bot restarted")]
        }
        MenuAction::Logs => {
            ops::logs(ctx, MENU_LOG_TAIL)?;
            Vec::new()
        }
        MenuAction::Status => report::status(&ops::status(ctx)?),
        MenuAction::CheckUpdate => check_update(ctx, prompter)?,
        MenuAction::InstallSelf => {
            let source = std::env::current_exe()
                .map_err(|e| OpsError::io(std::path::Path::new("current executable"), e))?;
            vec![report::self_install(&ops::self_install(ctx, &source)?)]
        }
        MenuAction::Uninstall => uninstall(ctx, prompter)?,
        MenuAction::Exit => Vec::new(),
    };
    Ok(messages)
}

fn check_update(ctx: &OpsContext, prompter: &dyn Prompter) -> Result<Vec<Message>, Outcome> {
    let staged = match ops::stage_update(ctx).map_err(OpsError::from)? {
        UpdateCheck::UpToDate(digest) => {
            return Ok(vec![Message::new(
                Severity::Ok,
                format!("up to date ({})", digest.short()),
            )])
        }
        UpdateCheck::Available(staged) => staged,
    };

    let summary = format!(
        "update available: {} -> {}",
        staged.local_digest().short(),
        staged.remote_digest().short()
    );
    Message::new(Severity::Warn, summary).emit();
    if !prompter.confirm("Apply the update now?")? {
        return Ok(vec![Message::new(Severity::Info, "update skipped")]);
    }
    let applied = ops::apply_update(ctx, staged)?;
    Ok(vec![report::applied(&applied)])
}

fn uninstall(ctx: &OpsContext, prompter: &dyn Prompter) -> Result<Vec<Message>, Outcome> {
    if !prompter.confirm("Stop the bot and delete its containers and volumes?")? {
        return Ok(vec![Message::new(Severity::Info, "uninstall cancelled")]);
    }
    let prompt = format!("Also delete {}?", ctx.config.install_dir.display());
    let remove_files = prompter.confirm(&prompt)?;
    Ok(report::uninstall(&ops::uninstall(ctx, remove_files)?))
}

/// Ask for every override; empty answers leave the template value.
pub fn prompt_overrides(prompter: &dyn Prompter) -> dialoguer::Result<OverrideSet> {
    let mut overrides = OverrideSet::new();
    for key in OverrideKey::ALL {
        let answer = if key.is_secret() {
            prompter.secret(key.label())?
        } else {
            prompter.input(key.label())?
        };
        if !answer.trim().is_empty() {
            overrides.set(key, answer);
        }
    }
    Ok(overrides)
}

/// Replays canned answers; running out is an I/O error.
pub struct ScriptedPrompter {
    selections: RefCell<VecDeque<Option<usize>>>,
    answers: RefCell<VecDeque<String>>,
    confirmations: RefCell<VecDeque<bool>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self {
            selections: RefCell::new(VecDeque::new()),
            answers: RefCell::new(VecDeque::new()),
            confirmations: RefCell::new(VecDeque::new()),
        }
    }

    pub fn choose(self, action: MenuAction) -> Self {
        let index = MenuAction::ALL.iter().position(|a| *a == action);
        self.selections.borrow_mut().push_back(index);
        self
    }

    /// Next text or secret answer
    pub fn answer(self, text: &str) -> Self {
        self.answers.borrow_mut().push_back(text.to_string());
        self
    }

    pub fn confirm_with(self, yes: bool) -> Self {
        self.confirmations.borrow_mut().push_back(yes);
        self
    }
}

impl Default for ScriptedPrompter {
    fn default() -> Self {
        Self::new()
    }
}

fn exhausted(what: &str) -> dialoguer::Error {
    dialoguer::Error::IO(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("no scripted {} left", what),
    ))
}

impl Prompter for ScriptedPrompter {
    fn select(&self, _prompt: &str, _items: &[&str]) -> dialoguer::Result<Option<usize>> {
        self.selections
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| exhausted("selection"))
    }

    fn input(&self, _prompt: &str) -> dialoguer::Result<String> {
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| exhausted("answer"))
    }

    fn secret(&self, prompt: &str) -> dialoguer::Result<String> {
        self.input(prompt)
    }

    fn confirm(&self, _prompt: &str) -> dialoguer::Result<bool> {
        self.confirmations
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| exhausted("confirmation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Privilege, RecordingRunner};
    use crate::ops::test_support::{config_in, deployed};
    use crate::update::FileFetcher;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_labels_cover_every_action() {
        assert_eq!(MenuAction::ALL.last(), Some(&MenuAction::Exit));
        assert!(MenuAction::ALL.iter().all(|a| !a.label().is_empty()));
    }

    #[test]
    fn test_prompt_overrides_skips_blank_answers() {
        let mut prompter = ScriptedPrompter::new().answer("abc123").answer("");
        for _ in 2..OverrideKey::ALL.len() {
            prompter = prompter.answer("  ");
        }

        let overrides = prompt_overrides(&prompter).unwrap();
        assert_eq!(overrides.present_keys(), vec![OverrideKey::Token]);
        assert_eq!(overrides.get(OverrideKey::Token), Some("abc123"));
    }

    #[test]
    fn test_session_survives_operation_errors() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        let runner = RecordingRunner::new();
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Root,
            runner: &runner,
            fetcher: &FileFetcher,
        };
        // Start fails (nothing deployed), then the operator exits
        let prompter = ScriptedPrompter::new()
            .choose(MenuAction::Start)
            .choose(MenuAction::Exit);

        run(&ctx, &prompter).unwrap();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_configure_from_menu() {
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
        let mut prompter = ScriptedPrompter::new()
            .choose(MenuAction::Configure)
            .answer("abc123");
        for _ in 1..OverrideKey::ALL.len() {
            prompter = prompter.answer("");
        }
        let prompter = prompter.choose(MenuAction::Exit);

        run(&ctx, &prompter).unwrap();

        let written = fs::read_to_string(config.env_path()).unwrap();
        assert!(written.starts_with("BOT_TOKEN=abc123\n"));
    }

    #[test]
    fn test_uninstall_declined() {
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
        let prompter = ScriptedPrompter::new()
            .choose(MenuAction::Uninstall)
            .confirm_with(false)
            .choose(MenuAction::Exit);

        run(&ctx, &prompter).unwrap();
        assert!(runner.calls().is_empty());
        assert!(config.install_dir.exists());
    }

    #[test]
    fn test_running_out_of_script_is_an_error() {
        let root = TempDir::new().unwrap();
        let config = config_in(&root);
        let runner = RecordingRunner::new();
        let ctx = OpsContext {
            config: &config,
            privilege: Privilege::Root,
            runner: &runner,
            fetcher: &FileFetcher,
        };

        assert!(matches!(
            run(&ctx, &ScriptedPrompter::new()),
            Err(MenuError::Prompt(_))
        ));
    }
}
