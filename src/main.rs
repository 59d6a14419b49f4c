//! Support bot installer CLI
//!
//! Entry point for the `sbot` command-line tool.

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use sbot_deploy::config::{ConfigError, EffectiveConfig};
use sbot_deploy::host::{interrupt, Privilege, SystemRunner};
use sbot_deploy::logging;
use sbot_deploy::menu::{self, Prompter, TerminalPrompter};
use sbot_deploy::ops::{self, OpsContext, OpsError};
use sbot_deploy::reconcile::{OverrideKey, OverrideSet, ValueKind};
use sbot_deploy::report;
use sbot_deploy::update::{DefaultFetcher, UpdateCheck, UpdateStatus};
use tracing::warn;

/// Exit codes
const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_UPDATE_AVAILABLE: i32 = 3;
const EXIT_UPDATE_CHECK_FAILED: i32 = 4;

#[derive(Parser)]
#[command(name = "sbot")]
#[command(about = "Install, configure and operate the support bot", version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalArgs {
    /// Installer config file (default: ~/.config/sbot/config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Directory holding the bot checkout
    #[arg(long, global = true)]
    install_dir: Option<PathBuf>,

    /// Git repository to deploy
    #[arg(long, global = true)]
    repo_url: Option<String>,

    /// Branch to deploy
    #[arg(long, global = true)]
    branch: Option<String>,

    /// URL of the published sbot executable
    #[arg(long, global = true)]
    update_url: Option<String>,

    /// Where sbot is installed on PATH
    #[arg(long, global = true)]
    bin_path: Option<PathBuf>,

    /// More diagnostic output (-v info, -vv debug)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default)
    Menu,

    /// Install docker and git, enable the docker service
    InstallDocker,

    /// Clone the bot repository, or fast-forward an existing checkout
    Deploy,

    /// Rebuild .env from the template plus the given values
    Configure(ConfigureArgs),

    /// Build and start the containers
    Start,

    /// Stop and remove the containers
    Stop,

    /// Restart the containers
    Restart,

    /// Follow container logs
    Logs {
        /// Lines of history to show first
        #[arg(long, default_value_t = 100)]
        tail: u32,
    },

    /// Show deployment and container state
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Remove containers, volumes and (unless kept) the checkout
    Uninstall {
        /// Do not ask for confirmation
        #[arg(long, short = 'y')]
        yes: bool,

        /// Keep the install directory
        #[arg(long)]
        keep_files: bool,
    },

    /// Copy this executable to the configured bin path
    InstallSelf,

    /// Compare the installed sbot with the published one
    SelfUpdate {
        /// Only report; exit 3 when an update is available
        #[arg(long)]
        check: bool,

        /// Apply without asking
        #[arg(long, short = 'y')]
        yes: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the effective installer configuration
    Config {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ConfigureArgs {
    /// Bot API token; give the flag without a value to be prompted
    #[arg(
        long,
        env = "SBOT_TOKEN",
        hide_env_values = true,
        num_args = 0..=1,
        default_missing_value = ""
    )]
    token: Option<String>,

    /// Developer user id
    #[arg(long)]
    dev_id: Option<String>,

    /// Support group chat id
    #[arg(long)]
    group_id: Option<String>,

    /// Topic emoji id for new tickets
    #[arg(long)]
    emoji_id: Option<String>,

    /// Topic emoji id for answered tickets
    #[arg(long)]
    active_emoji_id: Option<String>,

    /// Topic emoji id for resolved tickets
    #[arg(long)]
    resolved_emoji_id: Option<String>,

    /// Default language (ru, en)
    #[arg(long)]
    default_language: Option<String>,

    /// Ask users to pick a language (yes/no)
    #[arg(long)]
    language_prompt_enabled: Option<String>,

    /// Send reminders for unanswered tickets (yes/no)
    #[arg(long)]
    reminders_enabled: Option<String>,

    /// Enable the anti-spam filter (yes/no)
    #[arg(long)]
    security_filter_enabled: Option<String>,

    /// Redis password; generated when omitted, prompted for when the flag
    /// has no value
    #[arg(
        long,
        env = "SBOT_REDIS_PASSWORD",
        hide_env_values = true,
        num_args = 0..=1,
        default_missing_value = ""
    )]
    redis_password: Option<String>,
}

impl ConfigureArgs {
    /// Collect the given values. A secret flag given without a value is
    /// asked for through `prompter` so it never appears in the process list.
    fn into_overrides(self, prompter: &dyn Prompter) -> dialoguer::Result<OverrideSet> {
        let pairs = [
            (OverrideKey::Token, self.token),
            (OverrideKey::DevId, self.dev_id),
            (OverrideKey::GroupId, self.group_id),
            (OverrideKey::EmojiId, self.emoji_id),
            (OverrideKey::ActiveEmojiId, self.active_emoji_id),
            (OverrideKey::ResolvedEmojiId, self.resolved_emoji_id),
            (OverrideKey::DefaultLanguage, self.default_language),
            (OverrideKey::LanguagePromptEnabled, self.language_prompt_enabled),
            (OverrideKey::RemindersEnabled, self.reminders_enabled),
            (OverrideKey::SecurityFilterEnabled, self.security_filter_enabled),
            (OverrideKey::RedisPassword, self.redis_password),
        ];
        let mut overrides = OverrideSet::new();
        for (key, value) in pairs {
            let value = match value {
                Some(value) if value.is_empty() && is_secret(key) => prompter.secret(key.label())?,
                Some(value) => value,
                None => continue,
            };
            if !value.trim().is_empty() || !is_secret(key) {
                overrides.set(key, value);
            }
        }
        Ok(overrides)
    }
}

fn is_secret(key: OverrideKey) -> bool {
    matches!(key.kind(), ValueKind::Secret | ValueKind::GeneratedSecret)
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);
    if let Err(e) = interrupt::install() {
        warn!(error = %e, "could not install the interrupt handler");
    }

    let effective = match load_config(&cli.global) {
        Ok(effective) => effective,
        Err(e) => {
            report::error(format!("configuration error: {}", e));
            process::exit(EXIT_CONFIG);
        }
    };

    let privilege = Privilege::detect();
    let runner = SystemRunner::new(privilege);
    let fetcher = DefaultFetcher::new(effective.config.fetch_timeout());
    let ctx = OpsContext {
        config: &effective.config,
        privilege,
        runner: &runner,
        fetcher: &fetcher,
    };

    let code = match cli.command.unwrap_or(Commands::Menu) {
        Commands::Menu => run_menu(&ctx),
        Commands::InstallDocker => finish(ops::install_runtime(&ctx).map(|r| report::runtime(&r))),
        Commands::Deploy => finish(ops::deploy(&ctx).map(|o| vec![report::deploy(o)])),
        Commands::Configure(args) => match args.into_overrides(&TerminalPrompter::new()) {
            Ok(overrides) => {
                finish(ops::configure(&ctx, &overrides).map(|r| report::reconcile(&r)))
            }
            Err(e) => {
                report::error(e.to_string());
                EXIT_FAILURE
            }
        },
        Commands::Start => finish(ops::start(&ctx).map(|()| vec![ok("bot started")])),
        Commands::Stop => finish(ops::stop(&ctx).map(|()| vec![ok("bot stopped")])),
        Commands::Restart => finish(ops::restart(&ctx).map(|()| vec![ok("bot restarted")])),
        Commands::Logs { tail } => finish(ops::logs(&ctx, tail).map(|()| Vec::new())),
        Commands::Status { json } => run_status(&ctx, json),
        Commands::Uninstall { yes, keep_files } => run_uninstall(&ctx, yes, keep_files),
        Commands::InstallSelf => run_install_self(&ctx),
        Commands::SelfUpdate { check, yes, json } => run_self_update(&ctx, check, yes, json),
        Commands::Config { json } => run_config(&effective, json),
    };
    process::exit(code);
}

fn load_config(global: &GlobalArgs) -> Result<EffectiveConfig, ConfigError> {
    let file = match global.config {
        Some(ref path) if !path.exists() => return Err(ConfigError::NotFound(path.clone())),
        Some(ref path) => Some(path.clone()),
        None => EffectiveConfig::default_path(),
    };

    let env_vars: Vec<(String, String)> = std::env::vars().collect();
    let cli = serde_json::json!({
        "install_dir": global.install_dir,
        "repo_url": global.repo_url,
        "branch": global.branch,
        "update_url": global.update_url,
        "bin_path": global.bin_path,
    });

    EffectiveConfig::build(file.as_deref(), &env_vars, Some(cli))
}

fn ok(text: &str) -> report::Message {
    report::Message::new(report::Severity::Ok, text)
}

/// Print an operation's messages or its error, returning the exit code.
fn finish(result: Result<Vec<report::Message>, OpsError>) -> i32 {
    match result {
        Ok(messages) => {
            report::emit_all(&messages);
            EXIT_OK
        }
        Err(e) => {
            report::error(e.to_string());
            EXIT_FAILURE
        }
    }
}

fn run_menu(ctx: &OpsContext) -> i32 {
    match menu::run(ctx, &TerminalPrompter::new()) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            report::error(e.to_string());
            EXIT_FAILURE
        }
    }
}

fn run_status(ctx: &OpsContext, json: bool) -> i32 {
    let status = match ops::status(ctx) {
        Ok(status) => status,
        Err(e) => return finish(Err(e)),
    };
    if json {
        print_json(&status)
    } else {
        report::emit_all(&report::status(&status));
        EXIT_OK
    }
}

fn run_uninstall(ctx: &OpsContext, yes: bool, keep_files: bool) -> i32 {
    if !yes {
        let prompt = if keep_files {
            "Stop the bot and delete its containers and volumes?".to_string()
        } else {
            format!(
                "Stop the bot, delete its containers, volumes and {}?",
                ctx.config.install_dir.display()
            )
        };
        match confirm(&prompt) {
            Ok(true) => {}
            Ok(false) => {
                report::info("uninstall cancelled");
                return EXIT_OK;
            }
            Err(e) => {
                report::error(e.to_string());
                return EXIT_FAILURE;
            }
        }
    }
    finish(ops::uninstall(ctx, !keep_files).map(|r| report::uninstall(&r)))
}

fn run_install_self(ctx: &OpsContext) -> i32 {
    let source = match std::env::current_exe() {
        Ok(path) => path,
        Err(e) => {
            report::error(format!("cannot locate the running executable: {}", e));
            return EXIT_FAILURE;
        }
    };
    finish(ops::self_install(ctx, &source).map(|o| vec![report::self_install(&o)]))
}

fn run_self_update(ctx: &OpsContext, check: bool, yes: bool, json: bool) -> i32 {
    if check {
        let status = ops::check_update(ctx);
        if json {
            println!("{}", status.to_json());
        } else {
            report::update_status(&status).emit();
        }
        return match status {
            UpdateStatus::UpToDate { .. } => EXIT_OK,
            UpdateStatus::UpdateAvailable { .. } => EXIT_UPDATE_AVAILABLE,
            UpdateStatus::Error(_) => EXIT_UPDATE_CHECK_FAILED,
        };
    }

    let staged = match ops::stage_update(ctx) {
        Ok(UpdateCheck::UpToDate(digest)) => {
            let status = UpdateStatus::UpToDate { digest };
            if json {
                println!("{}", status.to_json());
            } else {
                report::update_status(&status).emit();
            }
            return EXIT_OK;
        }
        Ok(UpdateCheck::Available(staged)) => staged,
        Err(e) => {
            let status = UpdateStatus::Error(e);
            if json {
                println!("{}", status.to_json());
            } else {
                report::update_status(&status).emit();
            }
            return EXIT_UPDATE_CHECK_FAILED;
        }
    };

    if !json {
        report::warn(format!(
            "update available: {} -> {}",
            staged.local_digest().short(),
            staged.remote_digest().short()
        ));
    }
    if !yes {
        match confirm("Apply the update now?") {
            Ok(true) => {}
            Ok(false) => {
                report::info("update skipped");
                return EXIT_UPDATE_AVAILABLE;
            }
            Err(e) => {
                report::error(e.to_string());
                return EXIT_FAILURE;
            }
        }
    }

    match ops::apply_update(ctx, staged) {
        Ok(applied) if json => print_json(&applied),
        Ok(applied) => {
            report::applied(&applied).emit();
            EXIT_OK
        }
        Err(e) => {
            report::error(e.to_string());
            EXIT_FAILURE
        }
    }
}

fn run_config(effective: &EffectiveConfig, json: bool) -> i32 {
    if json {
        match effective.to_json() {
            Ok(out) => {
                println!("{}", out);
                EXIT_OK
            }
            Err(e) => {
                report::error(format!("error serializing output: {}", e));
                EXIT_FAILURE
            }
        }
    } else {
        println!("{}", effective.to_human());
        EXIT_OK
    }
}

fn confirm(prompt: &str) -> dialoguer::Result<bool> {
    TerminalPrompter::new().confirm(prompt)
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            EXIT_OK
        }
        Err(e) => {
            report::error(format!("error serializing output: {}", e));
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbot_deploy::menu::ScriptedPrompter;

    fn configure_args(argv: &[&str]) -> ConfigureArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Some(Commands::Configure(args)) => args,
            _ => panic!("expected the configure command"),
        }
    }

    #[test]
    fn test_secret_flag_without_value_prompts() {
        let args = configure_args(&["sbot", "configure", "--token", "--dev-id", "42"]);
        let prompter = ScriptedPrompter::new().answer("123:secret");

        let overrides = args.into_overrides(&prompter).unwrap();

        assert_eq!(overrides.get(OverrideKey::Token), Some("123:secret"));
        assert_eq!(overrides.get(OverrideKey::DevId), Some("42"));
        assert_eq!(overrides.get(OverrideKey::RedisPassword), None);
    }

    #[test]
    fn test_blank_prompted_password_is_generated_later() {
        let args = configure_args(&["sbot", "configure", "--redis-password"]);
        let prompter = ScriptedPrompter::new().answer("");

        let overrides = args.into_overrides(&prompter).unwrap();

        assert_eq!(overrides.get(OverrideKey::RedisPassword), None);
    }

    #[test]
    fn test_inline_values_need_no_prompt() {
        let args = configure_args(&["sbot", "configure", "--token", "abc", "--reminders-enabled", "no"]);
        // An empty script fails on any prompt
        let overrides = args.into_overrides(&ScriptedPrompter::new()).unwrap();

        assert_eq!(overrides.get(OverrideKey::Token), Some("abc"));
        assert_eq!(overrides.get(OverrideKey::RemindersEnabled), Some("no"));
    }
}
