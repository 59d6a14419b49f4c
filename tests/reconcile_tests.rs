//! Environment File Reconciliation Tests
//!
//! End-to-end behaviour of `reconcile` against real files: template defaults,
//! override precedence, idempotence, value round-trips and backups.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sbot_deploy::reconcile::{
    list_backups, reconcile, reconcile_at, OverrideKey, OverrideSet, ReconcileError,
};
use tempfile::TempDir;

const TEMPLATE: &str = "\
# Bot credentials
BOT_TOKEN=changeme
BOT_DEV_ID=0
BOT_GROUP_ID=0

# Behaviour
BOT_DEFAULT_LANGUAGE=ru
BOT_LANGUAGE_PROMPT_ENABLED=true
BOT_REMINDERS_ENABLED=false
REDIS_PASSWORD=
";

struct Fixture {
    _dir: TempDir,
    template: PathBuf,
    working: PathBuf,
}

fn fixture(template: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let template_path = dir.path().join(".env.example");
    let working = dir.path().join(".env");
    fs::write(&template_path, template).unwrap();
    Fixture {
        _dir: dir,
        template: template_path,
        working,
    }
}

fn read_doc(path: &Path) -> sbot_envfile::EnvDocument {
    sbot_envfile::parse(&fs::read_to_string(path).unwrap())
}

fn at(hour: u32, min: u32, sec: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(hour, min, sec)
        .unwrap()
}

// =============================================================================
// Test 1: template keys keep defaults, overrides win
// =============================================================================

#[test]
fn test_template_defaults_and_overrides() {
    let cases: Vec<OverrideSet> = vec![
        OverrideSet::new(),
        OverrideSet::new().with(OverrideKey::Token, "abc123"),
        OverrideSet::new()
            .with(OverrideKey::DevId, "42")
            .with(OverrideKey::GroupId, "-1001234567890")
            .with(OverrideKey::DefaultLanguage, "en"),
        OverrideSet::new()
            .with(OverrideKey::EmojiId, "5368324170671202286")
            .with(OverrideKey::RedisPassword, "s3cret"),
    ];

    for overrides in cases {
        let fx = fixture(TEMPLATE);
        // Stale content that must not leak through
        fs::write(&fx.working, "BOT_TOKEN=stale\nBOT_DEV_ID=999\nOLD_KEY=1\n").unwrap();

        reconcile(&fx.template, &fx.working, &overrides).unwrap();

        let template = sbot_envfile::parse(TEMPLATE);
        let working = read_doc(&fx.working);
        let overridden: Vec<&str> = overrides
            .present_keys()
            .iter()
            .map(|k| k.env_key())
            .collect();

        for (key, value) in template.entries() {
            if !overridden.contains(&key) && key != "REDIS_PASSWORD" {
                assert_eq!(working.get(key), Some(value), "template default for {}", key);
            }
        }
        for key in overrides.present_keys() {
            assert_eq!(working.get(key.env_key()), overrides.get(key));
        }
        assert!(!working.contains_key("OLD_KEY"));
    }
}

// =============================================================================
// Test 2: idempotence
// =============================================================================

#[test]
fn test_second_run_same_content() {
    let fx = fixture(TEMPLATE);
    let overrides = OverrideSet::new()
        .with(OverrideKey::Token, "abc123")
        .with(OverrideKey::ResolvedEmojiId, "5237699328843200968")
        .with(OverrideKey::RedisPassword, "fixed-password");

    reconcile_at(&fx.template, &fx.working, &overrides, at(10, 0, 0)).unwrap();
    let first = fs::read_to_string(&fx.working).unwrap();
    reconcile_at(&fx.template, &fx.working, &overrides, at(10, 0, 5)).unwrap();
    let second = fs::read_to_string(&fx.working).unwrap();

    assert_eq!(first, second);
    assert_eq!(list_backups(&fx.working).unwrap().len(), 1);
}

#[test]
fn test_generated_credential_differs_between_runs() {
    let fx = fixture(TEMPLATE);

    reconcile(&fx.template, &fx.working, &OverrideSet::new()).unwrap();
    let first = read_doc(&fx.working).get("REDIS_PASSWORD").unwrap().to_string();
    reconcile(&fx.template, &fx.working, &OverrideSet::new()).unwrap();
    let second = read_doc(&fx.working).get("REDIS_PASSWORD").unwrap().to_string();

    assert_eq!(first.len(), 64);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_ne!(first, second);
}

// =============================================================================
// Test 3: special characters survive the write and re-parse
// =============================================================================

#[test]
fn test_special_characters_round_trip() {
    let values = [
        r"a/b&c\d",
        "key=value=more",
        "# not a comment",
        "  padded  inside  ",
        "$(rm -rf /) `id` ${HOME}",
        r#"'single' "double""#,
        "токен-🤖",
        "|^.*[]+?",
    ];

    for value in values {
        let fx = fixture(TEMPLATE);
        let overrides = OverrideSet::new()
            .with(OverrideKey::EmojiId, value)
            .with(OverrideKey::RedisPassword, value);

        reconcile(&fx.template, &fx.working, &overrides).unwrap();
        let working = read_doc(&fx.working);

        // Override values are trimmed before writing
        assert_eq!(working.get("BOT_EMOJI_ID"), Some(value.trim()));
        assert_eq!(working.get("REDIS_PASSWORD"), Some(value.trim()));
    }
}

#[test]
fn test_line_breaks_rejected_before_any_write() {
    let fx = fixture(TEMPLATE);
    fs::write(&fx.working, "BOT_TOKEN=previous\n").unwrap();
    let overrides = OverrideSet::new().with(OverrideKey::Token, "abc\nINJECTED=1");

    let err = reconcile(&fx.template, &fx.working, &overrides).unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::InvalidOverride {
            key: OverrideKey::Token,
            ..
        }
    ));
    assert_eq!(fs::read_to_string(&fx.working).unwrap(), "BOT_TOKEN=previous\n");
    assert!(list_backups(&fx.working).unwrap().is_empty());
}

// =============================================================================
// Test 4: documented scenarios
// =============================================================================

#[test]
fn test_scenario_token_only() {
    let fx = fixture("BOT_TOKEN=changeme\nBOT_DEV_ID=0\n");
    let overrides = OverrideSet::new().with(OverrideKey::Token, "abc123");

    let report = reconcile(&fx.template, &fx.working, &overrides).unwrap();

    let written = fs::read_to_string(&fx.working).unwrap();
    assert!(written.starts_with("BOT_TOKEN=abc123\nBOT_DEV_ID=0\n\nREDIS_PASSWORD="));
    assert_eq!(report.replaced, vec!["BOT_TOKEN"]);
    assert_eq!(report.appended, vec!["REDIS_PASSWORD"]);
    assert_eq!(report.generated, vec!["REDIS_PASSWORD"]);
    assert!(report.backup.is_none());
}

#[test]
fn test_missing_template() {
    let dir = TempDir::new().unwrap();
    let working = dir.path().join(".env");
    fs::write(&working, "BOT_TOKEN=keep\n").unwrap();

    let err = reconcile(&dir.path().join("missing.example"), &working, &OverrideSet::new())
        .unwrap_err();

    assert!(matches!(err, ReconcileError::MissingTemplate(_)));
    assert_eq!(fs::read_to_string(&working).unwrap(), "BOT_TOKEN=keep\n");
    assert!(list_backups(&working).unwrap().is_empty());
}

#[test]
fn test_backup_holds_previous_content() {
    let fx = fixture(TEMPLATE);
    fs::write(&fx.working, "BOT_TOKEN=old-run\n").unwrap();

    let report = reconcile_at(&fx.template, &fx.working, &OverrideSet::new(), at(9, 30, 15))
        .unwrap();

    let backup = report.backup.unwrap();
    assert!(backup
        .to_string_lossy()
        .ends_with(".env.bak_20250314_093015"));
    assert_eq!(fs::read_to_string(&backup).unwrap(), "BOT_TOKEN=old-run\n");
}

#[test]
fn test_lenient_flags_reported() {
    let fx = fixture(TEMPLATE);
    let overrides = OverrideSet::new()
        .with(OverrideKey::LanguagePromptEnabled, "Yes")
        .with(OverrideKey::RemindersEnabled, "sometimes");

    let report = reconcile(&fx.template, &fx.working, &overrides).unwrap();
    let working = read_doc(&fx.working);

    assert_eq!(working.get("BOT_LANGUAGE_PROMPT_ENABLED"), Some("true"));
    assert_eq!(working.get("BOT_REMINDERS_ENABLED"), Some("sometimes"));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("BOT_REMINDERS_ENABLED"));
}

#[test]
fn test_comments_and_layout_preserved() {
    let fx = fixture(TEMPLATE);
    let overrides = OverrideSet::new().with(OverrideKey::RedisPassword, "pw");

    reconcile(&fx.template, &fx.working, &overrides).unwrap();

    let expected = TEMPLATE.replace("REDIS_PASSWORD=\n", "REDIS_PASSWORD=pw\n");
    assert_eq!(fs::read_to_string(&fx.working).unwrap(), expected);
}
