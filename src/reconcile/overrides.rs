//! Operator-supplied override values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Languages the bot ships texts for.
pub const SUPPORTED_LANGUAGES: &[&str] = &["ru", "en"];

/// How an override value is interpreted before it is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Stored as given
    Text,
    /// Secret; stored as given, never echoed
    Secret,
    /// Chat/user id; warn when not an integer
    Integer,
    /// Language code; warn when unsupported
    Language,
    /// Yes/no text normalised to true/false
    Flag,
    /// Secret generated when absent
    GeneratedSecret,
}

/// The fixed set of logical override keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideKey {
    Token,
    DevId,
    GroupId,
    EmojiId,
    ActiveEmojiId,
    ResolvedEmojiId,
    DefaultLanguage,
    LanguagePromptEnabled,
    RemindersEnabled,
    SecurityFilterEnabled,
    RedisPassword,
}

impl OverrideKey {
    /// Every key, in prompt order.
    pub const ALL: [OverrideKey; 11] = [
        OverrideKey::Token,
        OverrideKey::DevId,
        OverrideKey::GroupId,
        OverrideKey::EmojiId,
        OverrideKey::ActiveEmojiId,
        OverrideKey::ResolvedEmojiId,
        OverrideKey::DefaultLanguage,
        OverrideKey::LanguagePromptEnabled,
        OverrideKey::RemindersEnabled,
        OverrideKey::SecurityFilterEnabled,
        OverrideKey::RedisPassword,
    ];

    /// Logical name
    pub fn as_str(&self) -> &'static str {
        match self {
            OverrideKey::Token => "TOKEN",
            OverrideKey::DevId => "DEV_ID",
            OverrideKey::GroupId => "GROUP_ID",
            OverrideKey::EmojiId => "EMOJI_ID",
            OverrideKey::ActiveEmojiId => "ACTIVE_EMOJI_ID",
            OverrideKey::ResolvedEmojiId => "RESOLVED_EMOJI_ID",
            OverrideKey::DefaultLanguage => "DEFAULT_LANGUAGE",
            OverrideKey::LanguagePromptEnabled => "LANGUAGE_PROMPT_ENABLED",
            OverrideKey::RemindersEnabled => "REMINDERS_ENABLED",
            OverrideKey::SecurityFilterEnabled => "SECURITY_FILTER_ENABLED",
            OverrideKey::RedisPassword => "REDIS_PASSWORD",
        }
    }

    /// Key as the application reads it from the environment file
    pub fn env_key(&self) -> &'static str {
        match self {
            OverrideKey::Token => "BOT_TOKEN",
            OverrideKey::DevId => "BOT_DEV_ID",
            OverrideKey::GroupId => "BOT_GROUP_ID",
            OverrideKey::EmojiId => "BOT_EMOJI_ID",
            OverrideKey::ActiveEmojiId => "BOT_ACTIVE_EMOJI_ID",
            OverrideKey::ResolvedEmojiId => "BOT_RESOLVED_EMOJI_ID",
            OverrideKey::DefaultLanguage => "BOT_DEFAULT_LANGUAGE",
            OverrideKey::LanguagePromptEnabled => "BOT_LANGUAGE_PROMPT_ENABLED",
            OverrideKey::RemindersEnabled => "BOT_REMINDERS_ENABLED",
            OverrideKey::SecurityFilterEnabled => "SECURITY_FILTER_ENABLED",
            OverrideKey::RedisPassword => "REDIS_PASSWORD",
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            OverrideKey::Token => ValueKind::Secret,
            OverrideKey::DevId | OverrideKey::GroupId => ValueKind::Integer,
            OverrideKey::EmojiId | OverrideKey::ActiveEmojiId | OverrideKey::ResolvedEmojiId => {
                ValueKind::Text
            }
            OverrideKey::DefaultLanguage => ValueKind::Language,
            OverrideKey::LanguagePromptEnabled
            | OverrideKey::RemindersEnabled
            | OverrideKey::SecurityFilterEnabled => ValueKind::Flag,
            OverrideKey::RedisPassword => ValueKind::GeneratedSecret,
        }
    }

    /// Short prompt label for interactive collection
    pub fn label(&self) -> &'static str {
        match self {
            OverrideKey::Token => "Bot token",
            OverrideKey::DevId => "Developer user id",
            OverrideKey::GroupId => "Support group chat id",
            OverrideKey::EmojiId => "Topic emoji id (new/unanswered)",
            OverrideKey::ActiveEmojiId => "Topic emoji id (answered)",
            OverrideKey::ResolvedEmojiId => "Topic emoji id (resolved)",
            OverrideKey::DefaultLanguage => "Default language (ru/en)",
            OverrideKey::LanguagePromptEnabled => "Ask users for language? (y/n)",
            OverrideKey::RemindersEnabled => "Enable reminders? (y/n)",
            OverrideKey::SecurityFilterEnabled => "Enable anti-spam filter? (y/n)",
            OverrideKey::RedisPassword => "Redis password (empty = generate)",
        }
    }

    pub fn is_secret(&self) -> bool {
        matches!(self.kind(), ValueKind::Secret | ValueKind::GeneratedSecret)
    }
}

impl fmt::Display for OverrideKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OverrideKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        OverrideKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted || k.env_key() == wanted)
            .ok_or_else(|| format!("unknown override key '{}'", s))
    }
}

/// Optional value per override key. Absent or blank means "leave as is".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideSet {
    pub token: Option<String>,
    pub dev_id: Option<String>,
    pub group_id: Option<String>,
    pub emoji_id: Option<String>,
    pub active_emoji_id: Option<String>,
    pub resolved_emoji_id: Option<String>,
    pub default_language: Option<String>,
    pub language_prompt_enabled: Option<String>,
    pub reminders_enabled: Option<String>,
    pub security_filter_enabled: Option<String>,
    pub redis_password: Option<String>,
}

impl OverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: OverrideKey) -> &Option<String> {
        match key {
            OverrideKey::Token => &self.token,
            OverrideKey::DevId => &self.dev_id,
            OverrideKey::GroupId => &self.group_id,
            OverrideKey::EmojiId => &self.emoji_id,
            OverrideKey::ActiveEmojiId => &self.active_emoji_id,
            OverrideKey::ResolvedEmojiId => &self.resolved_emoji_id,
            OverrideKey::DefaultLanguage => &self.default_language,
            OverrideKey::LanguagePromptEnabled => &self.language_prompt_enabled,
            OverrideKey::RemindersEnabled => &self.reminders_enabled,
            OverrideKey::SecurityFilterEnabled => &self.security_filter_enabled,
            OverrideKey::RedisPassword => &self.redis_password,
        }
    }

    fn slot_mut(&mut self, key: OverrideKey) -> &mut Option<String> {
        match key {
            OverrideKey::Token => &mut self.token,
            OverrideKey::DevId => &mut self.dev_id,
            OverrideKey::GroupId => &mut self.group_id,
            OverrideKey::EmojiId => &mut self.emoji_id,
            OverrideKey::ActiveEmojiId => &mut self.active_emoji_id,
            OverrideKey::ResolvedEmojiId => &mut self.resolved_emoji_id,
            OverrideKey::DefaultLanguage => &mut self.default_language,
            OverrideKey::LanguagePromptEnabled => &mut self.language_prompt_enabled,
            OverrideKey::RemindersEnabled => &mut self.reminders_enabled,
            OverrideKey::SecurityFilterEnabled => &mut self.security_filter_enabled,
            OverrideKey::RedisPassword => &mut self.redis_password,
        }
    }

    /// Trimmed value, `None` when absent or blank.
    pub fn get(&self, key: OverrideKey) -> Option<&str> {
        self.slot(key)
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Builder-style setter.
    pub fn with(mut self, key: OverrideKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: OverrideKey, value: impl Into<String>) {
        *self.slot_mut(key) = Some(value.into());
    }

    /// Keys with a usable value.
    pub fn present_keys(&self) -> Vec<OverrideKey> {
        OverrideKey::ALL
            .iter()
            .copied()
            .filter(|k| self.get(*k).is_some())
            .collect()
    }
}

impl fmt::Debug for OverrideSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for key in OverrideKey::ALL {
            if let Some(value) = self.get(key) {
                if key.is_secret() {
                    map.entry(&key.as_str(), &"[REDACTED]");
                } else {
                    map.entry(&key.as_str(), &value);
                }
            }
        }
        map.finish()
    }
}

/// Result of interpreting yes/no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlagValue {
    True,
    False,
    /// Unrecognised text, kept as typed
    Unrecognized(String),
}

impl FlagValue {
    pub fn as_str(&self) -> &str {
        match self {
            FlagValue::True => "true",
            FlagValue::False => "false",
            FlagValue::Unrecognized(raw) => raw,
        }
    }
}

/// Interpret free-form yes/no text.
pub fn parse_flag(raw: &str) -> FlagValue {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "y" | "yes" | "1" | "true" => FlagValue::True,
        "n" | "no" | "0" | "false" => FlagValue::False,
        _ => FlagValue::Unrecognized(trimmed.to_string()),
    }
}

/// Normalise a present override value, returning the text to store and an
/// optional warning. Unexpected input is stored as typed, never rejected.
pub fn normalize(key: OverrideKey, value: &str) -> (String, Option<String>) {
    match key.kind() {
        ValueKind::Flag => match parse_flag(value) {
            FlagValue::Unrecognized(raw) => {
                let warning = format!(
                    "{}: '{}' is not a yes/no value; stored as-is",
                    key.env_key(),
                    raw
                );
                (raw, Some(warning))
            }
            flag => (flag.as_str().to_string(), None),
        },
        ValueKind::Integer => {
            let warning = value.parse::<i64>().err().map(|_| {
                format!(
                    "{}: '{}' is not an integer; stored as-is",
                    key.env_key(),
                    value
                )
            });
            (value.to_string(), warning)
        }
        ValueKind::Language => {
            let warning = (!SUPPORTED_LANGUAGES.contains(&value)).then(|| {
                format!(
                    "{}: '{}' is not one of {}; the bot will fall back to its default",
                    key.env_key(),
                    value,
                    SUPPORTED_LANGUAGES.join(", ")
                )
            });
            (value.to_string(), warning)
        }
        ValueKind::Text | ValueKind::Secret | ValueKind::GeneratedSecret => {
            (value.to_string(), None)
        }
    }
}
