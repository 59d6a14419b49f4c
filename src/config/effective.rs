//! Effective installer configuration with provenance
//!
//! The merged configuration is computed once at startup and handed to every
//! operation by reference. Nothing mutates it afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::defaults::BuiltinDefaults;
use super::merge::{merge_layers, prune_nulls};

/// Environment variables read as the third configuration layer.
pub const ENV_VARS: &[(&str, &str)] = &[
    ("SBOT_INSTALL_DIR", "install_dir"),
    ("SBOT_REPO_URL", "repo_url"),
    ("SBOT_BRANCH", "branch"),
    ("SBOT_UPDATE_URL", "update_url"),
    ("SBOT_BIN_PATH", "bin_path"),
];

/// Upper bound for fetch_timeout_seconds
const MAX_FETCH_TIMEOUT_SECONDS: u64 = 3600;

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Env,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    /// Origin of this source
    pub origin: ConfigOrigin,

    /// File path (file layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (file layer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Environment variables that contributed (env layer only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

/// Environment file names inside the install directory (`[env]` table)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnvFiles {
    /// Shipped template (read-only input)
    pub template: String,
    /// Live file consumed by the application
    pub file: String,
}

/// The immutable configuration record every operation receives.
///
/// Unknown keys are rejected so a misspelt setting is not silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct InstallerConfig {
    pub install_dir: PathBuf,
    pub repo_url: String,
    pub branch: String,
    pub update_url: String,
    pub bin_path: PathBuf,
    pub env: EnvFiles,
    pub compose_file: String,
    pub fetch_timeout_seconds: u64,
    pub docker_install_script_url: String,
}

impl InstallerConfig {
    /// Template document path
    pub fn template_path(&self) -> PathBuf {
        self.install_dir.join(&self.env.template)
    }

    /// Working document path
    pub fn env_path(&self) -> PathBuf {
        self.install_dir.join(&self.env.file)
    }

    /// Compose file path
    pub fn compose_path(&self) -> PathBuf {
        self.install_dir.join(&self.compose_file)
    }

    /// Transport timeout for remote fetches
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

impl Default for InstallerConfig {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            install_dir: PathBuf::from(defaults.install_dir),
            repo_url: defaults.repo_url,
            branch: defaults.branch,
            update_url: defaults.update_url,
            bin_path: PathBuf::from(defaults.bin_path),
            env: EnvFiles {
                template: defaults.env_template,
                file: defaults.env_file,
            },
            compose_file: defaults.compose_file,
            fetch_timeout_seconds: defaults.fetch_timeout_seconds,
            docker_install_script_url: defaults.docker_install_script_url,
        }
    }
}

/// Effective configuration with full provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration
    pub config: InstallerConfig,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

impl EffectiveConfig {
    /// Build effective config from layers.
    ///
    /// A `file_path` that does not exist is skipped; callers that require an
    /// explicit file check for it first.
    pub fn build(
        file_path: Option<&Path>,
        env_vars: &[(String, String)],
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
            variables: Vec::new(),
        });

        // Layer 2: User config file
        if let Some(path) = file_path {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                    variables: Vec::new(),
                });
            }
        }

        // Layer 3: Environment variables
        let (env_layer, variables) = Self::env_layer(env_vars);
        if !variables.is_empty() {
            layers.push(env_layer);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Env,
                path: None,
                digest: None,
                variables,
            });
        }

        // Layer 4: CLI flags
        if let Some(cli) = cli_overrides.map(prune_nulls) {
            if cli.as_object().map_or(false, |m| !m.is_empty()) {
                layers.push(cli);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::Cli,
                    path: None,
                    digest: None,
                    variables: Vec::new(),
                });
            }
        }

        let merged = merge_layers(layers);
        let config: InstallerConfig = serde_json::from_value(merged)
            .map_err(|e| ConfigError::Parse(format!("invalid configuration: {}", e)))?;
        Self::validate(&config)?;

        Ok(Self {
            created_at: Utc::now(),
            config,
            sources,
        })
    }

    /// Default user config path (`$HOME/.config/sbot/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config/sbot/config.toml"))
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::Parse(format!("{}: invalid UTF-8: {}", path.display(), e)))?;
        let table: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

        // toml::Value serializes through serde, so the JSON form is lossless for
        // the string/integer/table shapes this file uses.
        let value = serde_json::to_value(table)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))?;

        Ok((value, digest))
    }

    /// Pick the recognised variables out of the process environment.
    fn env_layer(env_vars: &[(String, String)]) -> (Value, Vec<String>) {
        let mut map = serde_json::Map::new();
        let mut used = Vec::new();

        for (var, field) in ENV_VARS {
            let value = env_vars
                .iter()
                .find(|(name, _)| name == var)
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty());

            if let Some(value) = value {
                map.insert(field.to_string(), Value::String(value.to_string()));
                used.push(var.to_string());
            }
        }

        (Value::Object(map), used)
    }

    fn validate(config: &InstallerConfig) -> Result<(), ConfigError> {
        if config.install_dir.as_os_str().is_empty() || !config.install_dir.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "install_dir must be an absolute path, got '{}'",
                config.install_dir.display()
            )));
        }
        if config.bin_path.as_os_str().is_empty() || !config.bin_path.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "bin_path must be an absolute path, got '{}'",
                config.bin_path.display()
            )));
        }
        if config.repo_url.trim().is_empty() {
            return Err(ConfigError::Validation("repo_url cannot be empty".to_string()));
        }
        if config.branch.trim().is_empty() {
            return Err(ConfigError::Validation("branch cannot be empty".to_string()));
        }
        if config.env.template.is_empty() || config.env.file.is_empty() {
            return Err(ConfigError::Validation(
                "env.template and env.file cannot be empty".to_string(),
            ));
        }
        if config.env.template == config.env.file {
            return Err(ConfigError::Validation(
                "env.template and env.file must differ".to_string(),
            ));
        }
        if config.fetch_timeout_seconds == 0
            || config.fetch_timeout_seconds > MAX_FETCH_TIMEOUT_SECONDS
        {
            return Err(ConfigError::Validation(format!(
                "fetch_timeout_seconds must be in (0, {}]",
                MAX_FETCH_TIMEOUT_SECONDS
            )));
        }
        Ok(())
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary
    pub fn to_human(&self) -> String {
        let c = &self.config;
        let mut out = String::new();
        out.push_str(&format!("Install dir:     {}\n", c.install_dir.display()));
        out.push_str(&format!("Repository:      {} ({})\n", c.repo_url, c.branch));
        out.push_str(&format!("Env template:    {}\n", c.template_path().display()));
        out.push_str(&format!("Env file:        {}\n", c.env_path().display()));
        out.push_str(&format!("Compose file:    {}\n", c.compose_path().display()));
        out.push_str(&format!("Binary path:     {}\n", c.bin_path.display()));
        out.push_str(&format!("Update URL:      {}\n", c.update_url));
        out.push_str(&format!("Fetch timeout:   {}s\n", c.fetch_timeout_seconds));
        let origins: Vec<String> = self
            .sources
            .iter()
            .map(|s| match (&s.origin, &s.path) {
                (ConfigOrigin::File, Some(path)) => format!("file ({})", path),
                (ConfigOrigin::Env, _) => format!("env ({})", s.variables.join(", ")),
                (origin, _) => format!("{:?}", origin).to_lowercase(),
            })
            .collect();
        out.push_str(&format!("Sources:         {}", origins.join(" -> ")));
        out
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}
