//! Installer configuration
//!
//! Layers, lowest precedence first:
//! 1. Built-in defaults
//! 2. User config (~/.config/sbot/config.toml or --config)
//! 3. SBOT_* environment variables
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, EnvFiles, InstallerConfig, ENV_VARS,
};
pub use merge::{deep_merge, merge_layers, prune_nulls};
