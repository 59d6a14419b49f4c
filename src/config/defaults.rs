//! Built-in installer defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Where the application repository is checked out
    pub install_dir: String,

    /// Git remote of the application
    pub repo_url: String,

    /// Branch to deploy (default: "main")
    pub branch: String,

    /// Remote reference copy of the `sbot` binary for self-update
    pub update_url: String,

    /// Where `sbot` installs itself on the search path
    pub bin_path: String,

    /// Template environment file, relative to install_dir
    pub env_template: String,

    /// Working environment file, relative to install_dir
    pub env_file: String,

    /// Compose file, relative to install_dir
    pub compose_file: String,

    /// HTTP fetch timeout in seconds (default: 60)
    pub fetch_timeout_seconds: u64,

    /// Docker convenience install script
    pub docker_install_script_url: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            install_dir: "/opt/support-bot".to_string(),
            repo_url: "https://github.com/example/support-bot.git".to_string(),
            branch: "main".to_string(),
            update_url: "https://github.com/example/support-bot/releases/latest/download/sbot"
                .to_string(),
            bin_path: "/usr/local/bin/sbot".to_string(),
            env_template: ".env.example".to_string(),
            env_file: ".env".to_string(),
            compose_file: "docker-compose.yml".to_string(),
            fetch_timeout_seconds: 60,
            docker_install_script_url: "https://get.docker.com".to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "install_dir": self.install_dir,
            "repo_url": self.repo_url,
            "branch": self.branch,
            "update_url": self.update_url,
            "bin_path": self.bin_path,
            "env": {
                "template": self.env_template,
                "file": self.env_file,
            },
            "compose_file": self.compose_file,
            "fetch_timeout_seconds": self.fetch_timeout_seconds,
            "docker_install_script_url": self.docker_install_script_url,
        })
    }
}
