use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::{ResolverOptions, DEFAULT_USER_AGENT};

/// Root configuration structure, deserialized from `.license-notices/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How license sources are queried.
    pub resolver: ResolverConfig,
    /// Where the notices are written.
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Follow redirects when fetching license, project and repository URLs.
    pub follow_redirects: bool,
    /// GitHub token used for the licenses and repository APIs.
    pub github_token: Option<String>,
    /// Overrides the default `User-Agent`.
    pub user_agent: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            timeout_secs: 10,
            follow_redirects: true,
            github_token: None,
            user_agent: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            path: PathBuf::from("third-party-notices.txt"),
        }
    }
}

impl ResolverConfig {
    pub fn to_options(&self) -> ResolverOptions {
        ResolverOptions {
            timeout: Duration::from_secs(self.timeout_secs),
            follow_redirects: self.follow_redirects,
            github_token: self.github_token.clone().filter(|t| !t.is_empty()),
            user_agent: self
                .user_agent
                .clone()
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override` — path passed via `--config`
/// 2. `<project_path>/.license-notices/config.toml`
/// 3. `~/.config/license-notices/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".license-notices").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-notices")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("parsing config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}
