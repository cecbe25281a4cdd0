// src/config.rs

//! Runtime configuration
//!
//! A [`Config`] is built once at startup and passed by reference into every
//! pipeline call. Values come from built-in defaults, an optional TOML file,
//! the `PLUGFETCH_PLUGINS_PATH` environment variable and finally the
//! `--plugins-path` command-line option.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable overriding the plugins directory
pub const PLUGINS_PATH_ENV: &str = "PLUGFETCH_PLUGINS_PATH";

/// Repositories queried by `search`, in query order
pub const DEFAULT_SEARCH_REPOS: &[&str] = &[
    "lightningd/plugins",
    "conscott/c-lightning-plugins",
    "renepickhardt/c-lightning-plugin-collection",
];

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base directory that receives one subdirectory per installed plugin
    pub plugins_path: PathBuf,
    /// `owner/repo` slugs searched for keywords
    pub search_repos: Vec<String>,
    /// Branch appended to hosting-site URLs that carry no ref
    pub default_branch: String,
    /// Base URL of the listing API
    pub api_base: String,
    /// Hostname of the repository hosting site
    pub hosting_host: String,
    /// Base URL serving raw file contents
    pub raw_base: String,
    /// Worker threads for sibling downloads
    pub fetch_workers: usize,
    pub http_timeout_secs: u64,
    pub http_retries: u32,
    /// Deadline for each installer / compiler subprocess
    pub command_timeout_secs: u64,
    /// Python interpreter used for dependency checks and `pip`
    pub python: String,
    pub host: HostConfig,
}

/// How to reach the host process that runs plugins
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Program and leading arguments of the host control CLI
    pub command: Vec<String>,
    /// Pause after `start` before the first status poll
    pub settle_delay_ms: u64,
    /// Give up waiting for the plugin to appear after this long
    pub activation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        let plugins_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("plugfetch")
            .join("plugins");

        Self {
            plugins_path,
            search_repos: DEFAULT_SEARCH_REPOS.iter().map(|s| s.to_string()).collect(),
            default_branch: "master".to_string(),
            api_base: "https://api.github.com".to_string(),
            hosting_host: "github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            fetch_workers: 4,
            http_timeout_secs: 30,
            http_retries: 3,
            command_timeout_secs: 600,
            python: "python3".to_string(),
            host: HostConfig::default(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            command: vec!["lightning-cli".to_string()],
            settle_delay_ms: 1000,
            activation_timeout_secs: 10,
            poll_interval_ms: 250,
        }
    }
}

impl Config {
    /// Default location of the config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("plugfetch").join("config.toml"))
    }

    /// Parse a config from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve the effective configuration
    ///
    /// `explicit` is a `--config` path (must exist); without it the default
    /// path is used when present. `env_plugins_path` is the value of
    /// [`PLUGINS_PATH_ENV`] and `cli_plugins_path` the `--plugins-path` flag.
    pub fn load(
        explicit: Option<&Path>,
        env_plugins_path: Option<String>,
        cli_plugins_path: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => {
                    debug!("Loading config from {}", path.display());
                    Self::from_file(&path)?
                }
                None => Self::default(),
            },
        };

        if let Some(path) = env_plugins_path.filter(|p| !p.trim().is_empty()) {
            config.plugins_path = PathBuf::from(path);
        }
        if let Some(path) = cli_plugins_path {
            config.plugins_path = path;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch_workers == 0 {
            return Err(Error::Config("fetch_workers must be at least 1".to_string()));
        }
        if self.host.command.is_empty() || self.host.command[0].trim().is_empty() {
            return Err(Error::Config("host.command must name a program".to_string()));
        }
        if self.default_branch.trim().is_empty() {
            return Err(Error::Config("default_branch must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl HostConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn activation_timeout(&self) -> Duration {
        Duration::from_secs(self.activation_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
