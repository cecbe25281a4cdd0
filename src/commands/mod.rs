// src/commands/mod.rs
//! Command handlers for the plugfetch CLI

mod install;
mod search;

pub use install::cmd_install;
pub use search::cmd_search;

use crate::cli::Cli;
use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use indicatif::MultiProgress;
use plugfetch::{Config, HttpRemote};
use std::io::{self, IsTerminal};

/// Environment variable holding an API token for the listing API
const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Resolve the effective configuration from file, environment and flags
pub fn load_config(cli: &Cli) -> Result<Config> {
    Config::load(
        cli.config.as_deref(),
        std::env::var(plugfetch::config::PLUGINS_PATH_ENV).ok(),
        cli.plugins_path.clone(),
    )
    .context("Failed to load configuration")
}

/// HTTP client for the listing API, with spinners on an interactive stderr
pub fn remote_client(config: &Config, json: bool) -> Result<HttpRemote> {
    let remote = HttpRemote::new(config, std::env::var(TOKEN_ENV).ok())
        .context("Failed to set up HTTP client")?;
    if !json && io::stderr().is_terminal() {
        return Ok(remote.with_progress(MultiProgress::new()));
    }
    Ok(remote)
}

/// Print completions for `shell` to stdout
pub fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "plugfetch", &mut io::stdout());
    Ok(())
}
