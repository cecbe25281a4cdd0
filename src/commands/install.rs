// src/commands/install.rs
//! `plugfetch install`

use super::remote_client;
use anyhow::{Context, Result};
use plugfetch::{
    CliHost, Config, InstallOptions, Installer, PipEnvironment, SystemRunner,
};
use tracing::info;

/// Install `locator` and print the report; returns the process exit code
pub fn cmd_install(
    config: &Config,
    locator: &str,
    options: &InstallOptions,
    json: bool,
) -> Result<i32> {
    info!("Installing {}", locator);

    let remote = remote_client(config, json)?;
    let runner = SystemRunner::new(config.command_timeout());
    let env = PipEnvironment::new(&runner, &config.python);
    let host = CliHost::new(&runner, &config.host);
    let installer = Installer::new(config, &remote, &env, &runner, &host);

    let report = installer.install(locator, options);
    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{rendered}");
    } else {
        print!("{report}");
    }

    Ok(report.exit_code())
}
