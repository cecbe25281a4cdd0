// src/main.rs

use anyhow::Result;
use clap::Parser;
use plugfetch::InstallOptions;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

/// Default log filter for a verbosity count; `RUST_LOG` wins when set
fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Install {
            locator,
            auto,
            install_dir,
            main_file,
            no_activate,
        } => {
            let config = commands::load_config(&cli)?;
            let options = InstallOptions {
                auto_install: *auto,
                install_dir: install_dir.clone(),
                main_file: main_file.clone(),
                no_activate: *no_activate,
            };
            let code = commands::cmd_install(&config, locator, &options, cli.json)?;
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Search { keyword } => {
            let config = commands::load_config(&cli)?;
            commands::cmd_search(&config, keyword, cli.json)
        }
        Commands::Completions { shell } => commands::cmd_completions(*shell),
    }
}
