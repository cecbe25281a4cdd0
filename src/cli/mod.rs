// src/cli/mod.rs
//! CLI definitions for plugfetch
//!
//! This module contains the command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "plugfetch")]
#[command(version)]
#[command(about = "Fetch, build and start third-party plugins", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: <config dir>/plugfetch/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory receiving one subdirectory per installed plugin
    #[arg(long, global = true, value_name = "DIR")]
    pub plugins_path: Option<PathBuf>,

    /// Print reports and search results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install a plugin from a URL, or look up a keyword
    Install {
        /// http(s) URL of a file, archive, repository or folder; anything
        /// else is treated as a search keyword
        locator: String,

        /// Install a keyword's match automatically when there is exactly one
        #[arg(long)]
        auto: bool,

        /// Name of the directory created under the plugins path
        #[arg(long, value_name = "NAME")]
        install_dir: Option<String>,

        /// File to run, bypassing entry-point detection
        #[arg(long, value_name = "NAME")]
        main_file: Option<String>,

        /// Do not ask the host to start the plugin
        #[arg(long)]
        no_activate: bool,
    },

    /// Search the known plugin repositories
    Search {
        /// Case-sensitive substring of the plugin path
        keyword: String,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
