// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: plugins directory override
fn plugins_path_arg() -> Arg {
    Arg::new("plugins_path")
        .long("plugins-path")
        .value_name("DIR")
        .global(true)
        .help("Directory plugins are installed under (overrides PLUGFETCH_PLUGINS_PATH)")
}

fn build_cli() -> Command {
    Command::new("plugfetch")
        .version(env!("CARGO_PKG_VERSION"))
        .author("plugfetch contributors")
        .about("Fetch, build and start third-party plugins from a URL or keyword")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Increase log verbosity (-v info, -vv debug)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file (TOML)"),
        )
        .arg(plugins_path_arg())
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Print the report as JSON"),
        )
        .subcommand(
            Command::new("install")
                .about("Install a plugin from a URL, or search when given a keyword")
                .arg(Arg::new("locator").required(true).help("http(s) URL or search keyword"))
                .arg(
                    Arg::new("auto")
                        .long("auto")
                        .action(ArgAction::SetTrue)
                        .help("Install a keyword's match when it is the only one"),
                )
                .arg(
                    Arg::new("install_dir")
                        .long("install-dir")
                        .value_name("NAME")
                        .help("Directory name under the plugins path"),
                )
                .arg(
                    Arg::new("main_file")
                        .long("main-file")
                        .value_name("FILE")
                        .help("Entry point file, bypassing detection"),
                )
                .arg(
                    Arg::new("no_activate")
                        .long("no-activate")
                        .action(ArgAction::SetTrue)
                        .help("Do not ask the host to start the plugin"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Search the configured plugin repositories")
                .arg(Arg::new("keyword").required(true).help("Substring to look for")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "zsh", "fish", "powershell", "elvish"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("plugfetch.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
