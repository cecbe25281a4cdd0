// tests/common/mod.rs

//! Shared harness for the install pipeline integration tests.

#![allow(dead_code)]

use plugfetch::remote::{DEFAULT_REF, RemoteNode, RepoRef};
use plugfetch::testing::{FakeEnvironment, FakeHost, MemoryRemote, ScriptedRunner};
use plugfetch::{Config, InstallOptions, InstallationReport, Installer};
use std::path::PathBuf;
use tempfile::TempDir;

pub const PLUGINS_REPO: &str = "lightningd/plugins";

/// Contents-endpoint address of a folder in the default plugins repository
pub fn contents_url(folder: &str) -> String {
    format!("https://api.github.com/repos/{PLUGINS_REPO}/contents/{folder}")
}

/// The default plugins repository at the configured branch, as searched
pub fn plugins_repo() -> RepoRef {
    RepoRef::new("github.com", "lightningd", "plugins", "master")
}

/// The default plugins repository at whatever branch it serves by default,
/// as listed for contents URLs without a `ref`
pub fn plugins_head() -> RepoRef {
    RepoRef::new("github.com", "lightningd", "plugins", DEFAULT_REF)
}

/// Fakes for every external seam plus a scratch plugins directory.
///
/// Keep the harness alive for the duration of the test; dropping it removes
/// the temporary directory.
pub struct Harness {
    pub temp: TempDir,
    pub config: Config,
    pub remote: MemoryRemote,
    pub env: FakeEnvironment,
    pub runner: ScriptedRunner,
    pub host: FakeHost,
}

impl Harness {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config {
            plugins_path: temp.path().join("plugins"),
            search_repos: vec![PLUGINS_REPO.to_string()],
            fetch_workers: 2,
            ..Config::default()
        };
        config.host.settle_delay_ms = 0;
        config.host.activation_timeout_secs = 0;
        config.host.poll_interval_ms = 1;

        Self {
            temp,
            config,
            remote: MemoryRemote::new(),
            env: FakeEnvironment::new(),
            runner: ScriptedRunner::new(),
            host: FakeHost::new(),
        }
    }

    /// Serve `files` as the folder `folder` of the plugins repository
    ///
    /// Registers both the walkable contents tree and the recursive git tree
    /// carrying the executable bits.
    pub fn serve_folder(&mut self, folder: &str, files: &[(&str, &[u8], bool)]) -> String {
        let root = contents_url(folder);
        self.remote.add_walkable_tree(&root, files);
        let nodes = files
            .iter()
            .map(|(path, _, executable)| {
                RemoteNode::file(&format!("{folder}/{path}"), "unused", *executable)
            })
            .collect();
        self.remote.add_tree(&plugins_head(), nodes);
        root
    }

    pub fn installer(&self) -> Installer<'_> {
        Installer::new(
            &self.config,
            &self.remote,
            &self.env,
            &self.runner,
            &self.host,
        )
    }

    pub fn install(&self, locator: &str) -> InstallationReport {
        self.installer().install(locator, &InstallOptions::default())
    }

    pub fn install_with(&self, locator: &str, options: &InstallOptions) -> InstallationReport {
        self.installer().install(locator, options)
    }

    pub fn plugin_dir(&self, name: &str) -> PathBuf {
        self.config.plugins_path.join(name)
    }
}
