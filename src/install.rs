// src/install.rs

//! Installation orchestrator
//!
//! Sequences one install call:
//!
//! 1. Classify the locator; keywords go to search and never touch the disk
//! 2. Plan the destination, reserve it and refuse an existing install
//! 3. Materialize the content (tree walk or single download + unpack)
//! 4. Flatten a wrapper directory, install dependencies, build
//! 5. Resolve the entry point and mark it executable
//! 6. Hand it to the host and wait for it to show up
//!
//! Pipeline errors never escape [`Installer::install`]; they end the
//! [`InstallationReport`] with an [`Outcome::Failed`] line instead.

use crate::archive;
use crate::build;
use crate::config::Config;
use crate::deps::{PackageEnvironment, resolve_dependencies};
use crate::entry::{self, CandidateTokens, resolve_entry_point};
use crate::error::{Error, Result};
use crate::fetch::TreeFetcher;
use crate::filesystem::{make_executable, visible_entries};
use crate::host::{self, Activation, Host};
use crate::locator::{self, FetchStrategy, InstallPlan, Locator};
use crate::lock::InstallLock;
use crate::process::CommandRunner;
use crate::remote::RemoteApi;
use crate::report::{InstallationReport, Outcome};
use crate::search::{SearchHit, search};
use crate::target::InstallationTarget;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use url::Url;

/// Per-call install switches
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Install a keyword's match when it is the only one
    pub auto_install: bool,
    /// Directory name under the plugins path instead of the derived one
    pub install_dir: Option<String>,
    /// Entry point file name, bypassing detection
    pub main_file: Option<String>,
    /// Stop after marking the entry point executable
    pub no_activate: bool,
}

/// The pipeline with its collaborators
pub struct Installer<'a> {
    config: &'a Config,
    remote: &'a dyn RemoteApi,
    env: &'a dyn PackageEnvironment,
    runner: &'a dyn CommandRunner,
    host: &'a dyn Host,
}

impl<'a> Installer<'a> {
    pub fn new(
        config: &'a Config,
        remote: &'a dyn RemoteApi,
        env: &'a dyn PackageEnvironment,
        runner: &'a dyn CommandRunner,
        host: &'a dyn Host,
    ) -> Self {
        Self {
            config,
            remote,
            env,
            runner,
            host,
        }
    }

    /// Search the configured repositories
    pub fn search(&self, keyword: &str) -> Result<Vec<SearchHit>> {
        search(self.remote, self.config, keyword)
    }

    /// Install whatever `locator` designates
    pub fn install(&self, locator: &str, options: &InstallOptions) -> InstallationReport {
        let report = InstallationReport::new();
        match Locator::parse(locator) {
            Locator::Keyword(keyword) => self.install_keyword(report, &keyword, options),
            Locator::Url(url) => {
                let mut report = report;
                let result = self.install_url(&mut report, &url, options);
                if let Some(target) = report.target.as_mut() {
                    if let Err(e) = target.refresh() {
                        warn!("Could not scan {}: {}", target.path.display(), e);
                    }
                }
                match result {
                    Ok(outcome) => report.finish(outcome),
                    Err(e) => {
                        warn!("Install of {} failed: {}", url, e);
                        report.fail(&e)
                    }
                }
            }
        }
    }

    fn install_keyword(
        &self,
        mut report: InstallationReport,
        keyword: &str,
        options: &InstallOptions,
    ) -> InstallationReport {
        report.line(format!(
            "'{keyword}' is not an http(s) URL, treating it as a search keyword"
        ));

        let hits = match self.search(keyword) {
            Ok(hits) => hits,
            Err(e) => return report.fail(&e),
        };
        let [first, rest @ ..] = hits.as_slice() else {
            report.line(format!("No known plugin was found matching '{keyword}'"));
            return report.finish(Outcome::NotFound);
        };

        if options.auto_install {
            if rest.is_empty() {
                report.line(format!("Installing the only match: {}", first.url_download));
                let nested = InstallOptions {
                    auto_install: false,
                    ..options.clone()
                };
                return report.absorb(self.install(&first.url_download, &nested));
            }
            report.line(format!(
                "Found {} plugins matching '{keyword}', not installing automatically",
                hits.len()
            ));
        }

        report.line(format!(
            "You can install {keyword} by running: `plugfetch install {}`",
            first.url_download
        ));
        if !rest.is_empty() {
            let others: Vec<&str> = rest.iter().map(|h| h.url_download.as_str()).collect();
            report.line(format!("You can also install it via: {}", others.join(", ")));
        }
        report.finish(Outcome::SearchResults { hits })
    }

    fn install_url(
        &self,
        report: &mut InstallationReport,
        url: &Url,
        options: &InstallOptions,
    ) -> Result<Outcome> {
        let plan = locator::plan(url, self.config, options.install_dir.as_deref())?;
        let target = self.config.plugins_path.join(&plan.install_dir);
        info!("Installing {} into {}", url, target.display());

        let _lock = InstallLock::try_acquire(&self.config.plugins_path, &plan.install_dir)?
            .ok_or_else(|| Error::InstallInProgress(target.clone()))?;
        ensure_vacant(&target, &plan.resource_name)?;

        report.target = Some(InstallationTarget::create(&target)?);
        report.line(format!("Created {} directory", target.display()));

        self.materialize(report, &plan, &target)?;

        entry::flatten(&target)?;
        let deps = resolve_dependencies(&target, self.env)?;
        for spec in &deps.installed {
            report.line(format!("Installed dependency {spec}"));
        }
        if let Some(strategy) = build::build(&target, self.runner)? {
            report.line(format!("Built plugin with `{strategy}`"));
        }

        let tokens = CandidateTokens::new(&plan.stem);
        let Some(entry_point) =
            resolve_entry_point(&target, &tokens, options.main_file.as_deref())?
        else {
            report.line("Could not find a main file, hence not making anything executable");
            return Ok(Outcome::NoEntryPoint);
        };
        let entry_point = absolute(&entry_point)?;
        make_executable(&entry_point)?;
        report.line(format!("Made {} executable", entry_point.display()));

        if options.no_activate {
            report.line("Activation skipped");
            return Ok(Outcome::Installed {
                entry_point,
                activation: None,
            });
        }

        let activation = host::activate(self.host, &entry_point, &self.config.host)?;
        match &activation {
            Activation::Started(name) => report.line(format!("Started {name}")),
            Activation::TimedOut(name) => {
                report.line(format!("Timeout while trying to start {name}"))
            }
        }
        Ok(Outcome::Installed {
            entry_point,
            activation: Some(activation),
        })
    }

    fn materialize(
        &self,
        report: &mut InstallationReport,
        plan: &InstallPlan,
        target: &Path,
    ) -> Result<()> {
        match &plan.strategy {
            FetchStrategy::Tree {
                tree_url,
                repo,
                folder,
            } => {
                let fetcher = TreeFetcher::new(self.remote, self.config.fetch_workers)?;
                let summary = fetcher.fetch(target, tree_url)?;
                report.line(format!(
                    "Downloaded {} files and {} directories from {} to {}",
                    summary.files,
                    summary.directories,
                    tree_url,
                    target.display()
                ));
                if summary.submodules > 0 {
                    report.line(format!(
                        "Fetched {} submodule(s) as whole repositories",
                        summary.submodules
                    ));
                }
                // The contents endpoint carries no modes; the git tree does
                let marked = fetcher.restore_executable_bits(target, repo, folder)?;
                if marked > 0 {
                    info!("Restored executable bit on {} files", marked);
                }
            }
            FetchStrategy::Direct { url } => {
                let dest = target.join(&plan.resource_name);
                self.remote.download(url, &dest)?;
                report.line(format!("Downloaded file from {} to {}", url, dest.display()));
                if archive::unpack(&dest, target)? {
                    report.line(format!(
                        "Extracted {} and removed the archive",
                        plan.resource_name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Refuse a destination that already holds an install
///
/// The primary path is checked first; any other visible content also
/// counts, since archives and tree walks never leave the primary path
/// behind.
fn ensure_vacant(target: &Path, resource_name: &str) -> Result<()> {
    let primary = target.join(resource_name);
    if primary.exists() {
        return Err(Error::AlreadyInstalled(primary));
    }
    if target.is_dir() && !visible_entries(target)?.is_empty() {
        return Err(Error::AlreadyInstalled(target.to_path_buf()));
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| Error::IoError(format!("Failed to resolve {}: {e}", path.display())))
}
