// src/fetch.rs

//! Remote tree fetcher
//!
//! Reproduces a remote tree on local disk. Two algorithms live here:
//!
//! - **Tree walk** ([`TreeFetcher::fetch`]): list a tree address, download
//!   files, create directories and recurse. Sibling entries are handled on a
//!   bounded rayon pool; a directory is always created before any of its
//!   children are written.
//! - **Whole-repository fetch** ([`TreeFetcher::fetch_repository`]): used for
//!   submodules. One tarball download instead of a walk, with the archive's
//!   wrapper directory stripped and executable bits taken from a recursive
//!   tree listing. A submodule inside that listing is refused.

use crate::archive::{self, ArchiveKind};
use crate::error::{Error, Result};
use crate::filesystem::{make_executable, move_dir_contents, safe_join};
use crate::remote::{DEFAULT_REF, Listing, NodeKind, RemoteApi, RemoteNode, RepoRef};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Counts of what a fetch materialized
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchSummary {
    pub files: usize,
    pub directories: usize,
    pub executables: usize,
    pub submodules: usize,
}

impl FetchSummary {
    fn merge(self, other: Self) -> Self {
        Self {
            files: self.files + other.files,
            directories: self.directories + other.directories,
            executables: self.executables + other.executables,
            submodules: self.submodules + other.submodules,
        }
    }
}

/// Walks remote trees into local directories
pub struct TreeFetcher<'a> {
    api: &'a dyn RemoteApi,
    pool: ThreadPool,
}

impl<'a> TreeFetcher<'a> {
    /// Create a fetcher downloading with at most `workers` concurrent requests
    pub fn new(api: &'a dyn RemoteApi, workers: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("plugfetch-fetch-{i}"))
            .build()
            .map_err(|e| Error::Config(format!("Failed to start fetch workers: {e}")))?;
        Ok(Self { api, pool })
    }

    /// Reproduce the tree at `tree_url` under `target`
    ///
    /// If the address itself resolves to a submodule, the whole referenced
    /// repository is fetched into `target` instead.
    pub fn fetch(&self, target: &Path, tree_url: &str) -> Result<FetchSummary> {
        info!("Fetching tree {} into {}", tree_url, target.display());
        fs::create_dir_all(target)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", target.display())))?;
        self.pool.install(|| self.walk(target, tree_url))
    }

    fn walk(&self, target: &Path, tree_url: &str) -> Result<FetchSummary> {
        let nodes = match self.api.list(tree_url)? {
            Listing::Children(nodes) => nodes,
            Listing::Indirect { git_url } => {
                debug!("{} is a submodule of {}", tree_url, git_url);
                return self.fetch_repository(target, &git_url);
            }
        };

        nodes
            .par_iter()
            .filter(|node| {
                if node.is_hidden() {
                    debug!("Skipping hidden entry {}", node.path);
                    return false;
                }
                true
            })
            .map(|node| self.materialize(target, node))
            .try_reduce(FetchSummary::default, |a, b| Ok(a.merge(b)))
    }

    fn materialize(&self, target: &Path, node: &RemoteNode) -> Result<FetchSummary> {
        let dest = safe_join(target, &node.path)?;

        match &node.kind {
            NodeKind::File {
                download_url,
                executable,
            } => {
                self.api.download(download_url, &dest)?;
                if *executable {
                    make_executable(&dest)?;
                }
                Ok(FetchSummary {
                    files: 1,
                    executables: usize::from(*executable),
                    ..Default::default()
                })
            }
            NodeKind::Directory { tree_url } => {
                fs::create_dir_all(&dest).map_err(|e| {
                    Error::IoError(format!("Failed to create {}: {e}", dest.display()))
                })?;
                let inner = self.walk(&dest, tree_url)?;
                Ok(inner.merge(FetchSummary {
                    directories: 1,
                    ..Default::default()
                }))
            }
            NodeKind::Submodule { locator } => {
                let git_url = self.api.resolve_submodule(locator)?;
                self.fetch_repository(&dest, &git_url)
            }
        }
    }

    /// Fetch the whole repository behind `git_url` into `dest` in one archive
    ///
    /// The recursive tree listing is queried first: a submodule anywhere in
    /// it fails the fetch before anything is downloaded.
    pub fn fetch_repository(&self, dest: &Path, git_url: &str) -> Result<FetchSummary> {
        let repo = RepoRef::from_git_url(git_url, DEFAULT_REF)?;
        info!("Fetching whole repository {} into {}", repo.slug(), dest.display());

        let nodes = self.api.list_tree(&repo, true)?;
        if let Some(nested) = nodes
            .iter()
            .find(|n| matches!(n.kind, NodeKind::Submodule { .. }))
        {
            return Err(Error::UnsupportedTopology {
                path: format!("{}/{}", repo.slug(), nested.path),
                reason: "submodule inside a submodule is not supported".to_string(),
            });
        }

        fs::create_dir_all(dest)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", dest.display())))?;

        // Staging lives inside dest so the final moves are same-filesystem renames
        let staging = tempfile::Builder::new()
            .prefix(".repo-")
            .tempdir_in(dest)
            .map_err(|e| Error::IoError(format!("Failed to create staging dir: {e}")))?;
        let archive_path = staging.path().join(format!("{}.tar.gz", repo.name));
        self.api.download(&repo.archive_url(), &archive_path)?;

        let unpacked = staging.path().join("unpacked");
        archive::extract(&archive_path, &unpacked, ArchiveKind::TarGz)?;
        let root = archive::single_wrapper(&unpacked)?.unwrap_or(unpacked);
        move_dir_contents(&root, dest)?;
        drop(staging);

        let mut summary = FetchSummary {
            submodules: 1,
            ..Default::default()
        };
        for node in nodes.iter().filter(|n| !n.is_hidden()) {
            match &node.kind {
                NodeKind::File { executable, .. } => {
                    summary.files += 1;
                    if *executable {
                        let path = safe_join(dest, &node.path)?;
                        if path.is_file() {
                            make_executable(&path)?;
                            summary.executables += 1;
                        }
                    }
                }
                NodeKind::Directory { .. } => summary.directories += 1,
                NodeKind::Submodule { .. } => {}
            }
        }
        Ok(summary)
    }

    /// Apply executable bits from `repo`'s recursive listing to files under
    /// `target` that were fetched from `prefix`
    ///
    /// Needed after a walk through an endpoint that carries no file modes.
    /// Returns how many files were marked.
    pub fn restore_executable_bits(
        &self,
        target: &Path,
        repo: &RepoRef,
        prefix: &str,
    ) -> Result<usize> {
        let prefix = prefix.trim_matches('/');
        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };

        let mut marked = 0;
        for node in self.api.list_tree(repo, true)? {
            let NodeKind::File {
                executable: true, ..
            } = node.kind
            else {
                continue;
            };
            let Some(rel) = node.path.strip_prefix(&prefix) else {
                continue;
            };
            let path = safe_join(target, rel)?;
            if path.is_file() {
                debug!("Marking {} executable", path.display());
                make_executable(&path)?;
                marked += 1;
            }
        }
        Ok(marked)
    }
}
