// src/remote/mod.rs

//! Remote repository access
//!
//! This module provides:
//! - [`RemoteNode`]: one entry of a remote tree, typed by [`NodeKind`]
//! - [`RemoteApi`]: the listing/download seam used by the fetcher, the
//!   search and the orchestrator
//! - [`HttpRemote`]: the reqwest-backed implementation
//! - [`RepoRef`] and URL helpers for the hosting site

mod client;
mod github;

pub use client::HttpRemote;
pub use github::{DEFAULT_REF, RepoRef, is_git_url, normalize_git_url, parse_contents_reply, parse_tree_reply};

use crate::error::{Error, Result};
use std::path::Path;

/// What a remote tree entry is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Plain file with its direct-download address
    File { download_url: String, executable: bool },
    /// Directory with the address listing its children
    Directory { tree_url: String },
    /// Link to another repository: a git URL, or a listing address that
    /// resolves to one (see [`RemoteApi::resolve_submodule`])
    Submodule { locator: String },
}

/// One entry in a remote tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteNode {
    /// Slash-separated path relative to the listed tree
    pub path: String,
    pub kind: NodeKind,
}

impl RemoteNode {
    pub fn file(path: &str, download_url: &str, executable: bool) -> Self {
        Self {
            path: path.to_string(),
            kind: NodeKind::File {
                download_url: download_url.to_string(),
                executable,
            },
        }
    }

    pub fn directory(path: &str, tree_url: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: NodeKind::Directory {
                tree_url: tree_url.to_string(),
            },
        }
    }

    pub fn submodule(path: &str, locator: &str) -> Self {
        Self {
            path: path.to_string(),
            kind: NodeKind::Submodule {
                locator: locator.to_string(),
            },
        }
    }

    /// Dot-prefixed entries (`.github`, `.gitignore`) are never materialized
    ///
    /// `.` and `..` are path syntax, not hidden names; they are left for
    /// path sanitisation to reject.
    pub fn is_hidden(&self) -> bool {
        self.path
            .split('/')
            .any(|c| c.starts_with('.') && c != "." && c != "..")
    }

    /// Final path component
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Result of listing one tree address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Immediate children of a directory
    Children(Vec<RemoteNode>),
    /// The address itself is a link to another repository
    Indirect { git_url: String },
}

/// Listing and download operations against the remote repository host
///
/// Implementations must be usable from several worker threads at once.
pub trait RemoteApi: Send + Sync {
    /// List the immediate children of a tree address (contents-style)
    fn list(&self, tree_url: &str) -> Result<Listing>;

    /// List a repository's git tree at `repo.reference`
    ///
    /// Entries carry full paths and executable flags. With `recursive`
    /// the whole tree is returned in one listing.
    fn list_tree(&self, repo: &RepoRef, recursive: bool) -> Result<Vec<RemoteNode>>;

    /// Download `url` to `dest`, creating parent directories
    fn download(&self, url: &str, dest: &Path) -> Result<()>;

    /// Turn a submodule locator into the git URL it points at
    fn resolve_submodule(&self, locator: &str) -> Result<String> {
        if is_git_url(locator) {
            return Ok(locator.to_string());
        }
        match self.list(locator)? {
            Listing::Indirect { git_url } => Ok(git_url),
            Listing::Children(_) => Err(Error::ParseError(format!(
                "{locator} was listed as a submodule but is a directory"
            ))),
        }
    }
}
