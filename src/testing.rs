// src/testing.rs

//! In-memory implementations of the pipeline's external seams
//!
//! Used by the unit tests and by the integration tests under `tests/`:
//! - [`MemoryRemote`]: listings, git trees and file bodies served from maps
//! - [`ScriptedRunner`]: canned subprocess results, records every call
//! - [`FakeEnvironment`]: a package environment with a fixed inventory
//! - [`FakeHost`]: a host that reports whatever it was asked to start
//!
//! Plus builders for `.tar.gz` and `.zip` fixtures.

use crate::deps::PackageEnvironment;
use crate::error::{Error, Result};
use crate::host::{ActiveExtension, Host};
use crate::process::{CommandOutput, CommandRunner};
use crate::remote::{Listing, RemoteApi, RemoteNode, RepoRef};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Remote
// =============================================================================

/// [`RemoteApi`] serving canned data
#[derive(Default)]
pub struct MemoryRemote {
    listings: HashMap<String, Listing>,
    trees: HashMap<String, Vec<RemoteNode>>,
    blobs: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

fn tree_key(repo: &RepoRef) -> String {
    format!("{}@{}", repo.slug(), repo.reference)
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listing(&mut self, tree_url: &str, listing: Listing) {
        self.listings.insert(tree_url.to_string(), listing);
    }

    /// Git-tree listing returned for `repo` (recursive or not)
    pub fn add_tree(&mut self, repo: &RepoRef, nodes: Vec<RemoteNode>) {
        self.trees.insert(tree_key(repo), nodes);
    }

    pub fn add_blob(&mut self, url: &str, body: &[u8]) {
        self.blobs.insert(url.to_string(), body.to_vec());
    }

    /// Register a walkable tree rooted at `root` from `(path, body, executable)`
    /// triples
    ///
    /// Directory listings are served at `<root>/tree/<dir>` and file bodies
    /// at `<root>/raw/<path>`.
    pub fn add_walkable_tree(&mut self, root: &str, files: &[(&str, &[u8], bool)]) {
        let dir_url = |dir: &str| {
            if dir.is_empty() {
                root.to_string()
            } else {
                format!("{root}/tree/{dir}")
            }
        };

        let mut children: BTreeMap<String, Vec<RemoteNode>> = BTreeMap::new();
        let mut dirs = BTreeSet::new();
        children.entry(String::new()).or_default();

        for (path, body, executable) in files {
            let parts: Vec<&str> = path.split('/').collect();
            for depth in 1..parts.len() {
                let dir = parts[..depth].join("/");
                if dirs.insert(dir.clone()) {
                    let parent = parts[..depth - 1].join("/");
                    children
                        .entry(parent)
                        .or_default()
                        .push(RemoteNode::directory(parts[depth - 1], &dir_url(&dir)));
                    children.entry(dir).or_default();
                }
            }

            let url = format!("{root}/raw/{path}");
            let parent = parts[..parts.len() - 1].join("/");
            children
                .entry(parent)
                .or_default()
                .push(RemoteNode::file(parts[parts.len() - 1], &url, *executable));
            self.add_blob(&url, body);
        }

        for (dir, nodes) in children {
            self.add_listing(&dir_url(&dir), Listing::Children(nodes));
        }
    }

    /// Every call made so far, as `list <url>`, `tree <slug>@<ref>` or
    /// `download <url>`
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }

    fn record(&self, request: String) {
        lock(&self.requests).push(request);
    }
}

impl RemoteApi for MemoryRemote {
    fn list(&self, tree_url: &str) -> Result<Listing> {
        self.record(format!("list {tree_url}"));
        self.listings
            .get(tree_url)
            .cloned()
            .ok_or_else(|| Error::DownloadError(format!("HTTP 404 Not Found from {tree_url}")))
    }

    fn list_tree(&self, repo: &RepoRef, _recursive: bool) -> Result<Vec<RemoteNode>> {
        let key = tree_key(repo);
        self.record(format!("tree {key}"));
        self.trees
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::DownloadError(format!("HTTP 404 Not Found for tree {key}")))
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        self.record(format!("download {url}"));
        let body = self
            .blobs
            .get(url)
            .ok_or_else(|| Error::DownloadError(format!("HTTP 404 Not Found from {url}")))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, body)?;
        Ok(())
    }
}

// =============================================================================
// Subprocesses
// =============================================================================

/// [`CommandRunner`] answering from a table keyed by program name
///
/// Programs without an entry succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: HashMap<String, CommandOutput>,
    missing: HashSet<String>,
    calls: Mutex<Vec<(String, Option<PathBuf>)>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, program: &str, output: CommandOutput) -> Self {
        self.responses.insert(program.to_string(), output);
        self
    }

    /// Make `program` look absent from `PATH`
    pub fn missing(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Command lines run so far, program and arguments joined by spaces
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).iter().map(|(c, _)| c.clone()).collect()
    }

    /// Working directory of each call
    pub fn dirs(&self) -> Vec<Option<PathBuf>> {
        lock(&self.calls).iter().map(|(_, d)| d.clone()).collect()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        lock(&self.calls).push((line, cwd.map(Path::to_path_buf)));

        if self.missing.contains(program) {
            return Err(Error::ToolNotFound(program.to_string()));
        }
        Ok(self
            .responses
            .get(program)
            .cloned()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}

// =============================================================================
// Package environment
// =============================================================================

/// [`PackageEnvironment`] with a fixed inventory of installed packages
#[derive(Default)]
pub struct FakeEnvironment {
    packages: HashMap<String, Option<String>>,
    fail_installs: bool,
    installs: Mutex<Vec<String>>,
}

impl FakeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` resolvable, with `version` when its metadata is known
    pub fn with_package(mut self, name: &str, version: Option<&str>) -> Self {
        self.packages
            .insert(name.to_string(), version.map(str::to_string));
        self
    }

    /// Make every install attempt fail
    pub fn failing_installs(mut self) -> Self {
        self.fail_installs = true;
        self
    }

    /// Requirement specs handed to `install`
    pub fn installs(&self) -> Vec<String> {
        lock(&self.installs).clone()
    }
}

impl PackageEnvironment for FakeEnvironment {
    fn is_resolvable(&self, name: &str) -> Result<bool> {
        Ok(self.packages.contains_key(name))
    }

    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self.packages.get(name).cloned().flatten())
    }

    fn install(&self, spec: &str) -> Result<()> {
        lock(&self.installs).push(spec.to_string());
        if self.fail_installs {
            return Err(Error::DependencyFailed {
                requirement: spec.to_string(),
                reason: "exit code 1".to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Host
// =============================================================================

/// [`Host`] that lists every plugin it was asked to start
#[derive(Default)]
pub struct FakeHost {
    refuse: bool,
    unreachable: bool,
    started: Mutex<Vec<PathBuf>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `start` but never report the plugin as running
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    /// Fail every call as if the host were down
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn started(&self) -> Vec<PathBuf> {
        lock(&self.started).clone()
    }
}

impl Host for FakeHost {
    fn start(&self, path: &Path) -> Result<Vec<ActiveExtension>> {
        if self.unreachable {
            return Err(Error::HostError("Connection refused".to_string()));
        }
        lock(&self.started).push(path.to_path_buf());
        self.active()
    }

    fn active(&self) -> Result<Vec<ActiveExtension>> {
        if self.unreachable {
            return Err(Error::HostError("Connection refused".to_string()));
        }
        if self.refuse {
            return Ok(Vec::new());
        }
        Ok(lock(&self.started)
            .iter()
            .map(|p| ActiveExtension::new(&p.to_string_lossy()))
            .collect())
    }
}

// =============================================================================
// Archive fixtures
// =============================================================================

/// Build a gzipped tarball from `(path, body, mode)` triples
pub fn tar_gz_bytes(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, body, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder
            .append_data(&mut header, path, *body)
            .unwrap_or_else(|e| panic!("tar fixture {path}: {e}"));
    }
    builder
        .into_inner()
        .and_then(|gz| gz.finish())
        .unwrap_or_else(|e| panic!("tar fixture: {e}"))
}

/// Build a zip archive from `(path, body, mode)` triples
pub fn zip_bytes(files: &[(&str, &[u8], u32)]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (path, body, mode) in files {
        let options = zip::write::SimpleFileOptions::default().unix_permissions(*mode);
        zip.start_file(*path, options)
            .unwrap_or_else(|e| panic!("zip fixture {path}: {e}"));
        zip.write_all(body)
            .unwrap_or_else(|e| panic!("zip fixture {path}: {e}"));
    }
    zip.finish()
        .unwrap_or_else(|e| panic!("zip fixture: {e}"))
        .into_inner()
}
