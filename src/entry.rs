// src/entry.rs

//! Entry-point resolution
//!
//! Picks the single file of an installed plugin that the host should run.
//! Resolution never depends on directory iteration order: entries are
//! sorted, candidate tokens are evaluated in a fixed priority and ties are
//! broken by (already executable, name).

use crate::build::is_compiled_source;
use crate::deps::is_manifest;
use crate::error::{Error, Result};
use crate::filesystem::{
    is_executable, move_dir_contents, safe_join, top_level_files, visible_entries,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Generic tokens tried after the resource stem
const GENERIC_TOKENS: &[&str] = &["main", "plugin"];

/// Ordered, de-duplicated name fragments identifying an entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTokens(Vec<String>);

impl CandidateTokens {
    /// Tokens for a plugin installed from a resource with the given stem
    ///
    /// ```
    /// use plugfetch::entry::CandidateTokens;
    ///
    /// assert_eq!(CandidateTokens::new("summary").as_slice(), ["summary", "main", "plugin"]);
    /// assert_eq!(CandidateTokens::new("plugin").as_slice(), ["plugin", "main"]);
    /// assert_eq!(CandidateTokens::new("").as_slice(), ["main", "plugin"]);
    /// ```
    pub fn new(stem: &str) -> Self {
        let mut tokens: Vec<String> = Vec::new();
        for token in std::iter::once(stem).chain(GENERIC_TOKENS.iter().copied()) {
            if !token.is_empty() && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
        Self(tokens)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Whether a top-level file may be chosen by the token scan
fn is_candidate(name: &str) -> bool {
    !is_compiled_source(name) && !is_manifest(name)
}

/// Replace a lone wrapper directory with its contents
fn hoist(dir: &Path, wrapper: &Path) -> Result<()> {
    // The wrapper moves aside first so a child named like it cannot collide
    let mut parked = dir.join(".hoist");
    let mut n = 0;
    while parked.exists() {
        n += 1;
        parked = dir.join(format!(".hoist-{n}"));
    }

    debug!("Hoisting contents of {}", wrapper.display());
    fs::rename(wrapper, &parked).map_err(|e| {
        Error::IoError(format!("Failed to move {} aside: {e}", wrapper.display()))
    })?;
    drop_shadowed_hidden(dir, &parked)?;
    move_dir_contents(&parked, dir)?;
    fs::remove_dir(&parked)
        .map_err(|e| Error::IoError(format!("Failed to remove {}: {e}", parked.display())))
}

/// Remove hidden entries of `dir` that the wrapper's own copies replace
///
/// Hidden siblings do not stop a directory from counting as the wrapper, so
/// `.gitignore` may exist on both levels; the wrapper's copy wins.
fn drop_shadowed_hidden(dir: &Path, parked: &Path) -> Result<()> {
    for entry in fs::read_dir(parked)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {e}", parked.display())))?
    {
        let name = entry?.file_name();
        if !name.to_string_lossy().starts_with('.') {
            continue;
        }
        let outer = dir.join(&name);
        if outer == parked || outer.symlink_metadata().is_err() {
            continue;
        }
        debug!("Replacing {} with the wrapper's copy", outer.display());
        let removed = if outer.is_dir() && !outer.is_symlink() {
            fs::remove_dir_all(&outer)
        } else {
            fs::remove_file(&outer)
        };
        removed.map_err(|e| Error::IoError(format!("Failed to remove {}: {e}", outer.display())))?;
    }
    Ok(())
}

/// Flatten single-directory nesting, then return the visible top-level
/// entries
///
/// Archives conventionally wrap their content in one folder; after this
/// call `dir` holds that content directly.
pub fn flatten(dir: &Path) -> Result<Vec<PathBuf>> {
    loop {
        let entries = visible_entries(dir)?;
        match entries.as_slice() {
            [only] if only.is_dir() => hoist(dir, only)?,
            _ => return Ok(entries),
        }
    }
}

/// Scan top-level files for the best match of the highest-priority token
fn rank(dir: &Path, tokens: &CandidateTokens) -> Result<Option<PathBuf>> {
    let files: Vec<String> = top_level_files(dir)?
        .into_iter()
        .filter(|name| is_candidate(name))
        .collect();

    for token in tokens.as_slice() {
        let best = files
            .iter()
            .filter(|name| name.contains(token.as_str()))
            .map(|name| (!is_executable(&dir.join(name)), name))
            .min();
        if let Some((_, name)) = best {
            debug!("Token '{}' selected {}", token, name);
            return Ok(Some(dir.join(name)));
        }
    }
    Ok(None)
}

/// Find the entry point of the plugin materialized in `dir`
///
/// A lone wrapper directory is flattened first (repeatedly). `main_file`,
/// when given, names the entry point directly and bypasses the heuristics.
/// Returns `None` when nothing qualifies.
pub fn resolve_entry_point(
    dir: &Path,
    tokens: &CandidateTokens,
    main_file: Option<&str>,
) -> Result<Option<PathBuf>> {
    let entries = flatten(dir)?;

    if let Some(name) = main_file {
        let path = safe_join(dir, name)?;
        if path.is_file() {
            return Ok(Some(path));
        }
        info!("Requested main file {} does not exist", path.display());
        return Ok(None);
    }

    if let [only] = entries.as_slice() {
        if only.is_file() {
            return Ok(Some(only.clone()));
        }
    }

    rank(dir, tokens)
}
