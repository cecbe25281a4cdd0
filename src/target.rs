// src/target.rs

//! The directory created for one install

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Local directory populated by one install call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationTarget {
    pub path: PathBuf,
    pub created_at: DateTime<Utc>,
    /// Relative `/`-separated paths of the files and directories present,
    /// hidden entries excluded
    pub materialized: BTreeSet<String>,
}

impl InstallationTarget {
    /// Create the directory (and parents) and start tracking it
    pub fn create(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)
            .map_err(|e| Error::IoError(format!("Failed to create {}: {e}", path.display())))?;
        let path = std::path::absolute(path)
            .map_err(|e| Error::IoError(format!("Failed to resolve {}: {e}", path.display())))?;
        Ok(Self {
            path,
            created_at: Utc::now(),
            materialized: BTreeSet::new(),
        })
    }

    /// Re-scan the directory into [`Self::materialized`]
    pub fn refresh(&mut self) -> Result<()> {
        self.materialized = inventory(&self.path)?;
        Ok(())
    }

    /// Materialized regular files
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.materialized
            .iter()
            .map(String::as_str)
            .filter(|rel| self.path.join(rel).is_file())
    }
}

/// Relative paths of every non-hidden entry below `root`
pub fn inventory(root: &Path) -> Result<BTreeSet<String>> {
    let mut paths = BTreeSet::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to scan {}: {e}", root.display())))?;
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        paths.insert(rel.join("/"));
    }
    Ok(paths)
}
