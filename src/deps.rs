// src/deps.rs

//! Runtime dependency resolution for Python plugins
//!
//! Dependency manifests are top-level files whose name contains
//! `requirements`. Each requirement is installed through the package
//! environment only when it is missing, or when its `==` pin is newer than
//! what is installed. Installer failures are fatal: a plugin missing its
//! dependencies crashes the host at startup.

use crate::error::{Error, Result};
use crate::filesystem::top_level_files;
use crate::process::CommandRunner;
use semver::Version;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Substring marking a dependency manifest file name
const MANIFEST_MARKER: &str = "requirements";

/// Characters that end the package name in a requirement line
const NAME_TERMINATORS: &[char] = &['=', '<', '>', '!', '~', '[', ';'];

/// Whether a file name denotes a dependency manifest
pub fn is_manifest(file_name: &str) -> bool {
    file_name.contains(MANIFEST_MARKER)
}

/// One parsed manifest line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Distribution name
    pub name: String,
    /// Version from an `==` pin
    pub pinned: Option<String>,
    /// Cleaned line handed to the installer
    pub spec: String,
}

impl Requirement {
    /// Parse a manifest line, returning `None` for blanks, comments and
    /// option lines such as `-r other.txt`
    ///
    /// ```
    /// use plugfetch::deps::Requirement;
    ///
    /// let req = Requirement::parse("pyln-client==0.8.2  # host bindings").unwrap();
    /// assert_eq!(req.name, "pyln-client");
    /// assert_eq!(req.pinned.as_deref(), Some("0.8.2"));
    /// assert!(Requirement::parse("# comment").is_none());
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.split('#').next().unwrap_or_default();
        let spec = line.split(';').next().unwrap_or_default().trim();
        if spec.is_empty() || spec.starts_with('-') {
            return None;
        }

        let name_end = spec
            .find(|c: char| NAME_TERMINATORS.contains(&c) || c.is_whitespace())
            .unwrap_or(spec.len());
        let name = spec[..name_end].trim();
        if name.is_empty() {
            return None;
        }

        let pinned = spec
            .split_once("==")
            .map(|(_, rest)| {
                rest.trim_start()
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .next()
                    .unwrap_or_default()
                    .to_string()
            })
            .filter(|v| !v.is_empty());

        Some(Self {
            name: name.to_string(),
            pinned,
            spec: spec.to_string(),
        })
    }
}

/// Parse a version leniently into semver
///
/// Missing components are padded with zero and trailing non-digits in each
/// component are dropped, so `2`, `2.0` and `2.0.0rc1` all compare as
/// `2.0.0`. Returns `None` when not even a major number can be read.
pub fn lenient_version(text: &str) -> Option<Version> {
    let text = text.trim().trim_start_matches('v');
    if let Ok(v) = Version::parse(text) {
        return Some(v);
    }

    let numbers: Vec<Option<u64>> = text
        .split('.')
        .take(3)
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .collect();

    let major = numbers.first().copied().flatten()?;
    let minor = numbers.get(1).copied().flatten().unwrap_or(0);
    let patch = numbers.get(2).copied().flatten().unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// The local package environment dependencies are installed into
pub trait PackageEnvironment {
    /// Whether `name` can be imported / located locally
    fn is_resolvable(&self, name: &str) -> Result<bool>;

    /// Installed version of `name`, `None` when it cannot be determined
    fn installed_version(&self, name: &str) -> Result<Option<String>>;

    /// Install a requirement spec; failure is fatal
    fn install(&self, spec: &str) -> Result<()>;
}

/// [`PackageEnvironment`] backed by a Python interpreter and `pip`
pub struct PipEnvironment<'a> {
    runner: &'a dyn CommandRunner,
    python: String,
}

impl<'a> PipEnvironment<'a> {
    pub fn new(runner: &'a dyn CommandRunner, python: &str) -> Self {
        Self {
            runner,
            python: python.to_string(),
        }
    }
}

/// Module name a distribution is imported as (`pyln-client` → `pyln_client`)
fn module_name(name: &str) -> String {
    name.replace('-', "_")
}

impl PackageEnvironment for PipEnvironment<'_> {
    fn is_resolvable(&self, name: &str) -> Result<bool> {
        let script = format!(
            "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec({:?}) else 1)",
            module_name(name)
        );
        let output = self.runner.run(&self.python, &["-c", &script], None)?;
        Ok(output.success())
    }

    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let script = format!("import importlib.metadata as m; print(m.version({name:?}))");
        let output = self.runner.run(&self.python, &["-c", &script], None)?;
        if !output.success() {
            debug!("No version metadata for {}", name);
            return Ok(None);
        }
        let version = output.stdout.trim();
        Ok((!version.is_empty()).then(|| version.to_string()))
    }

    fn install(&self, spec: &str) -> Result<()> {
        info!("Installing Python dependency {}", spec);
        let output = self
            .runner
            .run(&self.python, &["-m", "pip", "install", spec], None)
            .map_err(|e| Error::DependencyFailed {
                requirement: spec.to_string(),
                reason: e.to_string(),
            })?;
        if !output.success() {
            return Err(Error::DependencyFailed {
                requirement: spec.to_string(),
                reason: output.describe_failure(),
            });
        }
        Ok(())
    }
}

/// What the dependency step did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DependencySummary {
    /// Manifest files that were processed, in order
    pub manifests: Vec<String>,
    /// Requirement specs handed to the installer
    pub installed: Vec<String>,
    /// Requirements already satisfied or with an unknown installed version
    pub skipped: Vec<String>,
}

/// Decide whether one requirement needs the installer
fn needs_install(req: &Requirement, env: &dyn PackageEnvironment) -> Result<bool> {
    if !env.is_resolvable(&req.name)? {
        return Ok(true);
    }
    let Some(pinned) = req.pinned.as_deref().and_then(lenient_version) else {
        return Ok(false);
    };
    let Some(installed) = env.installed_version(&req.name)? else {
        return Ok(false);
    };
    match lenient_version(&installed) {
        Some(current) => Ok(pinned > current),
        None => {
            debug!("Unparsable installed version '{}' of {}", installed, req.name);
            Ok(false)
        }
    }
}

/// Install the dependencies declared by manifests at the top of `dir`
pub fn resolve_dependencies(dir: &Path, env: &dyn PackageEnvironment) -> Result<DependencySummary> {
    let mut summary = DependencySummary::default();

    for manifest in top_level_files(dir)?.into_iter().filter(|n| is_manifest(n)) {
        let text = fs::read_to_string(dir.join(&manifest))
            .map_err(|e| Error::IoError(format!("Failed to read {manifest}: {e}")))?;
        debug!("Processing dependency manifest {}", manifest);

        for req in text.lines().filter_map(Requirement::parse) {
            if needs_install(&req, env)? {
                env.install(&req.spec)?;
                summary.installed.push(req.spec);
            } else {
                debug!("Dependency {} already satisfied", req.name);
                summary.skipped.push(req.spec);
            }
        }
        summary.manifests.push(manifest);
    }

    Ok(summary)
}
