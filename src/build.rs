// src/build.rs

//! Build step for compiled plugins
//!
//! Strategies are tried in a fixed priority order and the first match is the
//! only one run. A missing toolchain or a failed build is fatal.

use crate::error::{Error, Result};
use crate::filesystem::top_level_files;
use crate::process::CommandRunner;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// File names that select the generic `make` build
const MAKEFILE_NAMES: &[&str] = &["GNUmakefile", "makefile", "Makefile"];

/// Suffixes of compiled-language sources: build inputs, never entry points
pub const COMPILED_SUFFIXES: &[&str] = &["go", "c", "cc", "cpp", "cxx", "h", "hpp", "rs"];

/// Whether a file name carries a compiled-language source suffix
pub fn is_compiled_source(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .map(|ext| COMPILED_SUFFIXES.contains(&ext.to_string_lossy().as_ref()))
        .unwrap_or(false)
}

/// How a plugin directory gets built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStrategy {
    Make,
    Go,
    Cargo,
}

impl BuildStrategy {
    /// Pick the strategy for the top-level files of a plugin directory
    pub fn detect(files: &[String]) -> Option<Self> {
        let has = |name: &str| files.iter().any(|f| f == name);
        let has_suffix = |ext: &str| {
            files
                .iter()
                .any(|f| Path::new(f).extension().is_some_and(|e| e == ext))
        };

        if MAKEFILE_NAMES.iter().any(|m| has(m)) {
            Some(Self::Make)
        } else if has_suffix("go") {
            Some(Self::Go)
        } else if has("Cargo.toml") {
            Some(Self::Cargo)
        } else {
            None
        }
    }

    pub fn program(&self) -> &'static str {
        match self {
            Self::Make => "make",
            Self::Go => "go",
            Self::Cargo => "cargo",
        }
    }

    pub fn args(&self) -> &'static [&'static str] {
        match self {
            Self::Make => &[],
            Self::Go => &["build"],
            Self::Cargo => &["build", "--release"],
        }
    }
}

impl fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program())?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Build the plugin in `dir` if it needs building
///
/// Returns the strategy that ran, or `None` for interpreted plugins.
/// Compiled sources with no applicable strategy fail the build.
pub fn build(dir: &Path, runner: &dyn CommandRunner) -> Result<Option<BuildStrategy>> {
    let files = top_level_files(dir)?;
    let Some(strategy) = BuildStrategy::detect(&files) else {
        if let Some(source) = files.iter().find(|f| is_compiled_source(f)) {
            warn!("Found {} but no build strategy applies", source);
            return Err(Error::BuildFailed(format!(
                "no build strategy for {source} (expected a Makefile, Go sources or Cargo.toml)"
            )));
        }
        return Ok(None);
    };

    info!("Building plugin with `{}`", strategy);
    let output = runner.run(strategy.program(), strategy.args(), Some(dir))?;
    if !output.success() {
        return Err(Error::BuildFailed(format!(
            "`{strategy}` {}",
            output.describe_failure()
        )));
    }
    Ok(Some(strategy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use crate::testing::ScriptedRunner;
    use std::fs;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_makefile_takes_precedence() {
        assert_eq!(
            BuildStrategy::detect(&names(&["main.go", "Makefile", "Cargo.toml"])),
            Some(BuildStrategy::Make)
        );
        assert_eq!(
            BuildStrategy::detect(&names(&["main.go", "go.mod"])),
            Some(BuildStrategy::Go)
        );
        assert_eq!(
            BuildStrategy::detect(&names(&["Cargo.toml", "README.md"])),
            Some(BuildStrategy::Cargo)
        );
        assert_eq!(BuildStrategy::detect(&names(&["plugin.py"])), None);
    }

    #[test]
    fn test_compiled_suffixes() {
        assert!(is_compiled_source("main.go"));
        assert!(is_compiled_source("plugin.cpp"));
        assert!(!is_compiled_source("plugin.py"));
        assert!(!is_compiled_source("Makefile"));
    }

    #[test]
    fn test_build_runs_in_plugin_dir() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("Makefile"), "all:\n").unwrap();

        let runner = ScriptedRunner::new();
        assert_eq!(
            build(temp.path(), &runner).unwrap(),
            Some(BuildStrategy::Make)
        );
        assert_eq!(runner.calls(), vec!["make"]);
        assert_eq!(runner.dirs(), vec![Some(temp.path().to_path_buf())]);
    }

    #[test]
    fn test_failed_build_is_fatal() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("main.go"), "package main\n").unwrap();

        let runner = ScriptedRunner::new().respond("go", CommandOutput::failed(1, "syntax error"));
        let err = build(temp.path(), &runner).unwrap_err();
        assert!(matches!(err, Error::BuildFailed(_)));
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_missing_toolchain() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("main.go"), "package main\n").unwrap();

        let runner = ScriptedRunner::new().missing("go");
        assert!(matches!(
            build(temp.path(), &runner),
            Err(Error::ToolNotFound(_))
        ));
    }

    #[test]
    fn test_unbuildable_sources_fail() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("hello.c"), "int main(){}\n").unwrap();
        fs::write(temp.path().join("hello_notes.txt"), "").unwrap();

        let runner = ScriptedRunner::new();
        let err = build(temp.path(), &runner).unwrap_err();
        assert!(matches!(err, Error::BuildFailed(_)));
        assert!(err.to_string().contains("hello.c"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_interpreted_plugin_not_built() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("plugin.py"), "").unwrap();
        let runner = ScriptedRunner::new();
        assert_eq!(build(temp.path(), &runner).unwrap(), None);
        assert!(runner.calls().is_empty());
    }
}
