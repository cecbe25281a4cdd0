// src/error.rs

//! Error types for the install pipeline
//!
//! Every fallible library call returns [`Result`]. The orchestrator folds
//! these errors into the installation report, using [`Error::class`] to
//! name the failure class shown to the user.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the acquisition, resolution and activation pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Raw I/O error propagated with `?`
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Locator is not something we know how to install
    #[error("Unsupported locator: {0}")]
    UnsupportedLocator(String),

    /// Remote listing or host reply could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Transfer failed (connection, HTTP status, truncated body)
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Primary path of the destination already exists
    #[error("Destination {} already exists", .0.display())]
    AlreadyInstalled(PathBuf),

    /// Another process holds the reservation for this destination
    #[error("Another install into {} is in progress", .0.display())]
    InstallInProgress(PathBuf),

    /// Remote tree shape we refuse to follow
    #[error("Unsupported topology at '{path}': {reason}")]
    UnsupportedTopology { path: String, reason: String },

    /// Remote-supplied path tries to escape its destination
    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    /// Archive could not be expanded
    #[error("Failed to extract archive {}: {reason}", .path.display())]
    ExtractionFailed { path: PathBuf, reason: String },

    /// Required executable is not on PATH
    #[error("Required tool '{0}' not found in PATH")]
    ToolNotFound(String),

    /// Dependency installer exited unsuccessfully
    #[error("Failed to install dependency '{requirement}': {reason}")]
    DependencyFailed { requirement: String, reason: String },

    /// Build command exited unsuccessfully
    #[error("Build failed: {0}")]
    BuildFailed(String),

    /// Subprocess exceeded its deadline
    #[error("'{command}' timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    /// Host collaborator could not be reached or rejected the request
    #[error("Host error: {0}")]
    HostError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failure classes surfaced in the installation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    UserInput,
    AlreadyInstalled,
    Network,
    UnsupportedTopology,
    DependencyOrBuild,
    Host,
    Filesystem,
    Config,
}

impl Error {
    /// Map this error onto its report failure class
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::UnsupportedLocator(_) | Error::ParseError(_) | Error::PathTraversal(_) => {
                ErrorClass::UserInput
            }
            Error::AlreadyInstalled(_) | Error::InstallInProgress(_) => {
                ErrorClass::AlreadyInstalled
            }
            Error::DownloadError(_) => ErrorClass::Network,
            Error::UnsupportedTopology { .. } => ErrorClass::UnsupportedTopology,
            Error::ToolNotFound(_)
            | Error::DependencyFailed { .. }
            | Error::BuildFailed(_)
            | Error::Timeout { .. } => ErrorClass::DependencyOrBuild,
            Error::HostError(_) => ErrorClass::Host,
            Error::Io(_) | Error::IoError(_) | Error::ExtractionFailed { .. } => {
                ErrorClass::Filesystem
            }
            Error::Config(_) => ErrorClass::Config,
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::UserInput => "invalid input",
            ErrorClass::AlreadyInstalled => "already installed",
            ErrorClass::Network => "network failure",
            ErrorClass::UnsupportedTopology => "unsupported topology",
            ErrorClass::DependencyOrBuild => "dependency/build failure",
            ErrorClass::Host => "host failure",
            ErrorClass::Filesystem => "filesystem failure",
            ErrorClass::Config => "configuration error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            Error::AlreadyInstalled(PathBuf::from("/p/x")).class(),
            ErrorClass::AlreadyInstalled
        );
        assert_eq!(
            Error::UnsupportedTopology {
                path: "sub".to_string(),
                reason: "nested".to_string()
            }
            .class(),
            ErrorClass::UnsupportedTopology
        );
        assert_eq!(
            Error::DownloadError("HTTP 404".to_string()).class(),
            ErrorClass::Network
        );
        assert_eq!(
            Error::ToolNotFound("go".to_string()).class(),
            ErrorClass::DependencyOrBuild
        );
    }

    #[test]
    fn test_already_installed_message() {
        let err = Error::AlreadyInstalled(PathBuf::from("/plugins/summary/summary.py"));
        assert_eq!(
            err.to_string(),
            "Destination /plugins/summary/summary.py already exists"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert_eq!(err.class(), ErrorClass::Filesystem);
    }
}
