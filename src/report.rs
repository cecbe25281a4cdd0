// src/report.rs

//! Installation transcript
//!
//! Every install, successful or not, produces one [`InstallationReport`]:
//! ordered human-readable lines plus a terminal [`Outcome`]. The report is
//! purely observational; nothing in the pipeline reads it back.

use crate::error::{Error, ErrorClass};
use crate::host::Activation;
use crate::search::SearchHit;
use crate::target::InstallationTarget;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

const BANNER: &str = "===== Installation log =====";

/// Rendering hint passed along with the lines
pub const FORMAT_HINT: &str = "simple";

/// How an install call ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    /// Entry point resolved and executable; `activation` is `None` when
    /// activation was skipped
    Installed {
        entry_point: PathBuf,
        activation: Option<Activation>,
    },
    /// Keyword locator matched one or more plugins
    SearchResults { hits: Vec<SearchHit> },
    /// Keyword locator matched nothing
    NotFound,
    /// Files are on disk but no entry point qualified
    NoEntryPoint,
    Failed { class: ErrorClass, message: String },
}

impl Outcome {
    /// Process exit status for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Installed {
                activation: Some(Activation::TimedOut(_)),
                ..
            } => 2,
            Outcome::Installed { .. } | Outcome::SearchResults { .. } | Outcome::NotFound => 0,
            Outcome::NoEntryPoint => 2,
            Outcome::Failed { .. } => 1,
        }
    }
}

/// Ordered transcript of one install call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationReport {
    pub lines: Vec<String>,
    pub format_hint: &'static str,
    /// Directory the install populated, once it was created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<InstallationTarget>,
    pub outcome: Outcome,
}

impl InstallationReport {
    /// Empty report opened by the banner, outcome pending as `NotFound`
    pub fn new() -> Self {
        Self {
            lines: vec![format!("{BANNER:^64}").trim_end().to_string(), String::new()],
            format_hint: FORMAT_HINT,
            target: None,
            outcome: Outcome::NotFound,
        }
    }

    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Record the terminal outcome
    pub fn finish(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Terminate the report with a pipeline error
    pub fn fail(mut self, err: &Error) -> Self {
        let class = err.class();
        self.lines.push(format!("Installation failed ({class}): {err}"));
        self.outcome = Outcome::Failed {
            class,
            message: err.to_string(),
        };
        self
    }

    /// Append the body of a nested report (without its banner)
    pub fn absorb(mut self, nested: InstallationReport) -> Self {
        self.lines.extend(nested.lines.into_iter().skip(2));
        self.target = nested.target;
        self.outcome = nested.outcome;
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome.exit_code()
    }
}

impl Default for InstallationReport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstallationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_banner_opens_report() {
        let report = InstallationReport::new();
        assert!(report.lines[0].ends_with(BANNER));
        assert!(report.lines[0].starts_with(' '));
        assert_eq!(report.format_hint, "simple");
    }

    #[test]
    fn test_failure_line_and_class() {
        let err = Error::AlreadyInstalled(PathBuf::from("/p/x/x.py"));
        let report = InstallationReport::new().fail(&err);
        assert_eq!(
            report.lines.last().unwrap(),
            "Installation failed (already installed): Destination /p/x/x.py already exists"
        );
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        let installed = |activation| Outcome::Installed {
            entry_point: PathBuf::from("/p/x/x.py"),
            activation,
        };
        assert_eq!(installed(None).exit_code(), 0);
        assert_eq!(
            installed(Some(Activation::Started("x.py".to_string()))).exit_code(),
            0
        );
        assert_eq!(
            installed(Some(Activation::TimedOut("x.py".to_string()))).exit_code(),
            2
        );
        assert_eq!(Outcome::NoEntryPoint.exit_code(), 2);
        assert_eq!(Outcome::NotFound.exit_code(), 0);
    }

    #[test]
    fn test_absorb_drops_nested_banner() {
        let mut outer = InstallationReport::new();
        outer.line("Treating 'x' as a keyword");
        let mut inner = InstallationReport::new();
        inner.line("Downloaded x.py");
        let inner = inner.finish(Outcome::NoEntryPoint);

        let merged = outer.absorb(inner);
        assert_eq!(merged.lines.len(), 4);
        assert_eq!(merged.lines[3], "Downloaded x.py");
        assert_eq!(merged.outcome, Outcome::NoEntryPoint);
    }

    #[test]
    fn test_json_shape() {
        let report = InstallationReport::new().finish(Outcome::Failed {
            class: ErrorClass::Network,
            message: "HTTP 404".to_string(),
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["format_hint"], "simple");
        assert_eq!(json["outcome"]["status"], "failed");
        assert_eq!(json["outcome"]["class"], "network");
        assert!(json.get("target").is_none());
    }
}
