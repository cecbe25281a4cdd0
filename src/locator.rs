// src/locator.rs

//! Locator classification
//!
//! Turns the user-supplied string into either a search keyword or an
//! [`InstallPlan`]: where the plugin lands on disk and which fetch strategy
//! reproduces it there.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::remote::{DEFAULT_REF, RepoRef};
use std::fmt;
use url::Url;

/// What the user asked to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// Opaque search string
    Keyword(String),
    /// `http` or `https` address
    Url(Url),
}

impl Locator {
    /// Classify a locator string
    ///
    /// ```
    /// use plugfetch::locator::Locator;
    ///
    /// assert!(matches!(Locator::parse("https://example.org/plugin.zip"), Locator::Url(_)));
    /// assert!(matches!(Locator::parse("summary"), Locator::Keyword(_)));
    /// assert!(matches!(Locator::parse("ftp://example.org/p.py"), Locator::Keyword(_)));
    /// ```
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        match Url::parse(input) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(url),
            _ => Self::Keyword(input.to_string()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keyword(k) => write!(f, "{k}"),
            Self::Url(u) => write!(f, "{u}"),
        }
    }
}

/// How the plugin content is materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Walk a listing-API tree address, then restore executable bits for
    /// `folder` from the recursive listing of `repo`
    Tree {
        tree_url: String,
        repo: RepoRef,
        folder: String,
    },
    /// Download one file into the target (and unpack it if it is an archive)
    Direct { url: String },
}

/// Everything decided about an install before any I/O
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    /// Final path segment of the locator
    pub resource_name: String,
    /// Subdirectory of the plugins path receiving the plugin
    pub install_dir: String,
    /// Resource name up to its first `.`; first entry-point token
    pub stem: String,
    pub strategy: FetchStrategy,
}

/// Part of a name before its first `.`
fn stem_of(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).map(str::to_string).collect())
        .unwrap_or_default()
}

fn host_matches(url: &Url, host: &str) -> bool {
    url.host_str()
        .is_some_and(|h| h.eq_ignore_ascii_case(host) || h.eq_ignore_ascii_case(&format!("www.{host}")))
}

/// `.../repos/<owner>/<repo>/contents[/<path>]` on the listing API
fn classify_api_url(url: &Url, segments: &[String], config: &Config) -> Option<FetchStrategy> {
    let repos = segments.iter().position(|s| s == "repos")?;
    let rest = &segments[repos + 1..];
    if rest.len() < 3 || rest[2] != "contents" {
        return None;
    }

    // Without `ref` the endpoint serves the default branch, whatever its name
    let reference = url
        .query_pairs()
        .find(|(k, _)| k == "ref")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| DEFAULT_REF.to_string());
    let repo = RepoRef::new(&config.hosting_host, &rest[0], &rest[1], &reference);

    Some(FetchStrategy::Tree {
        tree_url: url.to_string(),
        repo,
        folder: rest[3..].join("/"),
    })
}

/// `github.com/<owner>/<repo>(.git)[/tree|blob/<ref>[/<path>]]`
fn classify_hosting_url(segments: &[String], config: &Config) -> Result<FetchStrategy> {
    let [owner, name, rest @ ..] = segments else {
        return Err(Error::UnsupportedLocator(format!(
            "{} URL does not name a repository",
            config.hosting_host
        )));
    };

    let (kind, reference, path) = match rest {
        [kind, reference, path @ ..] if kind == "tree" || kind == "blob" => {
            (kind.as_str(), reference.clone(), path.join("/"))
        }
        [] => ("tree", config.default_branch.clone(), String::new()),
        _ => {
            return Err(Error::UnsupportedLocator(format!(
                "unrecognised {} URL shape: {}/{}/{}",
                config.hosting_host,
                owner,
                name,
                rest.join("/")
            )));
        }
    };

    let repo = RepoRef::new(&config.hosting_host, owner, name, &reference);
    if kind == "blob" {
        return Ok(FetchStrategy::Direct {
            url: repo.raw_url(&config.raw_base, &path),
        });
    }
    Ok(FetchStrategy::Tree {
        tree_url: repo.contents_url(&config.api_base, &path),
        repo,
        folder: path,
    })
}

/// Decide the destination and fetch strategy for a URL locator
pub fn plan(url: &Url, config: &Config, install_dir: Option<&str>) -> Result<InstallPlan> {
    let segments = path_segments(url);
    let api_host = Url::parse(&config.api_base)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));

    let mut resource_name = segments.last().cloned().unwrap_or_default();

    let strategy = if api_host.is_some_and(|h| host_matches(url, &h)) {
        classify_api_url(url, &segments, config).unwrap_or_else(|| FetchStrategy::Direct {
            url: url.to_string(),
        })
    } else if host_matches(url, &config.hosting_host) {
        resource_name = resource_name.trim_end_matches(".git").to_string();
        classify_hosting_url(&segments, config)?
    } else {
        FetchStrategy::Direct {
            url: url.to_string(),
        }
    };

    if resource_name.is_empty() {
        return Err(Error::UnsupportedLocator(format!(
            "cannot derive a resource name from {url}"
        )));
    }

    let stem = stem_of(&resource_name).to_string();
    let install_dir = match install_dir.map(str::trim).filter(|d| !d.is_empty()) {
        Some(dir) => dir.to_string(),
        None => stem.clone(),
    };
    if install_dir.is_empty()
        || install_dir.starts_with('.')
        || install_dir.contains(['/', '\\'])
    {
        return Err(Error::UnsupportedLocator(format!(
            "invalid install directory name '{install_dir}'"
        )));
    }

    Ok(InstallPlan {
        resource_name,
        install_dir,
        stem,
        strategy,
    })
}
