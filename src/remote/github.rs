// src/remote/github.rs

//! Hosting-site addressing and listing API payloads
//!
//! The listing API has two endpoints we care about:
//! - the contents endpoint (`/repos/{owner}/{repo}/contents/{path}`), which
//!   lists immediate children with download addresses but no file modes
//! - the git tree endpoint (`/repos/{owner}/{repo}/git/trees/{ref}`), which
//!   carries the `mode` sentinel for every entry
//!
//! Both are decoded here into [`RemoteNode`] values so nothing downstream
//! compares mode strings.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::borrow::Cow;
use tracing::debug;
use url::Url;

use super::{Listing, NodeKind, RemoteNode};

const MODE_FILE: &str = "100644";
const MODE_FILE_GROUP_WRITE: &str = "100664";
const MODE_EXECUTABLE: &str = "100755";
const MODE_DIRECTORY: &str = "040000";
const MODE_SUBMODULE: &str = "160000";
const MODE_SYMLINK: &str = "120000";

/// Ref naming whatever branch the repository serves by default
pub const DEFAULT_REF: &str = "HEAD";

/// A repository at a given ref on the hosting site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub host: String,
    pub owner: String,
    pub name: String,
    pub reference: String,
}

impl RepoRef {
    pub fn new(host: &str, owner: &str, name: &str, reference: &str) -> Self {
        Self {
            host: host.to_string(),
            owner: owner.to_string(),
            name: name.trim_end_matches(".git").to_string(),
            reference: reference.to_string(),
        }
    }

    /// Parse `https://host/owner/repo(.git)` or `git@host:owner/repo(.git)`
    pub fn from_git_url(url: &str, reference: &str) -> Result<Self> {
        let normalized = normalize_git_url(url);
        let parsed = Url::parse(&normalized)
            .map_err(|e| Error::ParseError(format!("Invalid repository URL '{url}': {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::ParseError(format!("Repository URL '{url}' has no host")))?;
        let segments: Vec<&str> = parsed
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();
        if segments.len() < 2 {
            return Err(Error::ParseError(format!(
                "Repository URL '{url}' does not name an owner and repository"
            )));
        }
        Ok(Self::new(host, segments[0], segments[1], reference))
    }

    /// `owner/name`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    pub fn https_url(&self) -> String {
        format!("https://{}/{}/{}", self.host, self.owner, self.name)
    }

    /// Tarball of the whole repository at this ref
    pub fn archive_url(&self) -> String {
        format!("{}/archive/{}.tar.gz", self.https_url(), self.reference)
    }

    /// Contents-endpoint address for `path` (empty for the repository root)
    pub fn contents_url(&self, api_base: &str, path: &str) -> String {
        let path = path.trim_matches('/');
        let api_base = api_base.trim_end_matches('/');
        if path.is_empty() {
            format!(
                "{api_base}/repos/{}/contents?ref={}",
                self.slug(),
                self.reference
            )
        } else {
            format!(
                "{api_base}/repos/{}/contents/{path}?ref={}",
                self.slug(),
                self.reference
            )
        }
    }

    /// Git-tree-endpoint address for this ref
    pub fn tree_url(&self, api_base: &str, recursive: bool) -> String {
        let base = format!(
            "{}/repos/{}/git/trees/{}",
            api_base.trim_end_matches('/'),
            self.slug(),
            self.reference
        );
        if recursive {
            format!("{base}?recursive=1")
        } else {
            base
        }
    }

    /// Web page for a path inside the repository
    pub fn human_url(&self, path: &str) -> String {
        format!("{}/tree/{}/{}", self.https_url(), self.reference, path)
    }

    /// Raw file address for a path inside the repository
    pub fn raw_url(&self, raw_base: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            raw_base.trim_end_matches('/'),
            self.slug(),
            self.reference,
            path
        )
    }
}

/// Whether `s` looks like a git remote rather than a listing address
pub fn is_git_url(s: &str) -> bool {
    s.starts_with("git@")
        || s.starts_with("git://")
        || s.starts_with("ssh://")
        || s.ends_with(".git")
}

/// Rewrite SSH-style git remotes to their HTTPS equivalent
///
/// - `git@host:owner/repo.git` → `https://host/owner/repo`
/// - `ssh://git@host/owner/repo` → `https://host/owner/repo`
/// - `git://host/owner/repo` → `https://host/owner/repo`
pub fn normalize_git_url(url: &str) -> Cow<'_, str> {
    let url = url.trim();
    let rewritten = if let Some(rest) = url.strip_prefix("git@") {
        match rest.split_once(':') {
            Some((host, path)) => format!("https://{host}/{}", path.trim_start_matches('/')),
            None => return Cow::Borrowed(url),
        }
    } else if let Some(rest) = url.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map(|(_, r)| r).unwrap_or(rest);
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("git://") {
        format!("https://{rest}")
    } else if url.ends_with(".git") {
        url.to_string()
    } else {
        return Cow::Borrowed(url);
    };

    Cow::Owned(rewritten.trim_end_matches(".git").to_string())
}

// =============================================================================
// Contents endpoint
// =============================================================================

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    submodule_git_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsReply {
    Listing(Vec<ContentsEntry>),
    Single(Box<ContentsEntry>),
}

/// Decode a contents-endpoint response
pub fn parse_contents_reply(body: &str) -> Result<Listing> {
    let reply: ContentsReply = serde_json::from_str(body)
        .map_err(|e| Error::ParseError(format!("Could not parse contents listing: {e}")))?;

    match reply {
        ContentsReply::Listing(entries) => {
            let nodes = entries.into_iter().filter_map(contents_entry_to_node).collect();
            Ok(Listing::Children(nodes))
        }
        ContentsReply::Single(entry) => {
            if let Some(git_url) = entry.submodule_git_url {
                return Ok(Listing::Indirect { git_url });
            }
            match contents_entry_to_node(*entry) {
                Some(node @ RemoteNode {
                    kind: NodeKind::File { .. },
                    ..
                }) => Ok(Listing::Children(vec![node])),
                Some(node) => Err(Error::ParseError(format!(
                    "Unexpected single entry '{}' in contents listing",
                    node.path
                ))),
                None => Err(Error::ParseError(
                    "Contents listing entry has no usable address".to_string(),
                )),
            }
        }
    }
}

fn contents_entry_to_node(entry: ContentsEntry) -> Option<RemoteNode> {
    match entry.kind.as_str() {
        "dir" => {
            let url = entry.url?;
            Some(RemoteNode::directory(&entry.name, &url))
        }
        "submodule" => {
            let locator = entry.submodule_git_url.or(entry.url)?;
            Some(RemoteNode::submodule(&entry.name, &locator))
        }
        "file" => match entry.download_url {
            Some(download_url) => Some(RemoteNode::file(&entry.name, &download_url, false)),
            // Listings report submodules as content-less files
            None => entry.url.map(|url| RemoteNode::submodule(&entry.name, &url)),
        },
        other => {
            debug!("Skipping '{}' of unsupported type '{}'", entry.name, other);
            None
        }
    }
}

// =============================================================================
// Git tree endpoint
// =============================================================================

#[derive(Debug, Deserialize)]
struct TreeReply {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    mode: String,
}

/// Decode a git-tree-endpoint response for `repo`
///
/// File download addresses point at `raw_base`; directories and submodules
/// get contents-endpoint addresses under `api_base`.
pub fn parse_tree_reply(
    body: &str,
    repo: &RepoRef,
    api_base: &str,
    raw_base: &str,
) -> Result<Vec<RemoteNode>> {
    let reply: TreeReply = serde_json::from_str(body)
        .map_err(|e| Error::ParseError(format!("Could not parse tree listing: {e}")))?;

    if reply.truncated {
        return Err(Error::ParseError(format!(
            "Tree listing for {} was truncated by the server",
            repo.slug()
        )));
    }

    let mut nodes = Vec::with_capacity(reply.tree.len());
    for entry in reply.tree {
        let node = match entry.mode.as_str() {
            MODE_FILE | MODE_FILE_GROUP_WRITE => {
                RemoteNode::file(&entry.path, &repo.raw_url(raw_base, &entry.path), false)
            }
            MODE_EXECUTABLE => {
                RemoteNode::file(&entry.path, &repo.raw_url(raw_base, &entry.path), true)
            }
            MODE_DIRECTORY => {
                RemoteNode::directory(&entry.path, &repo.contents_url(api_base, &entry.path))
            }
            MODE_SUBMODULE => {
                RemoteNode::submodule(&entry.path, &repo.contents_url(api_base, &entry.path))
            }
            MODE_SYMLINK => {
                debug!("Skipping symlink {}", entry.path);
                continue;
            }
            other => {
                return Err(Error::ParseError(format!(
                    "Unknown mode '{other}' for '{}'",
                    entry.path
                )));
            }
        };
        nodes.push(node);
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoRef {
        RepoRef::new("github.com", "lightningd", "plugins", "master")
    }

    #[test]
    fn test_normalize_scp_style() {
        assert_eq!(
            normalize_git_url("git@github.com:darosior/lightning-qt.git"),
            "https://github.com/darosior/lightning-qt"
        );
    }

    #[test]
    fn test_normalize_ssh_and_git_schemes() {
        assert_eq!(
            normalize_git_url("ssh://git@github.com/owner/repo.git"),
            "https://github.com/owner/repo"
        );
        assert_eq!(
            normalize_git_url("git://github.com/owner/repo"),
            "https://github.com/owner/repo"
        );
    }

    #[test]
    fn test_normalize_leaves_https_alone() {
        assert_eq!(
            normalize_git_url("https://github.com/owner/repo"),
            "https://github.com/owner/repo"
        );
        assert_eq!(
            normalize_git_url("https://github.com/owner/repo.git"),
            "https://github.com/owner/repo"
        );
    }

    #[test]
    fn test_repo_from_git_url() {
        let repo = RepoRef::from_git_url("git@github.com:darosior/lightning-qt.git", "HEAD").unwrap();
        assert_eq!(repo.host, "github.com");
        assert_eq!(repo.slug(), "darosior/lightning-qt");
        assert_eq!(
            repo.archive_url(),
            "https://github.com/darosior/lightning-qt/archive/HEAD.tar.gz"
        );
        assert!(RepoRef::from_git_url("https://github.com/onlyowner", "HEAD").is_err());
    }

    #[test]
    fn test_repo_addresses() {
        let repo = repo();
        assert_eq!(
            repo.contents_url("https://api.github.com", "probe"),
            "https://api.github.com/repos/lightningd/plugins/contents/probe?ref=master"
        );
        assert_eq!(
            repo.contents_url("https://api.github.com/", ""),
            "https://api.github.com/repos/lightningd/plugins/contents?ref=master"
        );
        assert_eq!(
            repo.tree_url("https://api.github.com", true),
            "https://api.github.com/repos/lightningd/plugins/git/trees/master?recursive=1"
        );
        assert_eq!(
            repo.raw_url("https://raw.githubusercontent.com", "drain/drain.py"),
            "https://raw.githubusercontent.com/lightningd/plugins/master/drain/drain.py"
        );
        assert_eq!(
            repo.human_url("drain"),
            "https://github.com/lightningd/plugins/tree/master/drain"
        );
    }

    #[test]
    fn test_parse_contents_listing() {
        let body = r#"[
            {"name": "probe.py", "path": "probe/probe.py", "type": "file",
             "download_url": "https://raw.githubusercontent.com/o/r/master/probe/probe.py",
             "url": "https://api.github.com/repos/o/r/contents/probe/probe.py?ref=master"},
            {"name": "tests", "path": "probe/tests", "type": "dir", "download_url": null,
             "url": "https://api.github.com/repos/o/r/contents/probe/tests?ref=master"},
            {"name": "vendor", "path": "probe/vendor", "type": "file", "download_url": null,
             "url": "https://api.github.com/repos/o/r/contents/probe/vendor?ref=master"},
            {"name": "link", "path": "probe/link", "type": "symlink",
             "download_url": "https://raw.githubusercontent.com/o/r/master/probe/link"}
        ]"#;

        let Listing::Children(nodes) = parse_contents_reply(body).unwrap() else {
            panic!("expected children");
        };
        assert_eq!(nodes.len(), 3);
        assert!(matches!(nodes[0].kind, NodeKind::File { executable: false, .. }));
        assert_eq!(nodes[0].path, "probe.py");
        assert!(matches!(nodes[1].kind, NodeKind::Directory { .. }));
        assert!(matches!(nodes[2].kind, NodeKind::Submodule { .. }));
    }

    #[test]
    fn test_parse_contents_submodule_object() {
        let body = r#"{"name": "lightning-qt", "path": "lightning-qt", "type": "submodule",
            "submodule_git_url": "git@github.com:darosior/lightning-qt.git",
            "url": "https://api.github.com/repos/o/r/contents/lightning-qt"}"#;
        assert_eq!(
            parse_contents_reply(body).unwrap(),
            Listing::Indirect {
                git_url: "git@github.com:darosior/lightning-qt.git".to_string()
            }
        );
    }

    #[test]
    fn test_parse_contents_garbage() {
        let result = parse_contents_reply(r#"{"message": "Not Found"}"#);
        assert!(matches!(result, Err(Error::ParseError(_))));
    }

    #[test]
    fn test_parse_tree_modes() {
        let body = r#"{"sha": "abc", "truncated": false, "tree": [
            {"path": "drain", "mode": "040000", "type": "tree", "sha": "1"},
            {"path": "drain/drain.py", "mode": "100755", "type": "blob", "sha": "2", "size": 10},
            {"path": "drain/README.md", "mode": "100644", "type": "blob", "sha": "3", "size": 5},
            {"path": "lightning-qt", "mode": "160000", "type": "commit", "sha": "4"},
            {"path": "latest", "mode": "120000", "type": "blob", "sha": "5", "size": 3}
        ]}"#;

        let nodes =
            parse_tree_reply(body, &repo(), "https://api.github.com", "https://raw.githubusercontent.com")
                .unwrap();
        assert_eq!(nodes.len(), 4);
        assert!(matches!(nodes[0].kind, NodeKind::Directory { .. }));
        assert_eq!(
            nodes[1].kind,
            NodeKind::File {
                download_url: "https://raw.githubusercontent.com/lightningd/plugins/master/drain/drain.py"
                    .to_string(),
                executable: true,
            }
        );
        assert!(matches!(nodes[2].kind, NodeKind::File { executable: false, .. }));
        assert_eq!(
            nodes[3].kind,
            NodeKind::Submodule {
                locator: "https://api.github.com/repos/lightningd/plugins/contents/lightning-qt?ref=master"
                    .to_string()
            }
        );
    }

    #[test]
    fn test_parse_tree_unknown_mode() {
        let body = r#"{"tree": [{"path": "x", "mode": "999999"}]}"#;
        assert!(parse_tree_reply(body, &repo(), "a", "r").is_err());
    }

    #[test]
    fn test_parse_tree_truncated() {
        let body = r#"{"tree": [], "truncated": true}"#;
        assert!(parse_tree_reply(body, &repo(), "a", "r").is_err());
    }
}
