// src/search.rs

//! Keyword search across the known plugin repositories

use crate::config::Config;
use crate::error::{Error, Result};
use crate::remote::{NodeKind, RemoteApi, RepoRef, normalize_git_url};
use serde::Serialize;
use tracing::{debug, info};

/// One search match: a page for humans and an address `install` accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub url_human: String,
    pub url_download: String,
}

fn repo_from_slug(slug: &str, config: &Config) -> Result<RepoRef> {
    match slug.trim().split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(RepoRef::new(
            &config.hosting_host,
            owner,
            name,
            &config.default_branch,
        )),
        _ => Err(Error::Config(format!(
            "search repository '{slug}' is not of the form owner/name"
        ))),
    }
}

/// Find top-level entries whose path contains `keyword` (case-sensitive)
///
/// Repositories are queried in configuration order and hits keep listing
/// order within each repository.
pub fn search(api: &dyn RemoteApi, config: &Config, keyword: &str) -> Result<Vec<SearchHit>> {
    info!("Searching {} repositories for '{}'", config.search_repos.len(), keyword);
    let mut hits = Vec::new();

    for slug in &config.search_repos {
        let repo = repo_from_slug(slug, config)?;
        let nodes = api.list_tree(&repo, false)?;

        for node in nodes
            .iter()
            .filter(|n| !n.is_hidden() && n.path.contains(keyword))
        {
            debug!("{} matches in {}", node.path, slug);
            let hit = match &node.kind {
                NodeKind::File { download_url, .. } => SearchHit {
                    url_human: repo.human_url(&node.path),
                    url_download: download_url.clone(),
                },
                NodeKind::Directory { tree_url } => SearchHit {
                    url_human: repo.human_url(&node.path),
                    url_download: tree_url.clone(),
                },
                NodeKind::Submodule { locator } => {
                    let git_url = api.resolve_submodule(locator)?;
                    SearchHit {
                        url_human: normalize_git_url(&git_url).into_owned(),
                        url_download: if locator.starts_with("http") {
                            locator.clone()
                        } else {
                            repo.contents_url(&config.api_base, &node.path)
                        },
                    }
                }
            };
            hits.push(hit);
        }
    }

    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Listing, RemoteNode};
    use crate::testing::MemoryRemote;

    fn config(repos: &[&str]) -> Config {
        Config {
            search_repos: repos.iter().map(|s| s.to_string()).collect(),
            ..Config::default()
        }
    }

    #[test]
    fn test_hits_by_kind() {
        let config = config(&["lightningd/plugins"]);
        let repo = RepoRef::new("github.com", "lightningd", "plugins", "master");
        let sub_url = repo.contents_url(&config.api_base, "sauron");

        let mut remote = MemoryRemote::new();
        remote.add_tree(
            &repo,
            vec![
                RemoteNode::directory("summary", &repo.contents_url(&config.api_base, "summary")),
                RemoteNode::file(
                    "summary.py",
                    &repo.raw_url(&config.raw_base, "summary.py"),
                    true,
                ),
                RemoteNode::submodule("sauron-summary", &sub_url),
                RemoteNode::file("Summary.md", "unused", false),
            ],
        );
        remote.add_listing(
            &sub_url,
            Listing::Indirect {
                git_url: "git@github.com:darosior/sauron.git".to_string(),
            },
        );

        let hits = search(&remote, &config, "summary").unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(
            hits[0],
            SearchHit {
                url_human: "https://github.com/lightningd/plugins/tree/master/summary".to_string(),
                url_download:
                    "https://api.github.com/repos/lightningd/plugins/contents/summary?ref=master"
                        .to_string(),
            }
        );
        assert_eq!(
            hits[1].url_download,
            "https://raw.githubusercontent.com/lightningd/plugins/master/summary.py"
        );
        assert_eq!(hits[2].url_human, "https://github.com/darosior/sauron");
        assert_eq!(hits[2].url_download, sub_url);
    }

    #[test]
    fn test_repositories_searched_in_order() {
        let config = config(&["a/one", "b/two"]);
        let mut remote = MemoryRemote::new();
        remote.add_tree(
            &RepoRef::new("github.com", "a", "one", "master"),
            vec![RemoteNode::file("rebalance.py", "mem://a", false)],
        );
        remote.add_tree(
            &RepoRef::new("github.com", "b", "two", "master"),
            vec![RemoteNode::file("rebalance", "mem://b", false)],
        );

        let hits = search(&remote, &config, "rebalance").unwrap();
        let downloads: Vec<&str> = hits.iter().map(|h| h.url_download.as_str()).collect();
        assert_eq!(downloads, vec!["mem://a", "mem://b"]);
    }

    #[test]
    fn test_no_hits() {
        let config = config(&["a/one"]);
        let mut remote = MemoryRemote::new();
        remote.add_tree(
            &RepoRef::new("github.com", "a", "one", "master"),
            vec![RemoteNode::file("probe.py", "mem://a", false)],
        );
        assert!(search(&remote, &config, "nothing").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_repo_slug() {
        let config = config(&["not-a-slug"]);
        let remote = MemoryRemote::new();
        assert!(matches!(
            search(&remote, &config, "x"),
            Err(Error::Config(_))
        ));
    }
}
