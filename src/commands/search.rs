// src/commands/search.rs
//! `plugfetch search`

use super::remote_client;
use anyhow::{Context, Result};
use plugfetch::Config;
use plugfetch::search::search;

const NOT_FOUND: &str = "Could not find any plugin matching this keyword";

pub fn cmd_search(config: &Config, keyword: &str, json: bool) -> Result<()> {
    let remote = remote_client(config, json)?;
    let hits = search(&remote, config, keyword)
        .with_context(|| format!("Search for '{keyword}' failed"))?;

    if json {
        let rendered = serde_json::to_string_pretty(&hits).context("Failed to serialize hits")?;
        println!("{rendered}");
        return Ok(());
    }

    if hits.is_empty() {
        println!("{NOT_FOUND}");
        return Ok(());
    }
    for hit in &hits {
        println!("{}", hit.url_human);
        println!("  install: {}", hit.url_download);
    }
    Ok(())
}
