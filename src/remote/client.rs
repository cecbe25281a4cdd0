// src/remote/client.rs

//! HTTP client for the listing API and file downloads
//!
//! Wraps a blocking reqwest client with retry on transport errors. HTTP
//! error statuses are returned immediately; retrying a 404 never helps.

use crate::config::Config;
use crate::error::{Error, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::github::{parse_contents_reply, parse_tree_reply};
use super::{Listing, RemoteApi, RemoteNode, RepoRef};

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

const API_ACCEPT: &str = "application/vnd.github+json";

/// Listing API client backed by reqwest
pub struct HttpRemote {
    client: Client,
    max_retries: u32,
    api_base: String,
    raw_base: String,
    hosting_host: String,
    progress: Option<MultiProgress>,
}

impl HttpRemote {
    /// Create a client from the pipeline configuration
    ///
    /// `token` is sent as a bearer token on listing calls; unauthenticated
    /// clients hit the API rate limit quickly on large trees.
    pub fn new(config: &Config, token: Option<String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("plugfetch/", env!("CARGO_PKG_VERSION"))),
        );
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
                .map_err(|e| Error::Config(format!("Invalid API token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(config.http_timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: config.http_retries.max(1),
            api_base: config.api_base.clone(),
            raw_base: config.raw_base.clone(),
            hosting_host: config.hosting_host.clone(),
            progress: None,
        })
    }

    /// Show a spinner per download on the given multi-progress display
    pub fn with_progress(mut self, progress: MultiProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// GET with retry on transport errors, failing on non-success status
    fn send(&self, url: &str, accept: Option<&str>) -> Result<Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut request = self.client.get(url);
            if let Some(accept) = accept {
                request = request.header(ACCEPT, accept);
            }
            match request.send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Request attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }

    /// Fetch a listing API response body
    fn get_api_text(&self, url: &str) -> Result<String> {
        debug!("Listing {}", url);
        self.send(url, Some(API_ACCEPT))?
            .text()
            .map_err(|e| Error::DownloadError(format!("Failed to read response from {url}: {e}")))
    }

    fn spinner(&self, name: &str) -> Option<ProgressBar> {
        let multi = self.progress.as_ref()?;
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} {bytes} ({bytes_per_sec}) {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(name.to_string());
        Some(multi.add(pb))
    }
}

/// Sibling path used while a download is in flight
fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.part"))
}

/// Stream an HTTP response to a file, never buffering the whole body
fn stream_response_to_file(
    mut response: Response,
    file: &mut File,
    progress_bar: Option<&ProgressBar>,
) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;
        downloaded += bytes_read as u64;

        if let Some(pb) = progress_bar {
            pb.set_position(downloaded);
        }
    }

    Ok(downloaded)
}

impl RemoteApi for HttpRemote {
    fn list(&self, tree_url: &str) -> Result<Listing> {
        let body = self.get_api_text(tree_url)?;
        parse_contents_reply(&body)
    }

    fn list_tree(&self, repo: &RepoRef, recursive: bool) -> Result<Vec<RemoteNode>> {
        // The tree endpoint only knows repositories of the configured site
        let host = repo.host.trim_start_matches("www.");
        if !host.eq_ignore_ascii_case(&self.hosting_host) {
            return Err(Error::UnsupportedTopology {
                path: repo.https_url(),
                reason: format!(
                    "repositories hosted on {} cannot be listed, only {}",
                    repo.host, self.hosting_host
                ),
            });
        }

        let url = repo.tree_url(&self.api_base, recursive);
        let body = self.get_api_text(&url)?;
        parse_tree_reply(&body, repo, &self.api_base, &self.raw_base)
    }

    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        debug!("Downloading {} to {}", url, dest.display());

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        let response = self.send(url, None)?;
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| url.to_string());
        let pb = self.spinner(&name);

        // Write to a partial file first so a failed transfer never leaves a
        // truncated file under the final name
        let temp_path = partial_path(dest);
        let mut file = File::create(&temp_path).map_err(|e| {
            Error::IoError(format!("Failed to create file {}: {e}", temp_path.display()))
        })?;

        let downloaded = match stream_response_to_file(response, &mut file, pb.as_ref()) {
            Ok(n) => n,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                if let Some(pb) = &pb {
                    pb.abandon_with_message(format!("{name} [FAILED]"));
                }
                return Err(e);
            }
        };
        drop(file);

        fs::rename(&temp_path, dest).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {e}",
                temp_path.display(),
                dest.display()
            ))
        })?;

        if let Some(pb) = &pb {
            pb.finish_with_message(format!("{name} [done]"));
        }
        info!("Downloaded {} bytes to {}", downloaded, dest.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("/p/summary/summary.py")),
            PathBuf::from("/p/summary/.summary.py.part")
        );
    }

    #[test]
    fn test_client_builds_from_default_config() {
        let config = Config::default();
        assert!(HttpRemote::new(&config, None).is_ok());
        assert!(HttpRemote::new(&config, Some("abc123".to_string())).is_ok());
    }

    #[test]
    fn test_foreign_host_tree_refused_offline() {
        let config = Config::default();
        let remote = HttpRemote::new(&config, None).unwrap();
        let repo = RepoRef::new("gitlab.com", "owner", "sub", "HEAD");

        let err = remote.list_tree(&repo, true).unwrap_err();
        assert!(matches!(err, Error::UnsupportedTopology { .. }));
        assert!(err.to_string().contains("gitlab.com"));
    }

    #[test]
    fn test_invalid_token_rejected() {
        let config = Config::default();
        let result = HttpRemote::new(&config, Some("bad\ntoken".to_string()));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
