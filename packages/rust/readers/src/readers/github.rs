//! GitHub reader: plain path rewrite onto the raw-content host.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use tracing::instrument;
use url::Url;

use catalogloader_shared::{CatalogError, GithubIntegrationConfig, Result, require_non_empty};

use super::{RepoFile, UrlReader, header_value, path_segments, require_extension};
use crate::http::{fetch_bytes, host_key, parse_url};

/// Raw-content host used for github.com.
const GITHUB_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Reads files from GitHub or GitHub Enterprise.
pub struct GithubUrlReader {
    host: String,
    raw_base: Url,
    headers: HeaderMap,
    client: Client,
}

impl GithubUrlReader {
    pub fn new(config: &GithubIntegrationConfig, client: Client) -> Result<Self> {
        require_non_empty("integrations.github.token", config.token.as_deref())?;

        let raw_base = match &config.raw_base_url {
            Some(base) => base.clone(),
            None if config.host == "github.com" => GITHUB_RAW_BASE.to_string(),
            None => format!("https://{}/raw", config.host),
        };
        let raw_base = Url::parse(&raw_base).map_err(|e| {
            CatalogError::config(format!("invalid GitHub raw_base_url {raw_base}, {e}"))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                header_value("integrations.github.token", &format!("token {token}"))?,
            );
        }

        Ok(Self {
            host: config.host.clone(),
            raw_base,
            headers,
            client,
        })
    }

    /// Hosts this reader answers for: the web host and the raw-content host.
    pub fn hosts(&self) -> Vec<String> {
        let raw_host = host_key(&self.raw_base);
        if raw_host == self.host {
            vec![self.host.clone()]
        } else {
            vec![self.host.clone(), raw_host]
        }
    }

    /// Headers sent with every request; empty when no token is configured.
    pub fn request_headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    /// Split a blob-view or raw-content address into its repository parts.
    pub fn parse_target(&self, target: &str) -> Result<RepoFile> {
        let url = parse_url(target)?;
        let wrong = || CatalogError::invalid_location(target, "Wrong GitHub URL");

        let parts: Vec<&str> = if let Some(rest) = self.strip_raw_base(&url) {
            // owner/repo/ref/path...
            rest
        } else if host_key(&url) == self.host {
            // owner/repo/blob/ref/path...
            let segments = path_segments(&url);
            if segments.len() < 5 || segments[2] != "blob" {
                return Err(wrong());
            }
            let mut parts = segments[..2].to_vec();
            parts.extend_from_slice(&segments[3..]);
            parts
        } else {
            return Err(wrong());
        };

        if parts.len() < 4 {
            return Err(wrong());
        }
        let path = parts[3..].join("/");
        require_extension(target, &path)?;

        Ok(RepoFile {
            owner: parts[0].to_string(),
            repo: parts[1].to_string(),
            git_ref: Some(parts[2].to_string()),
            path,
        })
    }

    /// Converts
    /// from: `https://github.com/a/b/blob/master/c.yaml`
    /// to:   `https://raw.githubusercontent.com/a/b/master/c.yaml`
    pub fn build_raw_url(&self, target: &str) -> Result<Url> {
        let file = self.parse_target(target)?;
        let git_ref = file.git_ref.as_deref().unwrap_or("HEAD");

        let mut url = self.raw_base.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!(
            "{base_path}/{}/{}/{git_ref}/{}",
            file.owner, file.repo, file.path
        ));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    fn strip_raw_base<'a>(&self, url: &'a Url) -> Option<Vec<&'a str>> {
        if host_key(url) != host_key(&self.raw_base) || url.scheme() != self.raw_base.scheme() {
            return None;
        }
        let base = path_segments(&self.raw_base);
        let segments = path_segments(url);
        if segments.len() < base.len() || segments[..base.len()] != base[..] {
            return None;
        }
        Some(segments[base.len()..].to_vec())
    }
}

#[async_trait]
impl UrlReader for GithubUrlReader {
    #[instrument(skip_all, fields(reader = %self, url = %url))]
    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let raw = self.build_raw_url(url)?;
        fetch_bytes(&self.client, url, &raw, &self.headers).await
    }
}

impl fmt::Display for GithubUrlReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "github{{host={},authed={}}}",
            self.host,
            self.headers.contains_key(AUTHORIZATION)
        )
    }
}
