//! Bitbucket Cloud reader: rewrites source views onto the 2.0 REST API.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use tracing::instrument;
use url::Url;

use catalogloader_shared::{
    BitbucketIntegrationConfig, CatalogError, Result, require_non_empty,
};

use super::{RepoFile, UrlReader, basic_auth, header_value, path_segments, require_extension};
use crate::http::{fetch_bytes, host_key, parse_url};

const BITBUCKET_API_BASE: &str = "https://api.bitbucket.org/2.0";

/// Reads files from Bitbucket through its REST API.
pub struct BitbucketUrlReader {
    host: String,
    api_base: Url,
    headers: HeaderMap,
    client: Client,
}

impl BitbucketUrlReader {
    pub fn new(config: &BitbucketIntegrationConfig, client: Client) -> Result<Self> {
        require_non_empty("integrations.bitbucket.username", config.username.as_deref())?;
        require_non_empty(
            "integrations.bitbucket.app_password",
            config.app_password.as_deref(),
        )?;

        let api_base = match &config.api_base_url {
            Some(base) => base.clone(),
            None if config.host == "bitbucket.org" => BITBUCKET_API_BASE.to_string(),
            None => format!("https://api.{}/2.0", config.host),
        };
        let api_base = Url::parse(&api_base).map_err(|e| {
            CatalogError::config(format!("invalid Bitbucket api_base_url {api_base}, {e}"))
        })?;

        // Only a complete credential pair authenticates.
        let mut headers = HeaderMap::new();
        if let (Some(username), Some(password)) = (&config.username, &config.app_password) {
            headers.insert(
                AUTHORIZATION,
                header_value(
                    "integrations.bitbucket.username",
                    &basic_auth(username, password),
                )?,
            );
        }

        Ok(Self {
            host: config.host.clone(),
            api_base,
            headers,
            client,
        })
    }

    /// Hosts this reader answers for: the web host and the API host.
    pub fn hosts(&self) -> Vec<String> {
        vec![self.host.clone(), host_key(&self.api_base)]
    }

    /// Headers sent with every request; empty unless both credentials are set.
    pub fn request_headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    /// Split a source-view or API address into its repository parts.
    pub fn parse_target(&self, target: &str) -> Result<RepoFile> {
        let url = parse_url(target)?;
        let wrong = || {
            CatalogError::invalid_location(target, "Wrong Bitbucket URL or Invalid file path")
        };

        let segments = if let Some(rest) = self.strip_api_base(&url) {
            // repositories/owner/repo/src/ref/path...
            match rest.split_first() {
                Some((&"repositories", rest)) => rest.to_vec(),
                _ => return Err(wrong()),
            }
        } else if host_key(&url) == self.host {
            // owner/repo/src/ref/path...
            path_segments(&url)
        } else {
            return Err(wrong());
        };

        if segments.len() < 5 || segments[2] != "src" {
            return Err(wrong());
        }
        let path = segments[4..].join("/");
        require_extension(target, &path)?;

        Ok(RepoFile {
            owner: segments[0].to_string(),
            repo: segments[1].to_string(),
            git_ref: Some(segments[3].to_string()),
            path,
        })
    }

    /// Converts
    /// from: `https://bitbucket.org/org-name/repo-name/src/master/templates/my-template.yaml`
    /// to:   `https://api.bitbucket.org/2.0/repositories/org-name/repo-name/src/master/templates/my-template.yaml`
    pub fn build_raw_url(&self, target: &str) -> Result<Url> {
        let file = self.parse_target(target)?;
        let git_ref = file.git_ref.as_deref().unwrap_or("HEAD");

        let mut url = self.api_base.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!(
            "{base_path}/repositories/{}/{}/src/{git_ref}/{}",
            file.owner, file.repo, file.path
        ));
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    fn strip_api_base<'a>(&self, url: &'a Url) -> Option<Vec<&'a str>> {
        if host_key(url) != host_key(&self.api_base) || url.scheme() != self.api_base.scheme() {
            return None;
        }
        let base = path_segments(&self.api_base);
        let segments = path_segments(url);
        if segments.len() < base.len() || segments[..base.len()] != base[..] {
            return None;
        }
        Some(segments[base.len()..].to_vec())
    }
}

#[async_trait]
impl UrlReader for BitbucketUrlReader {
    #[instrument(skip_all, fields(reader = %self, url = %url))]
    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let raw = self.build_raw_url(url)?;
        fetch_bytes(&self.client, url, &raw, &self.headers).await
    }
}

impl fmt::Display for BitbucketUrlReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bitbucket{{host={},authed={}}}",
            self.host,
            self.headers.contains_key(AUTHORIZATION)
        )
    }
}
