//! Azure DevOps reader: rewrites `_git` views onto the items API.
//!
//! The file path and the version selector travel as query parameters on
//! both sides of the rewrite. Web views encode the version as a two-letter
//! type prefix (`GB` branch, `GT` tag, `GC` commit); the API takes the bare
//! version plus an optional `versionType`.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap};
use tracing::instrument;
use url::Url;

use catalogloader_shared::{AzureIntegrationConfig, CatalogError, Result, require_non_empty};

use super::{RepoFile, UrlReader, basic_auth, header_value, path_segments, require_extension};
use crate::http::{fetch_bytes, host_key, parse_url};

/// Reads files from Azure DevOps Git repositories.
pub struct AzureUrlReader {
    host: String,
    headers: HeaderMap,
    client: Client,
}

impl AzureUrlReader {
    pub fn new(config: &AzureIntegrationConfig, client: Client) -> Result<Self> {
        require_non_empty("integrations.azure.token", config.token.as_deref())?;

        // Personal access tokens go in as the password of an empty user.
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            headers.insert(
                AUTHORIZATION,
                header_value("integrations.azure.token", &basic_auth("", token))?,
            );
        }

        Ok(Self {
            host: config.host.clone(),
            headers,
            client,
        })
    }

    /// Headers sent with every request; empty when no token is configured.
    pub fn request_headers(&self) -> HeaderMap {
        self.headers.clone()
    }

    /// Split a `_git` view or items API address into its repository parts.
    ///
    /// `git_ref` is returned in the prefixed web form, e.g. `GBmaster`.
    pub fn parse_target(&self, target: &str) -> Result<RepoFile> {
        let url = parse_url(target)?;
        let wrong = || {
            CatalogError::invalid_location(target, "Wrong Azure Devops URL or Invalid file path")
        };

        if host_key(&url) != self.host {
            return Err(wrong());
        }

        let segments = path_segments(&url);
        let (owner, repo, api_form) = match segments.as_slice() {
            [org, project, "_git", repo] => (format!("{org}/{project}"), *repo, false),
            [org, project, "_apis", "git", "repositories", repo, "items"] => {
                (format!("{org}/{project}"), *repo, true)
            }
            _ => return Err(wrong()),
        };

        let mut path = None;
        let mut version = None;
        let mut version_type = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "path" => path = Some(value.into_owned()),
                "version" => version = Some(value.into_owned()),
                "versionType" => version_type = Some(value.into_owned()),
                _ => {}
            }
        }
        let path = path.ok_or_else(wrong)?;
        require_extension(target, &path)?;

        let git_ref = version.map(|v| {
            if api_form {
                let prefix = match version_type.as_deref() {
                    Some("tag") => "GT",
                    Some("commit") => "GC",
                    _ => "GB",
                };
                format!("{prefix}{v}")
            } else if ["GB", "GT", "GC"].iter().any(|p| v.starts_with(p)) {
                v
            } else {
                format!("GB{v}")
            }
        });

        Ok(RepoFile {
            owner,
            repo: repo.to_string(),
            git_ref,
            path,
        })
    }

    /// Converts
    /// from: `https://dev.azure.com/org/project/_git/repo?path=my-template.yaml&version=GBmaster`
    /// to:   `https://dev.azure.com/org/project/_apis/git/repositories/repo/items?path=my-template.yaml&version=master`
    pub fn build_raw_url(&self, target: &str) -> Result<Url> {
        let file = self.parse_target(target)?;

        let mut url = parse_url(target)?;
        url.set_path(&format!(
            "/{}/_apis/git/repositories/{}/items",
            file.owner, file.repo
        ));
        url.set_fragment(None);

        let mut query = url.query_pairs_mut();
        query.clear().append_pair("path", &file.path);
        if let Some(git_ref) = &file.git_ref {
            let (prefix, version) = git_ref.split_at(2);
            query.append_pair("version", version);
            match prefix {
                "GT" => {
                    query.append_pair("versionType", "tag");
                }
                "GC" => {
                    query.append_pair("versionType", "commit");
                }
                _ => {}
            }
        }
        drop(query);

        Ok(url)
    }
}

#[async_trait]
impl UrlReader for AzureUrlReader {
    #[instrument(skip_all, fields(reader = %self, url = %url))]
    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let raw = self.build_raw_url(url)?;
        fetch_bytes(&self.client, url, &raw, &self.headers).await
    }
}

impl fmt::Display for AzureUrlReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "azure{{host={},authed={}}}",
            self.host,
            self.headers.contains_key(AUTHORIZATION)
        )
    }
}
