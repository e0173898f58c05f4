//! GitLab reader.
//!
//! Two strategies, selected by the `/-/blob/` marker in the target:
//! - without it, a plain rewrite of `blob` to `raw`;
//! - with it, the project id is looked up through the v4 API first and the
//!   file is read through the repository files endpoint.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use catalogloader_shared::{CatalogError, GitlabIntegrationConfig, Result, require_non_empty};

use super::{RepoFile, UrlReader, header_value, path_segments, require_extension};
use crate::http::{fetch_bytes, fetch_json, parse_url};

/// Path marker of a blob view under GitLab's nested-project URL scheme.
const PROJECT_BLOB_MARKER: &str = "/-/blob/";

// Header names are case-insensitive; `HeaderName::from_static` needs lowercase.
const TOKEN_HEADER: &str = "private-token";

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    id: u64,
}

/// Reads files from gitlab.com or a self-hosted GitLab.
pub struct GitlabUrlReader {
    host: String,
    headers: HeaderMap,
    client: Client,
}

impl GitlabUrlReader {
    pub fn new(config: &GitlabIntegrationConfig, client: Client) -> Result<Self> {
        require_non_empty("integrations.gitlab.token", config.token.as_deref())?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            headers.insert(TOKEN_HEADER, header_value("integrations.gitlab.token", token)?);
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

    /// Split a plain blob-view (or already raw) address into its parts.
    ///
    /// `-` segments are ignored, so `a/b/-/blob/...` parses like `a/b/blob/...`.
    pub fn parse_target(&self, target: &str) -> Result<RepoFile> {
        let url = parse_url(target)?;
        let segments: Vec<&str> = path_segments(&url)
            .into_iter()
            .filter(|s| *s != "-")
            .collect();

        if segments.len() < 5 || !matches!(segments[2], "blob" | "raw") {
            return Err(CatalogError::invalid_location(target, "Wrong GitLab URL"));
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
    /// from: `https://gitlab.example.com/a/b/blob/master/c.yaml`
    /// to:   `https://gitlab.example.com/a/b/raw/master/c.yaml`
    pub fn build_raw_url(&self, target: &str) -> Result<Url> {
        let file = self.parse_target(target)?;
        let git_ref = file.git_ref.as_deref().unwrap_or("HEAD");

        let mut url = parse_url(target)?;
        url.set_path(&format!(
            "/{}/{}/raw/{git_ref}/{}",
            file.owner, file.repo, file.path
        ));
        url.set_fragment(None);
        Ok(url)
    }

    /// Converts
    /// from: `https://gitlab.com/groupA/teams/teamA/repoA/-/blob/branch/my/file.yaml`
    /// to:   `https://gitlab.com/api/v4/projects/<id>/repository/files/my%2Ffile.yaml/raw?ref=branch`
    pub fn build_project_url(&self, target: &str, project_id: u64) -> Result<Url> {
        let file = self.parse_project_target(target)?;
        let git_ref = file.git_ref.as_deref().unwrap_or("HEAD");

        let mut url = parse_url(target)?;
        url.set_path(&format!(
            "/api/v4/projects/{project_id}/repository/files/{}/raw",
            file.path.replace('/', "%2F")
        ));
        url.set_fragment(None);
        url.query_pairs_mut().clear().append_pair("ref", git_ref);
        Ok(url)
    }

    /// Look up the numeric project id for a nested-project blob address.
    #[instrument(skip_all, fields(reader = %self, location = %target))]
    pub async fn resolve_project_id(&self, target: &str) -> Result<u64> {
        let lookup = self.project_lookup_url(target)?;
        debug!(%lookup, "resolving GitLab project id");

        let project: ProjectInfo = fetch_json(&self.client, target, &lookup, &self.headers)
            .await
            .map_err(|e| {
                CatalogError::connector(format!(
                    "Could not get GitLab project id for: {target}, {e}"
                ))
            })?;
        Ok(project.id)
    }

    fn project_lookup_url(&self, target: &str) -> Result<Url> {
        let file = self.parse_project_target(target)?;
        let mut lookup = parse_url(target)?;
        lookup.set_path(&format!(
            "/api/v4/projects/{}%2F{}",
            file.owner.replace('/', "%2F"),
            file.repo
        ));
        lookup.set_query(None);
        lookup.set_fragment(None);
        Ok(lookup)
    }

    /// Split a nested-project blob address at the `/-/blob/` marker.
    fn parse_project_target(&self, target: &str) -> Result<RepoFile> {
        let url = parse_url(target)
            .map_err(|e| CatalogError::connector(format!("Incorrect url: {target}, {e}")))?;
        let Some((repo_path, rest)) = url.path().split_once(PROJECT_BLOB_MARKER) else {
            return Err(CatalogError::connector(format!(
                "Please provide full path to the file from GitLab, {target} has no {PROJECT_BLOB_MARKER} segment"
            )));
        };

        let repo_path = repo_path.trim_start_matches('/');
        let Some((owner, repo)) = repo_path.rsplit_once('/') else {
            return Err(CatalogError::invalid_location(target, "Wrong GitLab URL"));
        };
        let Some((git_ref, path)) = rest.split_once('/') else {
            return Err(CatalogError::invalid_location(target, "Wrong GitLab URL"));
        };
        require_extension(target, path)?;

        Ok(RepoFile {
            owner: owner.to_string(),
            repo: repo.to_string(),
            git_ref: Some(git_ref.to_string()),
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl UrlReader for GitlabUrlReader {
    #[instrument(skip_all, fields(reader = %self, url = %url))]
    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let built = if url.contains(PROJECT_BLOB_MARKER) {
            let project_id = self.resolve_project_id(url).await?;
            self.build_project_url(url, project_id)?
        } else {
            self.build_raw_url(url)?
        };
        fetch_bytes(&self.client, url, &built, &self.headers).await
    }
}

impl fmt::Display for GitlabUrlReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gitlab{{host={},authed={}}}",
            self.host,
            self.headers.contains_key(TOKEN_HEADER)
        )
    }
}
