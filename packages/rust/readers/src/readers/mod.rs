//! URL reader trait, per-system readers, and the host-keyed registry.
//!
//! Each hosting system gets its own reader that knows how to turn a
//! browser-facing "blob view" address into a fetchable raw-content address
//! and which headers authenticate the fetch. [`UrlReaders`] picks the reader
//! by host and falls back to a plain fetch for anything unrecognised.

mod azure;
mod bitbucket;
mod fetch;
mod github;
mod gitlab;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::HeaderValue;
use tracing::debug;
use url::Url;

use catalogloader_shared::{CatalogError, IntegrationsConfig, Result};

use crate::http::{build_client, host_key, parse_url};

pub use azure::AzureUrlReader;
pub use bitbucket::BitbucketUrlReader;
pub use fetch::FetchUrlReader;
pub use github::GithubUrlReader;
pub use gitlab::GitlabUrlReader;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Reads the raw bytes behind a URL.
///
/// `Display` should identify the reader and whether it is authenticated,
/// e.g. `gitlab{host=gitlab.com,authed=false}`; it shows up in logs.
#[async_trait]
pub trait UrlReader: Send + Sync + fmt::Display {
    /// Fetch the content at `url`.
    async fn read(&self, url: &str) -> Result<Vec<u8>>;
}

/// A file inside a hosted repository, as addressed by a location target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    /// User, organisation, or (possibly nested) group path.
    pub owner: String,
    pub repo: String,
    /// Branch, tag, or commit; `None` when the address does not pin one.
    pub git_ref: Option<String>,
    /// Percent-encoded path of the file inside the repository.
    pub path: String,
}

// ---------------------------------------------------------------------------
// Helpers shared by the readers
// ---------------------------------------------------------------------------

/// Non-empty, still percent-encoded path segments of `url`.
pub(crate) fn path_segments(url: &Url) -> Vec<&str> {
    url.path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default()
}

/// Require the last path component to carry a file extension.
pub(crate) fn require_extension(target: &str, path: &str) -> Result<()> {
    let file = path.rsplit('/').next().unwrap_or("");
    match file.rfind('.') {
        Some(i) if i > 0 && i + 1 < file.len() => Ok(()),
        _ => Err(CatalogError::invalid_location(
            target,
            "Invalid file path, expected a file with an extension",
        )),
    }
}

/// `Basic` authorization value for a credential pair.
pub(crate) fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

/// Build a header value, failing as a configuration error on bad characters.
pub(crate) fn header_value(key: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| CatalogError::config(format!("invalid value for {key}, {e}")))
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered readers in priority order, keyed by `host[:port]`.
pub struct UrlReaders {
    readers: Vec<(String, Arc<dyn UrlReader>)>,
    fallback: Arc<dyn UrlReader>,
}

impl UrlReaders {
    /// Create a registry with no host-specific readers.
    pub fn new(fallback: Arc<dyn UrlReader>) -> Self {
        Self {
            readers: Vec::new(),
            fallback,
        }
    }

    /// Build readers for every configured integration, plus unauthenticated
    /// readers for the public hosts that were not configured explicitly.
    ///
    /// Fails fast when a credential is configured as an empty string.
    pub fn from_config(integrations: &IntegrationsConfig) -> Result<Self> {
        let client = build_client()?;
        let mut registry = Self::new(Arc::new(FetchUrlReader::new(client.clone())));

        let mut github = integrations.github.clone();
        if !github.iter().any(|c| c.host == "github.com") {
            github.push(Default::default());
        }
        for config in &github {
            let reader = GithubUrlReader::new(config, client.clone())?;
            let hosts = reader.hosts();
            registry.register_hosts(hosts, Arc::new(reader));
        }

        let mut gitlab = integrations.gitlab.clone();
        if !gitlab.iter().any(|c| c.host == "gitlab.com") {
            gitlab.push(Default::default());
        }
        for config in &gitlab {
            let reader = GitlabUrlReader::new(config, client.clone())?;
            registry.register(&config.host, Arc::new(reader));
        }

        let mut bitbucket = integrations.bitbucket.clone();
        if !bitbucket.iter().any(|c| c.host == "bitbucket.org") {
            bitbucket.push(Default::default());
        }
        for config in &bitbucket {
            let reader = BitbucketUrlReader::new(config, client.clone())?;
            let hosts = reader.hosts();
            registry.register_hosts(hosts, Arc::new(reader));
        }

        let mut azure = integrations.azure.clone();
        if !azure.iter().any(|c| c.host == "dev.azure.com") {
            azure.push(Default::default());
        }
        for config in &azure {
            let reader = AzureUrlReader::new(config, client.clone())?;
            registry.register(&config.host, Arc::new(reader));
        }

        Ok(registry)
    }

    /// Register `reader` for `host`. Earlier registrations win.
    pub fn register(&mut self, host: &str, reader: Arc<dyn UrlReader>) {
        self.readers.push((host.to_string(), reader));
    }

    fn register_hosts(&mut self, hosts: Vec<String>, reader: Arc<dyn UrlReader>) {
        for host in hosts {
            self.register(&host, reader.clone());
        }
    }

    /// Select the reader responsible for `url`.
    /// Always returns a reader (the plain fetch reader is the fallback).
    pub fn reader_for(&self, url: &Url) -> &dyn UrlReader {
        let key = host_key(url);
        self.readers
            .iter()
            .find(|(host, _)| *host == key)
            .map(|(_, reader)| reader.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }
}

#[async_trait]
impl UrlReader for UrlReaders {
    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = parse_url(url)?;
        let reader = self.reader_for(&parsed);
        debug!(%url, %reader, "selected reader");
        reader.read(url).await
    }
}

impl fmt::Display for UrlReaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.readers.iter().map(|(_, r)| r.to_string()).collect();
        write!(f, "readers[{}]", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogloader_shared::GitlabIntegrationConfig;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn extension_is_required() {
        assert!(require_extension("t", "templates/t.yaml").is_ok());
        assert!(require_extension("t", "catalog-info.yml").is_ok());
        assert!(require_extension("t", "templates/t").is_err());
        assert!(require_extension("t", "templates/.hidden").is_err());
        assert!(require_extension("t", "templates/trailing.").is_err());
    }

    #[test]
    fn basic_auth_encodes_pair() {
        assert_eq!(basic_auth("u", "p"), "Basic dTpw");
        assert_eq!(
            basic_auth("some-user", "my-secret"),
            "Basic c29tZS11c2VyOm15LXNlY3JldA=="
        );
    }

    #[test]
    fn default_registry_routes_public_hosts() {
        let registry = UrlReaders::from_config(&IntegrationsConfig::default()).unwrap();

        let reader = registry.reader_for(&url("https://github.com/o/r/blob/main/a.yaml"));
        assert!(reader.to_string().starts_with("github{"));

        let reader =
            registry.reader_for(&url("https://raw.githubusercontent.com/o/r/main/a.yaml"));
        assert!(reader.to_string().starts_with("github{"));

        let reader = registry.reader_for(&url("https://gitlab.com/a/b/blob/main/c.yaml"));
        assert!(reader.to_string().starts_with("gitlab{"));

        let reader = registry.reader_for(&url("https://bitbucket.org/o/r/src/main/a.yaml"));
        assert!(reader.to_string().starts_with("bitbucket{"));

        let reader = registry.reader_for(&url("https://dev.azure.com/o/p/_git/r?path=a.yaml"));
        assert!(reader.to_string().starts_with("azure{"));

        let reader = registry.reader_for(&url("https://example.com/catalog.yaml"));
        assert_eq!(reader.to_string(), "fetch");
    }

    #[test]
    fn configured_host_is_authenticated() {
        let integrations = IntegrationsConfig {
            gitlab: vec![GitlabIntegrationConfig {
                host: "gitlab.example.com".into(),
                token: Some("secret".into()),
            }],
            ..Default::default()
        };
        let registry = UrlReaders::from_config(&integrations).unwrap();
        let reader = registry.reader_for(&url("https://gitlab.example.com/a/b/blob/m/c.yaml"));
        assert_eq!(reader.to_string(), "gitlab{host=gitlab.example.com,authed=true}");
    }

    #[test]
    fn empty_credential_fails_registry_construction() {
        let integrations = IntegrationsConfig {
            gitlab: vec![GitlabIntegrationConfig {
                host: "gitlab.com".into(),
                token: Some(String::new()),
            }],
            ..Default::default()
        };
        let err = UrlReaders::from_config(&integrations).err().expect("config error");
        assert!(matches!(err, CatalogError::Config { .. }));
    }

    #[tokio::test]
    async fn unparseable_url_is_invalid_location() {
        let registry = UrlReaders::from_config(&IntegrationsConfig::default()).unwrap();
        let err = registry.read("not a url").await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidLocation { .. }));
    }
}
