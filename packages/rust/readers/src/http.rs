//! HTTP client construction and response classification shared by all readers.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use catalogloader_shared::{CatalogError, Result};

/// User-Agent string for reader requests.
const USER_AGENT: &str = concat!("catalogloader/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects followed per request.
const MAX_REDIRECTS: usize = 5;

/// Per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Build the reqwest client shared by every reader in a registry.
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| CatalogError::Network(format!("failed to build HTTP client: {e}")))
}

/// Parse a location target as an absolute URL.
pub(crate) fn parse_url(target: &str) -> Result<Url> {
    Url::parse(target).map_err(|e| CatalogError::invalid_location(target, format!("{e}")))
}

/// `host[:port]` of a URL, the key readers are registered under.
pub fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// GET `url` on behalf of `target` and classify the outcome.
///
/// 2xx yields the body, 404 yields [`CatalogError::NotFound`], any other
/// status yields [`CatalogError::Fetch`], and transport failures yield
/// [`CatalogError::Network`].
#[instrument(skip_all, fields(location = %target, url = %url))]
pub async fn fetch_bytes(
    client: &Client,
    target: &str,
    url: &Url,
    headers: &HeaderMap,
) -> Result<Vec<u8>> {
    debug!("fetching");

    let response = client
        .get(url.as_str())
        .headers(headers.clone())
        .send()
        .await
        .map_err(|e| CatalogError::Network(format!("Unable to read {target}, {e}")))?;

    let status = response.status();
    if status.is_success() {
        let body = response
            .bytes()
            .await
            .map_err(|e| CatalogError::Network(format!("{target}: body read failed: {e}")))?;
        debug!(bytes = body.len(), "fetched");
        return Ok(body.to_vec());
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(CatalogError::NotFound(format!(
            "{target} could not be read as {url}, {status}"
        )));
    }

    Err(CatalogError::Fetch {
        target: target.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
    })
}

/// GET `url` and decode the JSON body.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    target: &str,
    url: &Url,
    headers: &HeaderMap,
) -> Result<T> {
    let body = fetch_bytes(client, target, url, headers).await?;
    serde_json::from_slice(&body)
        .map_err(|e| CatalogError::parse(format!("{url} returned malformed JSON, {e}")))
}
