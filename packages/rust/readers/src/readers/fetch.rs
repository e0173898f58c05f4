//! Plain GET reader used for hosts without a dedicated integration.

use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::instrument;

use catalogloader_shared::Result;

use super::UrlReader;
use crate::http::{fetch_bytes, parse_url};

/// Fetches the URL as-is, without rewriting or authentication.
pub struct FetchUrlReader {
    client: Client,
}

impl FetchUrlReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UrlReader for FetchUrlReader {
    #[instrument(skip_all, fields(url = %url))]
    async fn read(&self, url: &str) -> Result<Vec<u8>> {
        let parsed = parse_url(url)?;
        fetch_bytes(&self.client, url, &parsed, &HeaderMap::new()).await
    }
}

impl fmt::Display for FetchUrlReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fetch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::build_client;
    use catalogloader_shared::CatalogError;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetches_url_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog/all.yaml"))
            .and(query_param("ref", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_string("kind: System"))
            .mount(&server)
            .await;

        let reader = FetchUrlReader::new(build_client().unwrap());
        let body = reader
            .read(&format!("{}/catalog/all.yaml?ref=main", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"kind: System");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let reader = FetchUrlReader::new(build_client().unwrap());
        let err = reader
            .read(&format!("{}/gone.yaml", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }
}
