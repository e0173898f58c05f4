//! `url` locations read through the host-keyed reader registry.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use catalogloader_readers::UrlReader;
use catalogloader_shared::{LocationSpec, ProcessorResult, Result};

use super::{Claim, LocationProcessor};

const URL_TYPE: &str = "url";

pub struct UrlReaderProcessor {
    reader: Arc<dyn UrlReader>,
}

impl UrlReaderProcessor {
    pub fn new(reader: Arc<dyn UrlReader>) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl LocationProcessor for UrlReaderProcessor {
    fn name(&self) -> &str {
        "UrlReaderProcessor"
    }

    async fn read_location(&self, location: &LocationSpec, optional: bool) -> Result<Claim> {
        if location.location_type != URL_TYPE {
            return Ok(Claim::Declined);
        }

        match self.reader.read(&location.target).await {
            Ok(data) => Ok(Claim::handled(ProcessorResult::data(location, data))),
            Err(e) if e.is_not_found() && optional => {
                debug!(url = %location.target, "optional location not found, skipping");
                Ok(Claim::Handled(Vec::new()))
            }
            Err(e) => Ok(Claim::handled(ProcessorResult::error(location, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogloader_readers::UrlReaders;
    use catalogloader_shared::{CatalogError, IntegrationsConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog-info.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("kind: Component"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.yaml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.yaml"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        server
    }

    fn processor() -> UrlReaderProcessor {
        let readers = UrlReaders::from_config(&IntegrationsConfig::default()).unwrap();
        UrlReaderProcessor::new(Arc::new(readers))
    }

    async fn read(target: String, optional: bool) -> Vec<ProcessorResult> {
        let location = LocationSpec::new("url", target);
        match processor().read_location(&location, optional).await.unwrap() {
            Claim::Handled(items) => items,
            Claim::Declined => panic!("url location should be claimed"),
        }
    }

    #[tokio::test]
    async fn emits_data() {
        let server = server().await;
        let items = read(format!("{}/catalog-info.yaml", server.uri()), false).await;
        assert!(matches!(
            &items[..],
            [ProcessorResult::Data { data, .. }] if data == b"kind: Component"
        ));
    }

    #[tokio::test]
    async fn not_found_depends_on_optional() {
        let server = server().await;
        let target = format!("{}/missing.yaml", server.uri());

        let items = read(target.clone(), false).await;
        assert!(matches!(
            &items[..],
            [ProcessorResult::Error { error: CatalogError::NotFound(_), .. }]
        ));

        assert!(read(target, true).await.is_empty());
    }

    #[tokio::test]
    async fn other_failures_are_never_suppressed() {
        let server = server().await;
        let items = read(format!("{}/broken.yaml", server.uri()), true).await;
        assert!(matches!(
            &items[..],
            [ProcessorResult::Error { error: CatalogError::Fetch { status: 503, .. }, .. }]
        ));
    }
}
