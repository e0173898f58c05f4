//! `file` locations read from the local filesystem.

use async_trait::async_trait;
use tracing::debug;

use catalogloader_shared::{CatalogError, LocationSpec, ProcessorResult, Result};

use super::{Claim, LocationProcessor};

const FILE_TYPE: &str = "file";

pub struct FileReaderProcessor;

#[async_trait]
impl LocationProcessor for FileReaderProcessor {
    fn name(&self) -> &str {
        "FileReaderProcessor"
    }

    async fn read_location(&self, location: &LocationSpec, optional: bool) -> Result<Claim> {
        if location.location_type != FILE_TYPE {
            return Ok(Claim::Declined);
        }

        let item = match tokio::fs::read(&location.target).await {
            Ok(data) => ProcessorResult::data(location, data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if optional {
                    debug!(target_path = %location.target, "optional file missing, skipping");
                    return Ok(Claim::Handled(Vec::new()));
                }
                ProcessorResult::error(
                    location,
                    CatalogError::NotFound(format!("{} does not exist", location.target)),
                )
            }
            Err(e) => ProcessorResult::error(location, CatalogError::io(&location.target, e)),
        };
        Ok(Claim::handled(item))
    }
}
