//! `bootstrap` locations expand to the statically configured locations.

use async_trait::async_trait;

use catalogloader_shared::{LocationSpec, ProcessorResult, Result, StaticLocationConfig};

use super::{Claim, LocationProcessor};

const BOOTSTRAP_TYPE: &str = "bootstrap";

pub struct StaticLocationProcessor {
    locations: Vec<LocationSpec>,
}

impl StaticLocationProcessor {
    pub fn new(locations: Vec<LocationSpec>) -> Self {
        Self { locations }
    }

    pub fn from_config(locations: &[StaticLocationConfig]) -> Self {
        Self::new(locations.iter().map(StaticLocationConfig::location).collect())
    }
}

#[async_trait]
impl LocationProcessor for StaticLocationProcessor {
    fn name(&self) -> &str {
        "StaticLocationProcessor"
    }

    async fn read_location(&self, location: &LocationSpec, _optional: bool) -> Result<Claim> {
        if location.location_type != BOOTSTRAP_TYPE {
            return Ok(Claim::Declined);
        }

        Ok(Claim::Handled(
            self.locations
                .iter()
                .map(|l| ProcessorResult::location(l.clone(), false))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emits_configured_locations() {
        let configured = vec![StaticLocationConfig {
            location_type: "url".into(),
            target: "https://example.com/all.yaml".into(),
            rules: Vec::new(),
        }];
        let processor = StaticLocationProcessor::from_config(&configured);

        let bootstrap = LocationSpec::new("bootstrap", "bootstrap");
        let Claim::Handled(items) = processor.read_location(&bootstrap, false).await.unwrap()
        else {
            panic!("bootstrap should be claimed");
        };
        assert_eq!(items.len(), 1);
        assert!(matches!(
            &items[0],
            ProcessorResult::Location { location, optional: false }
                if location.target == "https://example.com/all.yaml"
        ));

        let other = LocationSpec::new("url", "https://example.com/x.yaml");
        assert!(!processor.read_location(&other, false).await.unwrap().is_handled());
    }
}
