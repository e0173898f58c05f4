//! Records on each entity which location it was read from.

use async_trait::async_trait;

use catalogloader_shared::{Entity, LOCATION_ANNOTATION, LocationSpec, Result};

use super::{LocationProcessor, LocationResolver, Transformed};

pub struct AnnotateLocationEntityProcessor;

#[async_trait]
impl LocationProcessor for AnnotateLocationEntityProcessor {
    fn name(&self) -> &str {
        "AnnotateLocationEntityProcessor"
    }

    async fn process_entity(
        &self,
        entity: &Entity,
        location: &LocationSpec,
        _resolver: &dyn LocationResolver,
    ) -> Result<Transformed> {
        let mut updated = entity.clone();
        updated
            .metadata
            .annotations
            .insert(LOCATION_ANNOTATION.to_string(), location.to_string());
        Ok(Transformed::replaced(updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing::MapResolver;

    #[tokio::test]
    async fn annotates_with_location_ref() {
        let location = LocationSpec::new("url", "https://example.com/a.yaml");
        let mut entity = Entity::new("catalog/v1", "Component", "a");
        entity
            .metadata
            .annotations
            .insert(LOCATION_ANNOTATION.to_string(), "file:/stale.yaml".into());

        let out = AnnotateLocationEntityProcessor
            .process_entity(&entity, &location, &MapResolver::default())
            .await
            .unwrap();
        let entity = out.entity.unwrap();
        assert_eq!(
            entity.metadata.annotations[LOCATION_ANNOTATION],
            "url:https://example.com/a.yaml"
        );
    }
}
