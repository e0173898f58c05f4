//! Fills `spec.definition` of API entities from an annotated location.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use catalogloader_shared::{
    CatalogError, DEFINITION_AT_LOCATION_ANNOTATION, Entity, LocationSpec, Result,
};

use super::{LocationProcessor, LocationResolver, Transformed};

pub struct DefinitionAtLocationProcessor;

#[async_trait]
impl LocationProcessor for DefinitionAtLocationProcessor {
    fn name(&self) -> &str {
        "DefinitionAtLocationProcessor"
    }

    async fn process_entity(
        &self,
        entity: &Entity,
        _location: &LocationSpec,
        resolver: &dyn LocationResolver,
    ) -> Result<Transformed> {
        if !entity.kind.eq_ignore_ascii_case("API") {
            return Ok(Transformed::unchanged());
        }
        let Some(reference) = entity.metadata.annotations.get(DEFINITION_AT_LOCATION_ANNOTATION)
        else {
            return Ok(Transformed::unchanged());
        };

        let source = LocationSpec::parse_ref(reference)?;
        debug!(entity = %entity.ref_string(), %source, "loading API definition");

        let data = resolver.read_location(&source).await?;
        let definition = String::from_utf8(data).map_err(|e| {
            CatalogError::parse(format!("definition at {source} is not UTF-8, {e}"))
        })?;

        let mut updated = entity.clone();
        updated
            .spec_object_mut()?
            .insert("definition".to_string(), Value::String(definition));
        Ok(Transformed::replaced(updated))
    }
}
