//! `Location` entities point at further locations to read.

use async_trait::async_trait;
use serde_json::Value;

use catalogloader_shared::{CatalogError, Entity, LocationSpec, ProcessorResult, Result};

use super::{LocationProcessor, LocationResolver, Transformed, resolve_relative};

pub struct LocationRefProcessor;

impl LocationRefProcessor {
    fn emit_target(
        origin: &LocationSpec,
        location_type: &str,
        target: &str,
        out: Transformed,
    ) -> Result<Transformed> {
        if location_type == "file" && target.ends_with('/') {
            return Ok(out.emit(ProcessorResult::error(
                origin,
                CatalogError::validation(format!(
                    "LocationRefProcessor cannot handle directory paths, got {target}"
                )),
            )));
        }
        let target = resolve_relative(origin, location_type, target)?;
        Ok(out.emit(ProcessorResult::location(
            LocationSpec::new(location_type, target),
            false,
        )))
    }
}

#[async_trait]
impl LocationProcessor for LocationRefProcessor {
    fn name(&self) -> &str {
        "LocationRefProcessor"
    }

    async fn process_entity(
        &self,
        entity: &Entity,
        location: &LocationSpec,
        _resolver: &dyn LocationResolver,
    ) -> Result<Transformed> {
        if !entity.kind.eq_ignore_ascii_case("Location") {
            return Ok(Transformed::unchanged());
        }
        let spec = entity.spec.as_ref().and_then(Value::as_object);
        let Some(spec) = spec else {
            return Err(CatalogError::validation("Location entity has no spec"));
        };

        let location_type = match spec.get("type") {
            Some(Value::String(t)) => t.as_str(),
            Some(_) => {
                return Err(CatalogError::validation("Location spec.type must be a string"));
            }
            None => location.location_type.as_str(),
        };

        let mut out = Transformed::unchanged();
        match spec.get("target") {
            Some(Value::String(target)) => {
                out = Self::emit_target(location, location_type, target, out)?;
            }
            Some(_) => {
                return Err(CatalogError::validation("Location spec.target must be a string"));
            }
            None => {}
        }
        match spec.get("targets") {
            Some(Value::Array(targets)) => {
                for target in targets {
                    let Some(target) = target.as_str() else {
                        return Err(CatalogError::validation(
                            "Location spec.targets must contain strings",
                        ));
                    };
                    out = Self::emit_target(location, location_type, target, out)?;
                }
            }
            Some(_) => {
                return Err(CatalogError::validation("Location spec.targets must be a list"));
            }
            None => {}
        }
        Ok(out)
    }
}
